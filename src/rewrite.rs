use crate::{gzip, offset::Offset};
use anyhow::{Context, Error};
use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
};
use tar::EntryType;
use tempfile::TempPath;

/// Copies accepted entries into a new archive under their re-rooted names.
///
/// The archive is assembled in a temporary file beside the destination and only moved into
/// place by [`finish`](Self::finish).
pub(crate) struct Rewriter {
    builder: tar::Builder<BufWriter<File>>,
    offset: Offset,
    intermediate: TempPath,
    destination: PathBuf,
    gzip: bool,
}

impl Rewriter {
    #[culpa::throws]
    #[fn_error_context::context("creating intermediate archive for {}", destination.display())]
    pub(crate) fn create(destination: &Path, gzip: bool, offset: Offset) -> Self {
        let dir = destination
            .parent()
            .context("destination has no parent directory")?;
        let (file, intermediate) = tempfile::Builder::new()
            .prefix(".tarmagic-")
            .suffix(".tar")
            .tempfile_in(dir)?
            .into_parts();
        tracing::debug!("writing intermediate archive {}", intermediate.display());

        Self {
            builder: tar::Builder::new(BufWriter::new(file)),
            offset,
            intermediate,
            destination: destination.to_owned(),
            gzip,
        }
    }

    /// Append `entry` named `rooted`, keeping the rest of its header.
    #[culpa::throws]
    #[fn_error_context::context("copying entry {}", original)]
    pub(crate) fn append<R: Read>(
        &mut self,
        entry: &mut tar::Entry<'_, R>,
        original: &str,
        rooted: &str,
    ) {
        tracing::debug!("copy entry {original} as {rooted}");

        let mut header = entry.header().clone();
        match header.entry_type() {
            EntryType::Symlink => {
                let target = entry
                    .link_name()?
                    .context("symlink entry without a target")?;
                self.builder.append_link(&mut header, rooted, target)?;
            }
            EntryType::Link => {
                // hard link targets name another archive entry, which moved along with this one
                let target = entry
                    .link_name()?
                    .context("hard link entry without a target")?;
                let target = target.to_string_lossy();
                let target = match self.offset.accept(&target) {
                    Some(rooted_target) => rooted_target,
                    None => {
                        tracing::warn!("hard link {original} points outside the offset at {target}");
                        target.into_owned()
                    }
                };
                self.builder.append_link(&mut header, rooted, target)?;
            }
            _ => {
                header.set_size(entry.size());
                self.builder.append_data(&mut header, rooted, entry)?;
            }
        }
    }

    /// Terminate the archive and move it to the destination, compressing it on the way if
    /// requested.
    #[culpa::throws]
    pub(crate) fn finish(self) {
        let Rewriter {
            builder,
            intermediate,
            offset: _,
            destination,
            gzip,
        } = self;

        builder
            .into_inner()
            .and_then(|mut writer| writer.flush())
            .context("finishing intermediate archive")?;

        if gzip {
            gzip::compress(&intermediate, &destination)?;
            if let Err(err) = intermediate.close() {
                tracing::debug!("removing intermediate archive: {err}");
            }
        } else {
            intermediate
                .persist(&destination)
                .map_err(|err| err.error)
                .with_context(|| format!("renaming archive to {}", destination.display()))?;
        }
    }
}
