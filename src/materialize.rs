use crate::{
    error::UnsafeEntry,
    link::LinkCreator,
    offset::Offset,
    path,
};
use anyhow::{Context, Error};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{ErrorKind, Read},
    path::{Component, Path, PathBuf},
};
use tar::EntryType;

/// A link whose creation waits until every other entry is on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Deferred {
    /// The raw link name, relative to the directory holding the link.
    Symlink(PathBuf),
    /// The already materialized entry to link to.
    Hardlink(PathBuf),
}

/// Writes accepted entries below a destination directory.
///
/// Links are collected during the pass over the archive and only created by
/// [`finish`](Self::finish), since their targets may appear later in the archive or not at all.
pub(crate) struct Materializer<L> {
    root: PathBuf,
    offset: Offset,
    links: L,
    deferred: BTreeMap<PathBuf, Deferred>,
}

impl<L: LinkCreator> Materializer<L> {
    pub(crate) fn new(root: PathBuf, offset: Offset, links: L) -> Self {
        Self {
            root,
            offset,
            links,
            deferred: BTreeMap::new(),
        }
    }

    /// Absolute entries are re-anchored at the root, `..` is refused.
    #[culpa::throws]
    fn destination_of(&self, rooted: &str) -> PathBuf {
        let mut dst = self.root.clone();
        for component in Path::new(rooted).components() {
            match component {
                Component::Normal(part) => dst.push(part),
                Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
                Component::ParentDir => culpa::throw!(UnsafeEntry(rooted.to_owned())),
            }
        }
        dst
    }

    /// Materialize `entry` at `rooted` below the root, or queue it if it is a link.
    #[culpa::throws]
    #[fn_error_context::context("materializing entry {}", original)]
    pub(crate) fn append<R: Read>(
        &mut self,
        entry: &mut tar::Entry<'_, R>,
        original: &str,
        rooted: &str,
    ) {
        let dst = self.destination_of(rooted)?;
        let kind = entry.header().entry_type();
        // pre-POSIX archives mark directories only by the trailing slash
        let is_dir = kind.is_dir() || (kind == EntryType::Regular && rooted.ends_with('/'));

        let dir = if is_dir {
            dst.as_path()
        } else {
            dst.parent().context("entry has no parent directory")?
        };
        if !dir.try_exists()? {
            tracing::debug!("create directory {} [{original}]", dir.display());
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }

        match kind {
            _ if is_dir => {}
            EntryType::Symlink => {
                let target = entry
                    .link_name()?
                    .context("symlink entry without a target")?;
                self.deferred
                    .insert(dst, Deferred::Symlink(target.into_owned()));
            }
            EntryType::Link => {
                let target = entry
                    .link_name()?
                    .context("hard link entry without a target")?;
                let target = target.to_string_lossy();
                match self.offset.accept(&target) {
                    Some(rooted_target) => {
                        let target = self.destination_of(&rooted_target)?;
                        // a link to a queued link points at that link's file
                        let target = match self.deferred.get(&target) {
                            Some(Deferred::Hardlink(file)) => file.clone(),
                            _ => target,
                        };
                        self.deferred.insert(dst, Deferred::Hardlink(target));
                    }
                    None => {
                        tracing::warn!("skipping hard link {original}, its target {target} lies outside the offset");
                    }
                }
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                tracing::debug!("untar of {} [{original}]", dst.display());
                // never write through a link left behind by an earlier run
                if dst.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink()) {
                    std::fs::remove_file(&dst)?;
                }
                let mut file = File::create(&dst)
                    .with_context(|| format!("creating file {}", dst.display()))?;
                std::io::copy(entry, &mut file)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let mode = entry.header().mode()? & 0o777;
                    file.set_permissions(std::fs::Permissions::from_mode(mode))?;
                }
            }
            other => {
                tracing::warn!("skipping {original}, entries of type {other:?} are not supported");
            }
        }
    }

    /// Create every queued link in path order and return how many were created.
    #[culpa::throws]
    pub(crate) fn finish(self) -> usize {
        for (link, deferred) in &self.deferred {
            match deferred {
                Deferred::Symlink(target) => self.symlink(link, target)?,
                Deferred::Hardlink(target) => self.hardlink(link, target)?,
            }
        }
        self.deferred.len()
    }

    #[culpa::throws]
    #[fn_error_context::context("creating link {} -> {}", link.display(), target.display())]
    fn symlink(&self, link: &Path, target: &Path) {
        tracing::debug!("create link {} [{}]", link.display(), target.display());

        let dir = link.parent().context("link has no parent directory")?;
        let resolved = path::clean(&dir.join(target));

        let placeholder = self.links.requires_target() && !resolved.try_exists()?;
        if placeholder {
            tracing::trace!("creating placeholder {}", resolved.display());
            if let Some(parent) = resolved.parent() {
                std::fs::create_dir_all(parent)?;
            }
            File::create(&resolved)?;
        }

        remove_existing(link)?;
        self.links.symlink(link, target, resolved.is_dir())?;

        if placeholder {
            std::fs::remove_file(&resolved)?;
        }
    }

    #[culpa::throws]
    #[fn_error_context::context("creating hard link {} -> {}", link.display(), target.display())]
    fn hardlink(&self, link: &Path, target: &Path) {
        tracing::debug!("create hard link {} [{}]", link.display(), target.display());
        remove_existing(link)?;
        std::fs::hard_link(target, link)?;
    }
}

/// Clear whatever a previous entry or run left where a link is about to go.
#[culpa::throws]
fn remove_existing(path: &Path) {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => std::fs::remove_dir(path)?,
        Ok(_) => std::fs::remove_file(path)?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => culpa::throw!(err),
    }
}
