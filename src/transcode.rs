use crate::{
    destination::Destination,
    error::{CorruptArchive, ValidationError},
    gzip,
    link::{self, LinkCreator},
    materialize::Materializer,
    offset::Offset,
    path,
    rewrite::Rewriter,
};
use anyhow::{Context, Error};
use std::{
    fs::File,
    io::{BufReader, ErrorKind},
    path::{Path, PathBuf},
};

/// One run: read `source`, keep what lies below `offset`, deliver it to `destination`.
#[derive(Clone, Debug)]
pub(crate) struct Job {
    pub(crate) source: PathBuf,
    pub(crate) destination: Destination,
    pub(crate) offset: Offset,
}

/// What a run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    pub(crate) read: usize,
    pub(crate) accepted: usize,
    // always zero when writing an archive
    pub(crate) links: usize,
}

enum Sink<L> {
    Rewrite(Rewriter),
    Materialize(Materializer<L>),
}

impl Job {
    #[culpa::throws]
    pub(crate) fn new(source: &str, destination: &str, offset: &str) -> Self {
        if source.is_empty() {
            culpa::throw!(ValidationError::EmptyPath("source"));
        }
        Self {
            source: path::normalize(source)?,
            destination: Destination::new(destination)?,
            offset: offset.parse()?,
        }
    }

    fn is_gzip(&self) -> bool {
        self.source.to_string_lossy().ends_with(".gz")
    }

    #[culpa::throws]
    fn validate(&self) {
        match std::fs::metadata(&self.source) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                culpa::throw!(ValidationError::MissingSource(
                    self.source.display().to_string()
                ))
            }
            Err(err) => culpa::throw!(Error::new(err)
                .context(format!("checking source {}", self.source.display()))),
        }
        self.destination.validate()?;
    }

    #[culpa::throws]
    fn read_entries<L: LinkCreator>(&self, tar_path: &Path, sink: &mut Sink<L>) -> Summary {
        let file = File::open(tar_path)
            .with_context(|| format!("opening archive {}", tar_path.display()))?;
        let mut archive = tar::Archive::new(BufReader::new(file));

        let corrupt = |err: std::io::Error| CorruptArchive(err, self.source.display().to_string());
        let mut summary = Summary::default();
        let mut entries = archive.entries().map_err(corrupt)?;
        while let Some(mut entry) = entries.next().transpose().map_err(corrupt)? {
            summary.read += 1;
            let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let Some(rooted) = self.offset.accept(&path) else {
                tracing::trace!("skipping {path}");
                continue;
            };
            summary.accepted += 1;

            match sink {
                Sink::Rewrite(rewriter) => rewriter.append(&mut entry, &path, &rooted)?,
                Sink::Materialize(materializer) => {
                    materializer.append(&mut entry, &path, &rooted)?
                }
            }
        }
        summary
    }

    #[culpa::throws]
    pub(crate) fn run(&self) -> Summary {
        self.run_with(link::platform())?
    }

    #[culpa::throws]
    #[tracing::instrument(
        skip_all,
        fields(source = %self.source.display(), destination = %self.destination, offset = %self.offset),
    )]
    pub(crate) fn run_with(&self, links: impl LinkCreator) -> Summary {
        self.validate()?;

        let decompressed = if self.is_gzip() {
            Some(gzip::decompress(&self.source)?)
        } else {
            None
        };
        let tar_path = decompressed.as_deref().unwrap_or(self.source.as_path());

        let mut sink = match &self.destination {
            Destination::Archive { path, gzip } => {
                Sink::Rewrite(Rewriter::create(path, *gzip, self.offset.clone())?)
            }
            Destination::Directory(root) => {
                Sink::Materialize(Materializer::new(root.clone(), self.offset.clone(), links))
            }
        };
        let mut summary = self.read_entries(tar_path, &mut sink)?;

        match sink {
            Sink::Rewrite(rewriter) => rewriter.finish()?,
            Sink::Materialize(materializer) => summary.links = materializer.finish()?,
        }

        if let Some(temp) = decompressed {
            if let Err(err) = temp.close() {
                tracing::debug!("removing decompressed archive: {err}");
            }
        }

        tracing::info!(
            read = summary.read,
            accepted = summary.accepted,
            links = summary.links,
            "done"
        );
        summary
    }
}
