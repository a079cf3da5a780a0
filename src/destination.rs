use crate::{error::ValidationError, path};
use anyhow::Error;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Where accepted entries go, fixed for a whole run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Destination {
    Archive { path: PathBuf, gzip: bool },
    Directory(PathBuf),
}

impl Destination {
    #[culpa::throws]
    pub(crate) fn new(raw: &str) -> Self {
        if raw.is_empty() {
            culpa::throw!(ValidationError::EmptyPath("destination"));
        }
        let path = path::normalize(raw)?;
        if raw.ends_with(".gz") {
            Destination::Archive { path, gzip: true }
        } else if raw.ends_with(".tar") {
            Destination::Archive { path, gzip: false }
        } else {
            Destination::Directory(path)
        }
    }

    pub(crate) fn path(&self) -> &Path {
        match self {
            Destination::Archive { path, .. } | Destination::Directory(path) => path,
        }
    }

    /// A directory destination must already exist, archives are created on demand.
    #[culpa::throws]
    pub(crate) fn validate(&self) {
        if let Destination::Directory(path) = self {
            match std::fs::metadata(path) {
                Ok(metadata) if metadata.is_dir() => {}
                Ok(_) => culpa::throw!(ValidationError::NotADirectory(path.display().to_string())),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    culpa::throw!(ValidationError::MissingDestination(
                        path.display().to_string()
                    ))
                }
                Err(err) => culpa::throw!(Error::new(err)
                    .context(format!("checking destination {}", path.display()))),
            }
        }
    }
}

impl std::fmt::Display for Destination {
    #[culpa::throws(std::fmt::Error)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) {
        write!(f, "{}", self.path().display())?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_selects_mode() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().display().to_string();

        assert_eq!(
            Destination::new(&format!("{base}/out.tar.gz")).unwrap(),
            Destination::Archive {
                path: dir.path().join("out.tar.gz"),
                gzip: true
            }
        );
        assert_eq!(
            Destination::new(&format!("{base}/out.tar")).unwrap(),
            Destination::Archive {
                path: dir.path().join("out.tar"),
                gzip: false
            }
        );
        assert_eq!(
            Destination::new(&format!("{base}/out")).unwrap(),
            Destination::Directory(dir.path().join("out"))
        );
    }

    #[test]
    fn empty_destination_is_rejected() {
        let err = Destination::new("").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::EmptyPath("destination"))
        );
    }

    #[test]
    fn missing_directory_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nonexistent");
        let err = Destination::Directory(missing.clone())
            .validate()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::MissingDestination(
                missing.display().to_string()
            ))
        );
    }

    #[test]
    fn file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"").unwrap();
        let err = Destination::Directory(file.clone()).validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::NotADirectory(file.display().to_string()))
        );
    }

    #[test]
    fn archives_need_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        Destination::Archive {
            path: dir.path().join("new.tar"),
            gzip: false,
        }
        .validate()
        .unwrap();
        Destination::Directory(dir.path().to_owned())
            .validate()
            .unwrap();
    }
}
