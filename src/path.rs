use anyhow::{Context, Error};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

/// The process state a path is resolved against.
#[derive(Clone, Debug)]
pub(crate) struct Ambient {
    pub(crate) home: Option<PathBuf>,
    pub(crate) cwd: PathBuf,
}

impl Ambient {
    #[culpa::throws]
    pub(crate) fn current() -> Self {
        Self {
            home: home::home_dir(),
            cwd: std::env::current_dir().context("reading current directory")?,
        }
    }
}

/// Turn a user supplied path into a clean absolute one, see [`normalize_in`].
#[culpa::throws]
pub(crate) fn normalize(path: &str) -> PathBuf {
    normalize_in(path, &Ambient::current()?)
}

/// Canonicalize separators, expand a leading `~`, resolve `.`/`..` and anchor relative paths at
/// the working directory.
///
/// This is purely lexical, the filesystem is never consulted, so symlinked directories followed
/// by `..` resolve to the lexical parent. Applying it twice gives the same result as once.
pub(crate) fn normalize_in(path: &str, ambient: &Ambient) -> PathBuf {
    let native = native_separators(path);
    let expanded = expand_home(&native, ambient.home.as_deref());
    if expanded.is_absolute() {
        clean(&expanded)
    } else {
        clean(&ambient.cwd.join(expanded))
    }
}

fn native_separators(path: &str) -> String {
    let foreign = if MAIN_SEPARATOR == '/' { '\\' } else { '/' };
    path.replace(foreign, MAIN_SEPARATOR_STR)
}

fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_owned(),
        (Some(rest), Some(home)) if rest.starts_with(MAIN_SEPARATOR) => {
            home.join(rest.trim_start_matches(MAIN_SEPARATOR))
        }
        _ => PathBuf::from(path),
    }
}

/// Lexically resolve `.` and `..` components.
///
/// `..` directly below the root is dropped, leading `..` of a relative path are kept.
pub(crate) fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => out.push(component),
            },
            _ => out.push(component),
        }
    }
    if out.is_empty() {
        PathBuf::from(".")
    } else {
        out.iter().collect()
    }
}
