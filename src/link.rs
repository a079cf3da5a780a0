use std::{io, path::Path};

/// The platform's way of creating symbolic links.
pub(crate) trait LinkCreator {
    /// Whether [`symlink`](Self::symlink) only succeeds while the target exists.
    fn requires_target(&self) -> bool;

    /// Create a symbolic link at `link` whose content is `target`, interpreted relative to the
    /// directory containing `link`.
    fn symlink(&self, link: &Path, target: &Path, target_is_dir: bool) -> io::Result<()>;
}

/// The link creator for the platform this was built for.
#[cfg(unix)]
pub(crate) fn platform() -> impl LinkCreator {
    Native
}

/// The link creator for the platform this was built for.
#[cfg(windows)]
pub(crate) fn platform() -> impl LinkCreator {
    Mklink
}

#[cfg(unix)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct Native;

#[cfg(unix)]
impl LinkCreator for Native {
    fn requires_target(&self) -> bool {
        false
    }

    #[culpa::throws(io::Error)]
    fn symlink(&self, link: &Path, target: &Path, _target_is_dir: bool) {
        std::os::unix::fs::symlink(target, link)?;
    }
}

/// Links through `cmd.exe /c mklink`, which works without the symlink privilege when developer
/// mode is enabled.
#[cfg(windows)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct Mklink;

#[cfg(windows)]
impl LinkCreator for Mklink {
    fn requires_target(&self) -> bool {
        true
    }

    #[culpa::throws(io::Error)]
    fn symlink(&self, link: &Path, target: &Path, target_is_dir: bool) {
        let (Some(dir), Some(name)) = (link.parent(), link.file_name()) else {
            culpa::throw!(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("link {} has no parent", link.display()),
            ));
        };
        let target = target.to_string_lossy().replace('/', "\\");

        let mut command = std::process::Command::new("cmd.exe");
        command.current_dir(dir).args(["/c", "mklink"]);
        if target_is_dir {
            command.arg("/d");
        }
        let output = command.arg(name).arg(&target).output()?;
        if !output.status.success() {
            culpa::throw!(io::Error::other(format!(
                "mklink {} {target} failed with {}: {}",
                name.to_string_lossy(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim(),
            )));
        }
    }
}
