/// A subtree of the archive, stored as `/`-separated segments with a trailing `/`.
///
/// The empty offset selects the whole archive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Offset(String);

impl Offset {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decide whether `entry` lies strictly below this offset and return its re-rooted path.
    pub(crate) fn accept(&self, entry: &str) -> Option<String> {
        if self.is_empty() {
            return Some(entry.to_owned());
        }
        let entry = canonical(entry);
        if entry.len() > self.0.len() {
            entry.strip_prefix(&self.0).map(str::to_owned)
        } else {
            None
        }
    }
}

impl std::str::FromStr for Offset {
    type Err = std::convert::Infallible;

    #[culpa::throws(Self::Err)]
    fn from_str(s: &str) -> Self {
        let mut offset = canonical(s);
        if !offset.is_empty() && !offset.ends_with('/') {
            offset.push('/');
        }
        Offset(offset)
    }
}

impl std::fmt::Display for Offset {
    #[culpa::throws(std::fmt::Error)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) {
        f.pad(&self.0)?;
    }
}

/// Archive paths compared on `/` boundaries: `\` becomes `/`, empty and `.` segments vanish and
/// a trailing `/` is kept.
fn canonical(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut out = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if !out.is_empty() && path.ends_with('/') {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(s: &str) -> Offset {
        s.parse().unwrap()
    }

    #[test]
    fn empty_offset_accepts_everything_unchanged() {
        let offset = offset("");
        assert!(offset.is_empty());
        for entry in ["a/", "./a/b", "/abs", "x\\y"] {
            assert_eq!(offset.accept(entry).as_deref(), Some(entry));
        }
        assert_eq!(self::offset("."), offset);
        assert_eq!(self::offset("/"), offset);
    }

    #[test]
    fn offset_gets_trailing_separator() {
        assert_eq!(offset("a").to_string(), "a/");
        assert_eq!(offset("./a//b/").to_string(), "a/b/");
        assert_eq!(offset(r"a\b").to_string(), "a/b/");
    }

    #[test]
    fn offset_directory_itself_is_excluded() {
        let offset = offset("a/");
        let accepted = ["a/", "a/b", "a/c/d"]
            .into_iter()
            .filter_map(|entry| offset.accept(entry))
            .collect::<Vec<_>>();
        similar_asserts::assert_eq!(accepted, ["b", "c/d"]);
    }

    #[test]
    fn entries_outside_the_offset_are_rejected() {
        let offset = offset("jdk-11");
        assert_eq!(offset.accept("jdk-11"), None);
        assert_eq!(offset.accept("jdk-110/bin/java"), None);
        assert_eq!(offset.accept("other/jdk-11/bin"), None);
        assert_eq!(offset.accept("jdk-11/bin/").as_deref(), Some("bin/"));
    }

    #[test]
    fn entry_spelling_is_canonicalized_before_matching() {
        let offset = offset("a/b");
        assert_eq!(offset.accept("./a/b/c").as_deref(), Some("c"));
        assert_eq!(offset.accept(r"a\b\c\d").as_deref(), Some("c/d"));
        assert_eq!(offset.accept("/a//b/./c/").as_deref(), Some("c/"));
        assert_eq!(offset.accept("./a/b/"), None);
    }
}
