/// Problems with the arguments of a run, detected before any archive is opened.
#[derive(thiserror::Error, Clone, Debug, displaydoc::Display, PartialEq, Eq)]
pub(crate) enum ValidationError {
    /// {0} must not be empty
    EmptyPath(&'static str),
    /// source does not exist: {0}
    MissingSource(String),
    /// destination does not exist: {0}
    MissingDestination(String),
    /// destination is not a directory: {0}
    NotADirectory(String),
}

/// archive {1} is malformed
#[derive(thiserror::Error, Debug, displaydoc::Display)]
pub(crate) struct CorruptArchive(#[source] pub(crate) std::io::Error, pub(crate) String);

/// entry {0} contains a .. segment
#[derive(thiserror::Error, Clone, Debug, displaydoc::Display)]
pub(crate) struct UnsafeEntry(pub(crate) String);
