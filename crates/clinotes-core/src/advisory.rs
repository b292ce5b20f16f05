use std::fmt;

/// A non-fatal, user-visible message. Advisories never change control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Informational, e.g. a change was applied while offline.
    Info(String),
    /// Something failed and was recovered from.
    Error(String),
}

impl Advisory {
    pub fn message(&self) -> &str {
        match self {
            Advisory::Info(msg) | Advisory::Error(msg) => msg,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Advisory::Error(_))
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
