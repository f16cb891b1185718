use std::fmt;

/// An opaque upstream list identifier, e.g. `goog-malware-shavar`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListName(String);

impl ListName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ListName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ListName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
