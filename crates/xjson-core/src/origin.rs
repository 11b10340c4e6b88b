use std::fmt;
use std::path::{Path, PathBuf};

/// Where a text buffer came from — used for relative-include resolution,
/// cycle detection, and error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    File(PathBuf),
    Url(String),
    Inline,
}

impl Origin {
    /// Directory to resolve relative `FilePath` includes against, if this
    /// origin is a file.
    pub fn directory(&self) -> Option<&Path> {
        match self {
            Origin::File(path) => path.parent(),
            Origin::Url(_) | Origin::Inline => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Origin::File(_))
    }

    /// A human-readable name used in diagnostics (`NamedSource` titles,
    /// recursion error messages).
    pub fn display_name(&self) -> String {
        match self {
            Origin::File(path) => path.display().to_string(),
            Origin::Url(url) => url.clone(),
            Origin::Inline => "<inline>".to_string(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
