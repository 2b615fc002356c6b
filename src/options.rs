use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Knobs a host sets once per compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Folders searched, in order, by the filesystem include resolver.
    pub library_lookup: Vec<PathBuf>,
    /// Extension appended to include names that have none.
    pub include_extension: String,
    /// Fold include names to lower case before looking them up.
    pub lowercase_library_names: bool,
    /// Log the finished instruction listing at debug level.
    pub trace_listing: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            library_lookup: Vec::new(),
            include_extension: "nss".to_string(),
            lowercase_library_names: false,
            trace_listing: false,
        }
    }
}

impl CompileOptions {
    pub fn with_lookup(mut self, folder: impl Into<PathBuf>) -> Self {
        self.library_lookup.push(folder.into());
        self
    }

    /// The name an include is registered and looked up under.
    pub fn include_key(&self, name: &str) -> String {
        if self.lowercase_library_names {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }
}
