use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// A script name used as a symbol-table key.
///
/// Cloning is cheap (the text is shared) and equality is structural, so two
/// identifiers created from the same text always compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(Arc<str>);

impl Identifier {
    pub fn new(label: &str) -> Self {
        Identifier(Arc::from(label))
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(label: &str) -> Self {
        Identifier::new(label)
    }
}

impl From<String> for Identifier {
    fn from(label: String) -> Self {
        Identifier(Arc::from(label))
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
