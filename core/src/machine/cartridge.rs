//! Cartridge identity

use std::fmt;

/// Name and bank-switching type of the loaded cartridge
///
/// The name selects the save-state file names; the type is written into every
/// save-state header and must match on load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartridgeIdentity {
    name: String,
    kind: String,
}

impl CartridgeIdentity {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bank-switching type, e.g. `"F8SC"`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Name usable as a file stem
    ///
    /// Path separators and other characters that are invalid in file names on
    /// common platforms are replaced with `_`.
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        if stem.is_empty() {
            "untitled".to_string()
        } else {
            stem
        }
    }
}

impl fmt::Display for CartridgeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}
