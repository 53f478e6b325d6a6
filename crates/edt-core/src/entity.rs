//! Entity identity: canonical tracking keys and entity type tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of resource an entity key refers to.
///
/// The aggregation core only emits `File`; the other variants exist on the
/// delivery wire for collectors that track applications or URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EntityType {
    #[default]
    File,
    App,
    Url,
}

impl EntityType {
    /// String representation used on the delivery wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::App => "App",
            Self::Url => "Url",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonicalizes a raw resource identifier into a tracking key.
///
/// Strips a trailing `.git` marker so a path and its version-control
/// counterpart collapse to the same tracked entity.
#[must_use]
pub fn normalize_entity(raw: &str) -> String {
    raw.strip_suffix(".git").unwrap_or(raw).to_string()
}
