//! Activity category enum as the single source of truth for category strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Semantic activity categories for tracked sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Coding,
    Debugging,
    Compiling,
    WritingDocs,
    CodeReviewing,
    Testing,
}

impl Category {
    /// String representation used on the delivery wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Coding => "Coding",
            Self::Debugging => "Debugging",
            Self::Compiling => "Compiling",
            Self::WritingDocs => "Writing Docs",
            Self::CodeReviewing => "Code Reviewing",
            Self::Testing => "Testing",
        }
    }

    /// Classifies a plain edit/selection/save/open signal by document content type.
    ///
    /// Markdown and plain text are documentation work; everything else is coding.
    /// Content types are the tags supplied by the signal source; no inference
    /// from file extensions happens here.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            "markdown" | "plaintext" => Self::WritingDocs,
            _ => Self::Coding,
        }
    }

    /// Classifies a task-run signal by task name.
    ///
    /// Returns `None` for task names that match neither "build" nor "test";
    /// such tasks are not tracked.
    #[must_use]
    pub fn from_task_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.contains("build") {
            Some(Self::Compiling)
        } else if name.contains("test") {
            Some(Self::CodeReviewing)
        } else {
            None
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Coding" => Ok(Self::Coding),
            "Debugging" => Ok(Self::Debugging),
            "Compiling" => Ok(Self::Compiling),
            "Writing Docs" => Ok(Self::WritingDocs),
            "Code Reviewing" => Ok(Self::CodeReviewing),
            "Testing" => Ok(Self::Testing),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown category strings.
#[derive(Debug, Clone, Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(String);
