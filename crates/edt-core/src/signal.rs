//! Raw editor signals consumed by the aggregation core.

use serde::{Deserialize, Serialize};

/// A reference to the document a signal concerns.
///
/// # Path Safety
///
/// `path` is carried as-is from the signal source. Consumers should validate
/// and normalize paths before performing any filesystem operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Absolute path or resource URI of the document.
    pub path: String,
    /// Content-type tag supplied by the editor (e.g. "rust", "markdown").
    pub content_type: String,
    /// Current number of lines in the document.
    #[serde(default)]
    pub line_count: u32,
    /// Cursor offset within the current line.
    #[serde(default)]
    pub cursor_offset: u32,
}

/// A discrete notification from the host editor.
///
/// Debug and task signals carry the document of the active editor at the time
/// the signal fired; `None` means no editor was focused, and the signal is
/// dropped by the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    DocumentChanged {
        document: DocumentRef,
    },
    DocumentOpened {
        document: DocumentRef,
    },
    DocumentSaved {
        document: DocumentRef,
    },
    DocumentClosed {
        document: DocumentRef,
    },
    SelectionChanged {
        document: DocumentRef,
    },
    /// Focus moved to another editor, or away from the editor entirely.
    EditorFocusChanged {
        document: Option<DocumentRef>,
    },
    DebugSessionStarted {
        document: Option<DocumentRef>,
    },
    DebugSessionChanged {
        document: Option<DocumentRef>,
    },
    DebugSessionTerminated {
        document: Option<DocumentRef>,
    },
    BreakpointsChanged {
        document: Option<DocumentRef>,
    },
    TaskStarted {
        task_name: String,
        document: Option<DocumentRef>,
    },
    TaskEnded {
        task_name: String,
        document: Option<DocumentRef>,
    },
    NotebookOpened {
        document: DocumentRef,
    },
    NotebookChanged {
        document: DocumentRef,
        /// Whether this change reports a completed cell execution.
        #[serde(default)]
        cell_executed: bool,
    },
    NotebookSaved {
        document: DocumentRef,
    },
}
