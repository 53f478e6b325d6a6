//! Signal routing: maps raw editor notifications onto tracker operations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::category::Category;
use crate::clock::{Clock, SystemClock};
use crate::entity::normalize_entity;
use crate::signal::{DocumentRef, Signal};
use crate::sink::Sink;
use crate::tracker::Tracker;
use crate::workspace::WorkspaceResolver;

/// Pending debounced notebook edits, superseded by generation.
#[derive(Default)]
struct NotebookEdits {
    pending: HashMap<String, u64>,
    next_generation: u64,
}

/// Routes inbound [`Signal`]s to the aggregation core.
///
/// Owns the workspace resolution step: a signal whose document lies outside
/// every configured workspace root is dropped by the tracker with a
/// diagnostic, never an error.
pub struct Router<S, C = SystemClock> {
    tracker: Tracker<S, C>,
    workspaces: WorkspaceResolver,
    notebooks: Arc<Mutex<NotebookEdits>>,
}

impl<S, C> Clone for Router<S, C> {
    fn clone(&self) -> Self {
        Self {
            tracker: self.tracker.clone(),
            workspaces: self.workspaces.clone(),
            notebooks: Arc::clone(&self.notebooks),
        }
    }
}

impl<S: Sink, C: Clock> Router<S, C> {
    pub fn new(tracker: Tracker<S, C>, workspaces: WorkspaceResolver) -> Self {
        Self {
            tracker,
            workspaces,
            notebooks: Arc::new(Mutex::new(NotebookEdits::default())),
        }
    }

    /// Dispatches one editor notification.
    pub async fn handle(&self, signal: Signal) {
        match signal {
            Signal::DocumentChanged { document }
            | Signal::DocumentOpened { document }
            | Signal::SelectionChanged { document } => {
                let category = Category::from_content_type(&document.content_type);
                self.record(category, &document, false).await;
            }
            Signal::DocumentSaved { document } => {
                let category = Category::from_content_type(&document.content_type);
                self.record(category, &document, true).await;
            }
            Signal::DocumentClosed { document } => {
                let entity = normalize_entity(&document.path);
                tracing::debug!(entity = %entity, "document closed");
                self.tracker.close_entity(&entity, true).await;
                self.tracker.release_entity(&entity).await;
            }
            Signal::EditorFocusChanged { document } => {
                self.tracker.flush_all(false).await;
                match document {
                    Some(document) => {
                        let category = Category::from_content_type(&document.content_type);
                        self.record(category, &document, false).await;
                    }
                    None => self.tracker.clear_current_entity().await,
                }
            }
            Signal::DebugSessionStarted { document } | Signal::BreakpointsChanged { document } => {
                if let Some(document) = document {
                    self.record(Category::Debugging, &document, false).await;
                }
            }
            Signal::DebugSessionChanged { document } => {
                if let Some(document) = document {
                    let entity = normalize_entity(&document.path);
                    self.tracker.close_entity(&entity, false).await;
                    self.record(Category::Debugging, &document, false).await;
                }
            }
            Signal::DebugSessionTerminated { document } => {
                if let Some(document) = document {
                    let entity = normalize_entity(&document.path);
                    self.tracker.close_entity(&entity, false).await;
                }
            }
            Signal::TaskStarted {
                task_name,
                document,
            } => {
                if let (Some(category), Some(document)) =
                    (Category::from_task_name(&task_name), document)
                {
                    self.record(category, &document, false).await;
                }
            }
            Signal::TaskEnded {
                task_name,
                document,
            } => {
                if let (Some(category), Some(document)) =
                    (Category::from_task_name(&task_name), document)
                {
                    self.record(category, &document, false).await;
                    let entity = normalize_entity(&document.path);
                    self.tracker.close_entity(&entity, false).await;
                }
            }
            Signal::NotebookOpened { document } | Signal::NotebookSaved { document } => {
                self.record(Category::Coding, &document, false).await;
            }
            Signal::NotebookChanged {
                document,
                cell_executed,
            } => {
                if cell_executed {
                    self.record(Category::Compiling, &document, false).await;
                } else {
                    self.schedule_notebook_edit(document).await;
                }
            }
        }
    }

    async fn record(&self, category: Category, document: &DocumentRef, is_write: bool) {
        let project = self.workspaces.resolve(Path::new(&document.path));
        self.tracker
            .record_activity(category, document, project, is_write)
            .await;
    }

    /// Coalesces bursts of notebook edit signals into one record per
    /// quiescence window, so cell-by-cell churn does not thrash the session
    /// store.
    async fn schedule_notebook_edit(&self, document: DocumentRef) {
        let generation = {
            let mut notebooks = self.notebooks.lock().await;
            let generation = notebooks.next_generation;
            notebooks.next_generation += 1;
            notebooks.pending.insert(document.path.clone(), generation);
            generation
        };

        let this = self.clone();
        let delay = self.tracker.config().notebook_edit_debounce;
        tokio::spawn(async move {
            sleep(delay).await;
            let still_pending = {
                let mut notebooks = this.notebooks.lock().await;
                if notebooks.pending.get(&document.path) == Some(&generation) {
                    notebooks.pending.remove(&document.path);
                    true
                } else {
                    false
                }
            };
            if still_pending {
                this.record(Category::Coding, &document, false).await;
            }
        });
    }
}
