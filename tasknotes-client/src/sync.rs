//! Task synchronization: list, create, update and delete against the remote
//! table, with the local list rebuilt from a full re-fetch after every
//! successful mutation.
//!
//! State is published through a [`tokio::sync::watch`] channel of
//! [`TaskBoard`]; feedback goes through the [`EventDispatcher`]. Operations
//! also return a `NoteResult`, but every failure has already been surfaced
//! (`TaskBoard::last_error` plus an `OperationFailed` event) by the time the
//! caller sees it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tasknotes_core::{
    models::{NewTask, OrderBy, Session, Task, TaskChanges, TaskId},
    validation::validate_title,
    NoteError, NoteResult,
};
use tokio::sync::watch;

use crate::events::{EventDispatcher, NoteEvent, Operation};
use crate::store::RemoteStore;

/// The creation surface and its draft fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeSheet {
    pub open: bool,
    pub title: String,
    pub description: String,
}

/// The edit surface, the selected task and the edited fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditSheet {
    pub open: bool,
    pub selected: Option<Task>,
    pub title: String,
    pub description: String,
}

/// Everything the notes screen renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBoard {
    /// Cached copy of the remote rows, newest first. Only ever replaced whole.
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub compose: ComposeSheet,
    pub editor: EditSheet,
    pub last_error: Option<String>,
}

/// Raises `loading` while alive. Nested guards (the re-fetch inside a
/// mutation) keep it raised until the outermost one drops.
struct LoadingGuard<'a> {
    sync: &'a TaskSync,
}

impl<'a> LoadingGuard<'a> {
    fn new(sync: &'a TaskSync) -> Self {
        if sync.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            sync.state.send_modify(|board| board.loading = true);
        }
        Self { sync }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.sync.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.sync.state.send_modify(|board| board.loading = false);
        }
    }
}

pub struct TaskSync {
    store: Arc<dyn RemoteStore>,
    table: String,
    state: watch::Sender<TaskBoard>,
    in_flight: AtomicUsize,
    events: Arc<EventDispatcher>,
}

impl TaskSync {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        table: impl Into<String>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        let (state, _) = watch::channel(TaskBoard::default());
        Self {
            store,
            table: table.into(),
            state,
            in_flight: AtomicUsize::new(0),
            events,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskBoard> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TaskBoard {
        self.state.borrow().clone()
    }

    pub fn event_dispatcher(&self) -> Arc<EventDispatcher> {
        self.events.clone()
    }

    pub fn open_compose(&self) {
        self.state.send_modify(|board| board.compose.open = true);
    }

    /// Hides the creation surface; drafts are kept for the next open.
    pub fn close_compose(&self) {
        self.state.send_modify(|board| board.compose.open = false);
    }

    pub fn set_compose_draft(&self, title: &str, description: &str) {
        self.state.send_modify(|board| {
            board.compose.title = title.to_string();
            board.compose.description = description.to_string();
        });
    }

    /// Selects `task` and opens the edit surface pre-filled with its fields.
    pub fn select_for_edit(&self, task: Task) {
        self.state.send_modify(|board| {
            board.editor = EditSheet {
                open: true,
                title: task.title.clone(),
                description: task.description_or_empty().to_string(),
                selected: Some(task),
            };
        });
    }

    pub fn set_edit_draft(&self, title: &str, description: &str) {
        self.state.send_modify(|board| {
            board.editor.title = title.to_string();
            board.editor.description = description.to_string();
        });
    }

    pub fn cancel_edit(&self) {
        self.state
            .send_modify(|board| board.editor = EditSheet::default());
    }

    fn begin(&self) -> LoadingGuard<'_> {
        self.state.send_modify(|board| board.last_error = None);
        LoadingGuard::new(self)
    }

    /// Surfaces `error` to the user and hands it back for the caller's `Err`.
    fn fail(&self, operation: Operation, error: NoteError) -> NoteError {
        tracing::warn!("{} on {} failed: {}", operation, self.table, error);
        let message = error.to_string();
        self.state
            .send_modify(|board| board.last_error = Some(message));
        self.events.emit_failure(operation, &error);
        error
    }

    /// Re-reads the full list after a mutation. A failing re-fetch has
    /// already been surfaced by `list` and does not undo the mutation.
    async fn refresh(&self, session: Option<&Session>) {
        if let Err(e) = self.list(session).await {
            tracing::warn!("Refresh after mutation failed: {}", e);
        }
    }

    /// Replaces the local list with every row visible to `session`, newest
    /// first, in exactly the order the store returned them.
    pub async fn list(&self, session: Option<&Session>) -> NoteResult<Vec<Task>> {
        let _loading = self.begin();

        let rows = match self
            .store
            .select_all(session, &self.table, &OrderBy::newest_first())
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Err(self.fail(Operation::List, e.into())),
        };

        let count = rows.len();
        self.state.send_modify(|board| board.tasks = rows.clone());
        tracing::info!("Loaded {} tasks from {}", count, self.table);
        self.events.emit(NoteEvent::TasksLoaded { count });

        Ok(rows)
    }

    /// Inserts a task owned by the session's principal.
    ///
    /// An empty (after trimming) title fails before any remote call. On
    /// success the compose surface is cleared and closed and the list is
    /// re-fetched; the new row's id and timestamp only arrive that way.
    pub async fn create(
        &self,
        session: Option<&Session>,
        title: &str,
        description: &str,
    ) -> NoteResult<()> {
        if let Err(e) = validate_title(title) {
            return Err(self.fail(Operation::Create, e.into()));
        }

        let _loading = self.begin();

        let principal = match self.store.current_user(session).await {
            Ok(Some(principal)) => principal,
            Ok(None) => return Err(self.fail(Operation::Create, NoteError::NotAuthenticated)),
            Err(e) => return Err(self.fail(Operation::Create, e.into())),
        };

        let row = NewTask {
            title: title.to_string(),
            description: description.to_string(),
            user_id: principal.id,
        };
        if let Err(e) = self.store.insert(session, &self.table, &row).await {
            return Err(self.fail(Operation::Create, e.into()));
        }

        tracing::info!("Created task for user {}", principal.id);
        self.state
            .send_modify(|board| board.compose = ComposeSheet::default());
        self.events.emit(NoteEvent::TaskCreated { title: row.title });

        self.refresh(session).await;
        Ok(())
    }

    /// Creates a task from the compose surface's drafts.
    pub async fn submit_compose(&self, session: Option<&Session>) -> NoteResult<()> {
        let compose = self.state.borrow().compose.clone();
        self.create(session, &compose.title, &compose.description)
            .await
    }

    /// Changes title and description of `selected`.
    ///
    /// With nothing selected this is a silent no-op: no remote call, no
    /// event, no state change.
    pub async fn update(
        &self,
        session: Option<&Session>,
        selected: Option<&Task>,
        title: &str,
        description: &str,
    ) -> NoteResult<()> {
        let Some(task) = selected else {
            tracing::debug!("Update requested with no task selected; ignoring");
            return Ok(());
        };

        if let Err(e) = validate_title(title) {
            return Err(self.fail(Operation::Update, e.into()));
        }

        let _loading = self.begin();

        let changes = TaskChanges {
            title: title.to_string(),
            description: description.to_string(),
        };
        if let Err(e) = self
            .store
            .update_by_id(session, &self.table, task.id, &changes)
            .await
        {
            return Err(self.fail(Operation::Update, e.into()));
        }

        tracing::info!("Updated task {}", task.id);
        self.state
            .send_modify(|board| board.editor = EditSheet::default());
        self.events.emit(NoteEvent::TaskUpdated { id: task.id });

        self.refresh(session).await;
        Ok(())
    }

    /// Saves the edit surface's drafts onto its selected task.
    pub async fn submit_edit(&self, session: Option<&Session>) -> NoteResult<()> {
        let editor = self.state.borrow().editor.clone();
        self.update(
            session,
            editor.selected.as_ref(),
            &editor.title,
            &editor.description,
        )
        .await
    }

    pub async fn delete(&self, session: Option<&Session>, id: TaskId) -> NoteResult<()> {
        let _loading = self.begin();

        if let Err(e) = self.store.delete_by_id(session, &self.table, id).await {
            return Err(self.fail(Operation::Delete, e.into()));
        }

        tracing::info!("Deleted task {}", id);
        self.events.emit(NoteEvent::TaskDeleted { id });

        self.refresh(session).await;
        Ok(())
    }
}
