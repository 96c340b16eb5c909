use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tasknotes_client::{
    EventDispatcher, InMemoryStore, NoteEvent, RemoteStore, StoreResult, TaskSync, AuthBackend,
};
use tasknotes_core::models::{NewTask, OrderBy, Principal, Session, Task, TaskChanges, TaskId};
use tokio::sync::{Notify, Semaphore};

pub const TABLE: &str = "appnotes";
pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "password1";

/// In-memory backend with one confirmed user signed in, and a sync module on top.
#[allow(dead_code)]
pub async fn setup() -> (Arc<InMemoryStore>, TaskSync, Session) {
    let store = Arc::new(InMemoryStore::new());
    store.seed_user(EMAIL, PASSWORD);
    let session = store.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
    let sync = TaskSync::new(store.clone(), TABLE, Arc::new(EventDispatcher::new()));
    (store, sync, session)
}

/// Registers a callback that records every event, in order.
#[allow(dead_code)]
pub fn record_events(dispatcher: &EventDispatcher) -> Arc<Mutex<Vec<NoteEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    dispatcher
        .register_callback(move |event| seen_clone.lock().unwrap().push(event))
        .unwrap();
    seen
}

/// Drains the dispatcher and returns what was delivered by this call.
#[allow(dead_code)]
pub fn drain(dispatcher: &EventDispatcher, seen: &Arc<Mutex<Vec<NoteEvent>>>) -> Vec<NoteEvent> {
    seen.lock().unwrap().clear();
    dispatcher.process_events().unwrap();
    seen.lock().unwrap().clone()
}

/// Store that always returns the same rows for `select_all`, in the given order.
#[allow(dead_code)]
pub struct FixedRowsStore {
    pub rows: Vec<Task>,
}

#[async_trait]
impl RemoteStore for FixedRowsStore {
    async fn current_user(&self, session: Option<&Session>) -> StoreResult<Option<Principal>> {
        Ok(session.map(|s| s.user.clone()))
    }

    async fn select_all(
        &self,
        _session: Option<&Session>,
        _table: &str,
        _order: &OrderBy,
    ) -> StoreResult<Vec<Task>> {
        Ok(self.rows.clone())
    }

    async fn insert(&self, _: Option<&Session>, _: &str, _: &NewTask) -> StoreResult<()> {
        Ok(())
    }

    async fn update_by_id(
        &self,
        _: Option<&Session>,
        _: &str,
        _: TaskId,
        _: &TaskChanges,
    ) -> StoreResult<()> {
        Ok(())
    }

    async fn delete_by_id(&self, _: Option<&Session>, _: &str, _: TaskId) -> StoreResult<()> {
        Ok(())
    }
}

/// Wraps a store so each call announces itself and then blocks until a
/// permit is released. Lets a test look at state while a call is in flight.
#[allow(dead_code)]
pub struct GatedStore {
    pub inner: Arc<InMemoryStore>,
    pub entered: Arc<Notify>,
    pub release: Arc<Semaphore>,
}

#[allow(dead_code)]
impl GatedStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Semaphore::new(0)),
        }
    }

    async fn gate(&self) {
        self.entered.notify_one();
        self.release.acquire().await.unwrap().forget();
    }
}

#[async_trait]
impl RemoteStore for GatedStore {
    async fn current_user(&self, session: Option<&Session>) -> StoreResult<Option<Principal>> {
        self.gate().await;
        self.inner.current_user(session).await
    }

    async fn select_all(
        &self,
        session: Option<&Session>,
        table: &str,
        order: &OrderBy,
    ) -> StoreResult<Vec<Task>> {
        self.gate().await;
        self.inner.select_all(session, table, order).await
    }

    async fn insert(&self, session: Option<&Session>, table: &str, row: &NewTask) -> StoreResult<()> {
        self.gate().await;
        self.inner.insert(session, table, row).await
    }

    async fn update_by_id(
        &self,
        session: Option<&Session>,
        table: &str,
        id: TaskId,
        fields: &TaskChanges,
    ) -> StoreResult<()> {
        self.gate().await;
        self.inner.update_by_id(session, table, id, fields).await
    }

    async fn delete_by_id(&self, session: Option<&Session>, table: &str, id: TaskId) -> StoreResult<()> {
        self.gate().await;
        self.inner.delete_by_id(session, table, id).await
    }
}

#[async_trait]
impl AuthBackend for GatedStore {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> StoreResult<Session> {
        self.gate().await;
        self.inner.sign_in_with_password(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> StoreResult<Option<Session>> {
        self.gate().await;
        self.inner.sign_up(email, password).await
    }

    async fn sign_out(&self, session: &Session) -> StoreResult<()> {
        self.gate().await;
        self.inner.sign_out(session).await
    }
}
