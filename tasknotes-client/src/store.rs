//! Backend seams: the remote table store and the authentication service.
//!
//! Both traits are object safe so the client can hold them as
//! `Arc<dyn RemoteStore>` / `Arc<dyn AuthBackend>` and swap the HTTP adapter
//! for the in-memory one in tests.

use async_trait::async_trait;
use tasknotes_core::{
    models::{NewTask, OrderBy, Principal, Session, Task, TaskChanges, TaskId},
    StoreError,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Resolves the principal behind `session`, or `None` when there is no
    /// valid session.
    async fn current_user(&self, session: Option<&Session>) -> StoreResult<Option<Principal>>;

    /// All rows of `table` visible to `session`, in the requested order.
    async fn select_all(
        &self,
        session: Option<&Session>,
        table: &str,
        order: &OrderBy,
    ) -> StoreResult<Vec<Task>>;

    async fn insert(&self, session: Option<&Session>, table: &str, row: &NewTask)
        -> StoreResult<()>;

    async fn update_by_id(
        &self,
        session: Option<&Session>,
        table: &str,
        id: TaskId,
        fields: &TaskChanges,
    ) -> StoreResult<()>;

    async fn delete_by_id(&self, session: Option<&Session>, table: &str, id: TaskId)
        -> StoreResult<()>;
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> StoreResult<Session>;

    /// `Ok(None)` means the account exists but email confirmation is pending.
    async fn sign_up(&self, email: &str, password: &str) -> StoreResult<Option<Session>>;

    async fn sign_out(&self, session: &Session) -> StoreResult<()>;
}
