//! In-process backend implementing both [`RemoteStore`] and [`AuthBackend`].
//!
//! Behaves like a hosted project with row-level security enabled on the notes
//! table: rows are only visible to and writable by their owner, anonymous
//! selects return nothing and anonymous inserts are rejected. Used by the test
//! suites and for running the client without a network.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tasknotes_core::{
    models::{NewTask, OrderBy, Principal, Session, SortDirection, Task, TaskChanges, TaskId},
    StoreError,
};
use uuid::Uuid;

use crate::store::{AuthBackend, RemoteStore, StoreResult};

/// Backend call kinds, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CurrentUser,
    Select,
    Insert,
    Update,
    Delete,
    SignIn,
    SignUp,
    SignOut,
}

#[derive(Debug, Clone)]
struct Account {
    principal: Principal,
    password: String,
    confirmed: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, Uuid>,
    tables: HashMap<String, Vec<Task>>,
    next_id: TaskId,
    last_created_at: Option<DateTime<Utc>>,
    calls: HashMap<StoreOp, usize>,
    failures: HashMap<StoreOp, StoreError>,
    require_confirmation: bool,
}

impl MemoryState {
    /// Counts the call and pops an injected failure, if one is armed.
    fn enter(&mut self, op: StoreOp) -> StoreResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn principal_for(&self, session: Option<&Session>) -> Option<Principal> {
        let user_id = self.sessions.get(&session?.access_token)?;
        self.accounts
            .values()
            .find(|account| account.principal.id == *user_id)
            .map(|account| account.principal.clone())
    }

    fn issue_session(&mut self, principal: &Principal) -> Session {
        let token = format!("mem_{}", Uuid::new_v4().simple());
        self.sessions.insert(token.clone(), principal.id);
        Session {
            access_token: token,
            refresh_token: Some(format!("memr_{}", Uuid::new_v4().simple())),
            user: principal.clone(),
        }
    }

    /// Strictly increasing so newest-first ordering is never ambiguous.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign-ups return no session until [`InMemoryStore::confirm_email`] is called.
    pub fn with_email_confirmation() -> Self {
        let store = Self::new();
        store.guard().require_confirmation = true;
        store
    }

    fn guard(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::new("in-memory store lock poisoned"))
    }

    /// Registers a confirmed account directly, bypassing sign-up.
    pub fn seed_user(&self, email: &str, password: &str) -> Principal {
        let principal = Principal {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        self.guard().accounts.insert(
            email.to_string(),
            Account {
                principal: principal.clone(),
                password: password.to_string(),
                confirmed: true,
            },
        );
        principal
    }

    pub fn confirm_email(&self, email: &str) -> bool {
        match self.guard().accounts.get_mut(email) {
            Some(account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Arms a one-shot failure for the next call of `op`.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.guard().failures.insert(op, error);
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.guard().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.guard().calls.values().sum()
    }

    /// Raw table contents in insertion order, ignoring ownership.
    pub fn rows(&self, table: &str) -> Vec<Task> {
        self.guard().tables.get(table).cloned().unwrap_or_default()
    }
}

fn rls_violation(table: &str) -> StoreError {
    StoreError::new(format!(
        "new row violates row-level security policy for table \"{table}\""
    ))
    .with_code("42501")
    .with_status(401)
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn current_user(&self, session: Option<&Session>) -> StoreResult<Option<Principal>> {
        let mut state = self.state()?;
        state.enter(StoreOp::CurrentUser)?;
        Ok(state.principal_for(session))
    }

    async fn select_all(
        &self,
        session: Option<&Session>,
        table: &str,
        order: &OrderBy,
    ) -> StoreResult<Vec<Task>> {
        let mut state = self.state()?;
        state.enter(StoreOp::Select)?;

        let Some(principal) = state.principal_for(session) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<Task> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.user_id == principal.id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        match order.column.as_str() {
            "created_at" => rows.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            "id" => rows.sort_by_key(|row| row.id),
            "title" => rows.sort_by(|a, b| a.title.cmp(&b.title)),
            other => {
                return Err(StoreError::new(format!(
                    "column {table}.{other} does not exist"
                ))
                .with_code("42703")
                .with_status(400));
            }
        }
        if order.direction == SortDirection::Desc {
            rows.reverse();
        }

        Ok(rows)
    }

    async fn insert(&self, session: Option<&Session>, table: &str, row: &NewTask) -> StoreResult<()> {
        let mut state = self.state()?;
        state.enter(StoreOp::Insert)?;

        let principal = state
            .principal_for(session)
            .ok_or_else(|| rls_violation(table))?;
        if principal.id != row.user_id {
            return Err(rls_violation(table));
        }

        state.next_id += 1;
        let task = Task {
            id: state.next_id,
            title: row.title.clone(),
            description: Some(row.description.clone()),
            user_id: row.user_id,
            created_at: state.next_created_at(),
        };
        state.tables.entry(table.to_string()).or_default().push(task);
        Ok(())
    }

    async fn update_by_id(
        &self,
        session: Option<&Session>,
        table: &str,
        id: TaskId,
        fields: &TaskChanges,
    ) -> StoreResult<()> {
        let mut state = self.state()?;
        state.enter(StoreOp::Update)?;

        // Rows outside the caller's visibility are silently unaffected.
        let Some(principal) = state.principal_for(session) else {
            return Ok(());
        };
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows
                .iter_mut()
                .filter(|row| row.id == id && row.user_id == principal.id)
            {
                row.title = fields.title.clone();
                row.description = Some(fields.description.clone());
            }
        }
        Ok(())
    }

    async fn delete_by_id(&self, session: Option<&Session>, table: &str, id: TaskId) -> StoreResult<()> {
        let mut state = self.state()?;
        state.enter(StoreOp::Delete)?;

        let Some(principal) = state.principal_for(session) else {
            return Ok(());
        };
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|row| !(row.id == id && row.user_id == principal.id));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for InMemoryStore {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> StoreResult<Session> {
        let mut state = self.state()?;
        state.enter(StoreOp::SignIn)?;

        let account = match state.accounts.get(email) {
            Some(account) if account.password == password => account.clone(),
            _ => {
                return Err(StoreError::new("Invalid login credentials")
                    .with_code("invalid_credentials")
                    .with_status(400))
            }
        };
        if !account.confirmed {
            return Err(StoreError::new("Email not confirmed")
                .with_code("email_not_confirmed")
                .with_status(400));
        }

        Ok(state.issue_session(&account.principal))
    }

    async fn sign_up(&self, email: &str, password: &str) -> StoreResult<Option<Session>> {
        let mut state = self.state()?;
        state.enter(StoreOp::SignUp)?;

        if state.accounts.contains_key(email) {
            return Err(StoreError::new("User already registered")
                .with_code("user_already_exists")
                .with_status(422));
        }

        let principal = Principal {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        let confirmed = !state.require_confirmation;
        state.accounts.insert(
            email.to_string(),
            Account {
                principal: principal.clone(),
                password: password.to_string(),
                confirmed,
            },
        );

        if confirmed {
            Ok(Some(state.issue_session(&principal)))
        } else {
            Ok(None)
        }
    }

    async fn sign_out(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.state()?;
        state.enter(StoreOp::SignOut)?;
        state.sessions.remove(&session.access_token);
        Ok(())
    }
}
