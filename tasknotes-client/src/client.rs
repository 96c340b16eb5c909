use crate::{
    auth::AuthFlow,
    config::ClientConfig,
    events::EventDispatcher,
    rest::SupabaseClient,
    store::{AuthBackend, RemoteStore},
    sync::TaskSync,
};
use std::sync::Arc;
use tasknotes_core::{
    models::{Session, SignUpOutcome, Task, TaskId},
    NoteResult,
};
use tokio::sync::RwLock;

/// Ties the auth flow and the task sync module to one current session.
///
/// The session lives here; each sync call receives it explicitly.
pub struct Client {
    auth: AuthFlow,
    tasks: TaskSync,
    session: RwLock<Option<Session>>,
    event_dispatcher: Arc<EventDispatcher>,
}

impl Client {
    pub fn new(config: ClientConfig) -> NoteResult<Self> {
        let backend = Arc::new(SupabaseClient::new(&config)?);
        tracing::info!(
            "Client configured for {} (table {})",
            backend.base_url(),
            config.table
        );
        Ok(Self::with_backends(backend.clone(), backend, &config.table))
    }

    pub fn from_env() -> NoteResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn with_backends(
        store: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthBackend>,
        table: &str,
    ) -> Self {
        let event_dispatcher = Arc::new(EventDispatcher::new());
        Self {
            auth: AuthFlow::new(auth, event_dispatcher.clone()),
            tasks: TaskSync::new(store, table, event_dispatcher.clone()),
            session: RwLock::new(None),
            event_dispatcher,
        }
    }

    pub fn event_dispatcher(&self) -> Arc<EventDispatcher> {
        self.event_dispatcher.clone()
    }

    pub fn auth(&self) -> &AuthFlow {
        &self.auth
    }

    pub fn tasks(&self) -> &TaskSync {
        &self.tasks
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> NoteResult<Session> {
        let session = self.auth.sign_in(email, password).await?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> NoteResult<SignUpOutcome> {
        let outcome = self.auth.sign_up(email, password, confirm_password).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            *self.session.write().await = Some(session.clone());
        }
        Ok(outcome)
    }

    /// Ends the session locally even when the backend call fails.
    pub async fn sign_out(&self) -> NoteResult<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        self.auth.sign_out(&session).await
    }

    pub async fn refresh(&self) -> NoteResult<Vec<Task>> {
        let session = self.session().await;
        self.tasks.list(session.as_ref()).await
    }

    pub async fn create_task(&self, title: &str, description: &str) -> NoteResult<()> {
        let session = self.session().await;
        self.tasks.create(session.as_ref(), title, description).await
    }

    /// Saves the edit surface of [`Client::tasks`] onto its selected task.
    pub async fn update_selected(&self) -> NoteResult<()> {
        let session = self.session().await;
        self.tasks.submit_edit(session.as_ref()).await
    }

    pub async fn update_task(
        &self,
        selected: Option<&Task>,
        title: &str,
        description: &str,
    ) -> NoteResult<()> {
        let session = self.session().await;
        self.tasks
            .update(session.as_ref(), selected, title, description)
            .await
    }

    pub async fn delete_task(&self, id: TaskId) -> NoteResult<()> {
        let session = self.session().await;
        self.tasks.delete(session.as_ref(), id).await
    }
}
