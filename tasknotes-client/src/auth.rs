//! Sign-in, sign-up and sign-out flows.
//!
//! Mirrors the notes sync module: validation runs first and never reaches the
//! backend, backend messages are shown verbatim, `AuthScreen::loading` is
//! lowered on every exit path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tasknotes_core::{
    models::{Session, SignUpOutcome},
    validation::{validate_sign_in, validate_sign_up},
    NoteError, NoteResult, StoreError,
};
use tokio::sync::watch;

use crate::events::{EventDispatcher, NoteEvent, Operation};
use crate::store::AuthBackend;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthScreen {
    pub loading: bool,
    pub error: Option<String>,
}

/// Raises `loading` while alive; overlapping calls keep it raised until the
/// last one finishes.
struct LoadingGuard<'a> {
    flow: &'a AuthFlow,
}

impl<'a> LoadingGuard<'a> {
    fn new(flow: &'a AuthFlow) -> Self {
        flow.in_flight.fetch_add(1, Ordering::SeqCst);
        flow.state.send_modify(|screen| {
            screen.loading = true;
            screen.error = None;
        });
        Self { flow }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.flow.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.flow.state.send_modify(|screen| screen.loading = false);
        }
    }
}

/// Backend wording for duplicate sign-ups varies; match loosely.
fn is_existing_account(error: &StoreError) -> bool {
    let message = error.message.to_lowercase();
    message.contains("registered") || message.contains("exists")
}

pub struct AuthFlow {
    backend: Arc<dyn AuthBackend>,
    state: watch::Sender<AuthScreen>,
    in_flight: AtomicUsize,
    events: Arc<EventDispatcher>,
}

impl AuthFlow {
    pub fn new(backend: Arc<dyn AuthBackend>, events: Arc<EventDispatcher>) -> Self {
        let (state, _) = watch::channel(AuthScreen::default());
        Self {
            backend,
            state,
            in_flight: AtomicUsize::new(0),
            events,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthScreen> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthScreen {
        self.state.borrow().clone()
    }

    fn fail(&self, operation: Operation, error: NoteError) -> NoteError {
        tracing::warn!("{} failed: {}", operation, error);
        let message = error.to_string();
        self.state.send_modify(|screen| screen.error = Some(message));
        self.events.emit_failure(operation, &error);
        error
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> NoteResult<Session> {
        if let Err(e) = validate_sign_in(email, password) {
            return Err(self.fail(Operation::SignIn, e.into()));
        }

        let _loading = LoadingGuard::new(self);

        match self.backend.sign_in_with_password(email, password).await {
            Ok(session) => {
                tracing::info!("Signed in as {}", session.user.id);
                self.events.emit(NoteEvent::SignedIn {
                    email: email.to_string(),
                });
                Ok(session)
            }
            Err(e) => Err(self.fail(Operation::SignIn, e.into())),
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> NoteResult<SignUpOutcome> {
        // A repeated submit while another auth call runs is dropped
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            tracing::debug!("Sign-up requested while another auth call is running; ignoring");
            return Err(NoteError::InProgress("Sign-up".into()));
        }

        if let Err(e) = validate_sign_up(email, password, confirm_password) {
            return Err(self.fail(Operation::SignUp, e.into()));
        }

        let _loading = LoadingGuard::new(self);

        match self.backend.sign_up(email, password).await {
            Ok(Some(session)) => {
                tracing::info!("Signed up and signed in as {}", session.user.id);
                self.events.emit(NoteEvent::SignedUp {
                    confirmation_pending: false,
                });
                Ok(SignUpOutcome::SignedIn(session))
            }
            Ok(None) => {
                tracing::info!("Signed up {}; email confirmation pending", email);
                self.events.emit(NoteEvent::SignedUp {
                    confirmation_pending: true,
                });
                self.events.emit_alert(
                    "Account Created",
                    "Please check your email to confirm your account.",
                );
                Ok(SignUpOutcome::ConfirmationPending)
            }
            Err(e) if is_existing_account(&e) => {
                let error = self.fail(Operation::SignUp, NoteError::AccountExists(e.message));
                self.events.emit_alert(
                    "Account Exists",
                    "This email is already registered. Would you like to sign in instead?",
                );
                Err(error)
            }
            Err(e) => Err(self.fail(Operation::SignUp, e.into())),
        }
    }

    pub async fn sign_out(&self, session: &Session) -> NoteResult<()> {
        let _loading = LoadingGuard::new(self);

        match self.backend.sign_out(session).await {
            Ok(()) => {
                tracing::info!("Signed out {}", session.user.id);
                self.events.emit(NoteEvent::SignedOut);
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::SignOut, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_account_detection() {
        assert!(is_existing_account(&StoreError::new("User already registered")));
        assert!(is_existing_account(&StoreError::new(
            "A user with this email address has already been registered"
        )));
        assert!(is_existing_account(&StoreError::new("Account exists")));
        assert!(!is_existing_account(&StoreError::new("Signups not allowed for this instance")));
    }
}
