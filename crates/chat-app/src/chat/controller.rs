use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gramgpt_llm::{ChatSession, ProviderError, ProviderPart, create_session};
use snafu::{ResultExt, Snafu};
use tokio::sync::watch;

use super::copy::{FILE_READ_FAILURE_MESSAGE, PROVIDER_FAILURE_MESSAGE, init_failure_message};
use super::events::{ChatSnapshot, SendFailure, SendOutcome, SendRejection};
use super::input::{InputLimits, UserInput, normalize};
use super::message::{Part, Transcript, Turn};
use super::state::{SessionState, SessionTransition, TransitionRejection, TransitionResult};
use crate::settings::{AppSettings, SettingsError};

/// Why the session handle could not be created.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InitError {
    #[snafu(display("{source}"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("{source}"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
}

struct ControllerInner {
    state: SessionState,
    transcript: Transcript,
    error_message: Option<String>,
    session: Option<Arc<dyn ChatSession>>,
}

impl ControllerInner {
    fn transition(&mut self, transition: SessionTransition) -> TransitionResult {
        let next = self.state.apply(transition)?;
        self.state = next.clone();
        Ok(next)
    }

    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            status: self.state.clone(),
            transcript: self.transcript.clone(),
            is_sending: self.state.is_sending(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Owns the transcript and the provider session; the only mutator of either.
///
/// All state sits behind one lock that is never held across an await point, so the
/// guard check and the transition into `Sending` happen atomically even when the
/// controller is shared between tasks.
pub struct SessionController {
    inner: Mutex<ControllerInner>,
    snapshots: watch::Sender<ChatSnapshot>,
    limits: InputLimits,
}

impl SessionController {
    /// Creates a controller in the `Initializing` state.
    pub fn new(limits: InputLimits) -> Self {
        let inner = ControllerInner {
            state: SessionState::Initializing,
            transcript: Transcript::new(),
            error_message: None,
            session: None,
        };
        let (snapshots, _) = watch::channel(inner.snapshot());

        Self {
            inner: Mutex::new(inner),
            snapshots,
            limits,
        }
    }

    /// Builds the controller and resolves initialization from settings.
    pub fn from_settings(settings: &AppSettings) -> Self {
        let controller = Self::new(settings.input_limits());
        let _ = controller.initialize(|| {
            let config = settings.to_provider_config().context(SettingsSnafu {
                stage: "init-provider-config",
            })?;
            create_session(config).context(ProviderSnafu {
                stage: "init-create-session",
            })
        });
        controller
    }

    /// Resolves `Initializing` into `Ready` or `InitFailed`.
    ///
    /// Runs the factory at most once per controller; later calls are rejected without
    /// touching the existing session.
    pub fn initialize<F>(&self, factory: F) -> TransitionResult
    where
        F: FnOnce() -> Result<Arc<dyn ChatSession>, InitError>,
    {
        let mut inner = self.lock();
        if inner.state != SessionState::Initializing {
            tracing::warn!(state = ?inner.state, "ignoring repeated session initialization");
            return Err(TransitionRejection::NotInitializing);
        }

        let result = match factory() {
            Ok(session) => {
                tracing::info!(
                    provider_id = %session.id(),
                    model_id = %session.model(),
                    "chat session initialized"
                );
                inner.session = Some(session);
                inner.transition(SessionTransition::InitSucceeded)
            }
            Err(error) => {
                tracing::error!(error = %error, "chat session initialization failed");
                inner.transition(SessionTransition::InitFailed(init_failure_message(&error)))
            }
        };

        self.publish(&inner);
        result
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.lock().state.is_sending()
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    pub fn transcript(&self) -> Transcript {
        self.lock().transcript.clone()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.lock().snapshot()
    }

    /// Receives a fresh snapshot after every state, transcript or error change.
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshots.subscribe()
    }

    /// Runs one send cycle: normalize, append the user turn, call the provider,
    /// then append the reply or record the failure.
    ///
    /// Rejected commands have no effect at all. Accepted commands always end back in
    /// `Idle`, including when the returned future is dropped early.
    pub async fn send(&self, input: UserInput) -> SendOutcome {
        let session = match self.accept(&input) {
            Ok(session) => session,
            Err(rejection) => {
                tracing::debug!(?rejection, "send ignored");
                return SendOutcome::Ignored(rejection);
            }
        };
        let in_flight = InFlight::new(self);

        let parts = match normalize(&input, self.limits).await {
            Ok(parts) => parts,
            Err(error) => {
                tracing::warn!(error = %error, "failed to normalize attachment");
                in_flight.finish(|inner| {
                    inner.error_message = Some(FILE_READ_FAILURE_MESSAGE.to_string());
                });
                return SendOutcome::Failed(SendFailure::FileRead);
            }
        };

        let Some(user_turn) = Turn::user(parts) else {
            in_flight.finish(|_| {});
            return SendOutcome::Ignored(SendRejection::EmptyInput);
        };
        let provider_parts = user_turn.parts().iter().map(to_provider_part).collect();

        {
            let mut inner = self.lock();
            inner.transcript.push(user_turn);
            self.publish(&inner);
        }

        let result = session.send_message(provider_parts).await;

        match result {
            Ok(text) => match Turn::model_text(text.clone()) {
                Some(model_turn) => {
                    in_flight.finish(|inner| {
                        inner.transcript.push(model_turn);
                        inner.error_message = None;
                    });
                    SendOutcome::Replied { text }
                }
                None => {
                    tracing::warn!("provider returned an empty reply");
                    in_flight.finish(record_provider_failure);
                    SendOutcome::Failed(SendFailure::Provider)
                }
            },
            Err(error) => {
                tracing::warn!(
                    provider_id = %session.id(),
                    model_id = %session.model(),
                    error = %error,
                    "provider call failed"
                );
                in_flight.finish(record_provider_failure);
                SendOutcome::Failed(SendFailure::Provider)
            }
        }
    }

    /// Guard check and `BeginSend` under a single lock acquisition.
    fn accept(&self, input: &UserInput) -> Result<Arc<dyn ChatSession>, SendRejection> {
        let mut inner = self.lock();

        if inner.state.is_sending() {
            return Err(SendRejection::Busy);
        }
        let Some(session) = inner.session.clone() else {
            return Err(SendRejection::Unavailable);
        };
        if !inner.state.accepts_send() {
            return Err(SendRejection::Unavailable);
        }
        if input.is_empty() {
            return Err(SendRejection::EmptyInput);
        }

        if inner.transition(SessionTransition::BeginSend).is_err() {
            return Err(SendRejection::Busy);
        }
        inner.error_message = None;
        self.publish(&inner);
        Ok(session)
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &ControllerInner) {
        self.snapshots.send_replace(inner.snapshot());
    }
}

/// Returns the controller to `Idle` exactly once per accepted send.
struct InFlight<'a> {
    controller: &'a SessionController,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(controller: &'a SessionController) -> Self {
        Self {
            controller,
            armed: true,
        }
    }

    fn finish(mut self, update: impl FnOnce(&mut ControllerInner)) {
        self.armed = false;
        let mut inner = self.controller.lock();
        update(&mut inner);
        Self::finish_send(self.controller, &mut inner);
    }

    fn finish_send(controller: &SessionController, inner: &mut ControllerInner) {
        if let Err(rejection) = inner.transition(SessionTransition::FinishSend) {
            tracing::error!(?rejection, state = ?inner.state, "send finished outside Sending");
        }
        controller.publish(inner);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        tracing::warn!("send dropped before completion; returning to idle");
        let mut inner = self.controller.lock();
        Self::finish_send(self.controller, &mut inner);
    }
}

fn record_provider_failure(inner: &mut ControllerInner) {
    inner.error_message = Some(PROVIDER_FAILURE_MESSAGE.to_string());
}

fn to_provider_part(part: &Part) -> ProviderPart {
    match part {
        Part::Text(text) => ProviderPart::text(text.clone()),
        Part::InlineImage(image) => {
            ProviderPart::inline_data(image.mime_type.clone(), image.data.clone())
        }
    }
}
