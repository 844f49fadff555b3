//! Dialogue state machine.
//!
//! Drives one call through the questionnaire: validates each utterance with
//! the matching normalizer, applies the retry ceiling, escalates to an operator
//! (or apologises) when the caller cannot be understood, and hands a complete
//! set of answers to the [`CompletionPipeline`].

use crate::VoiceAction;
use crate::completion::CompletionPipeline;
use crate::normalize::normalize;
use crate::session::{CallSession, DialogueState, SessionStore};
use crate::steps::{STEPS, StepDefinition};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, instrument, warn};

const SILENCE_PREFIX: &str = "Scusa, non ti ho sentito.";
const TRANSFER_NOTICE: &str = "Non riesco a capire, ti passo un operatore. Resta in linea.";
pub const APOLOGY: &str =
    "Mi dispiace, non riesco a capire. Ti preghiamo di richiamare più tardi. Arrivederci.";
const TECHNICAL_ERROR: &str = "Si è verificato un problema tecnico e non sono riuscito a registrare la prenotazione. Ti preghiamo di richiamare più tardi.";

/// Retry and fallback policy, shared by every call.
#[derive(Debug, Clone)]
pub struct DialoguePolicy {
    /// Failed or empty answers tolerated at one step; one more triggers the fallback.
    pub max_retries: u32,
    pub forwarding_enabled: bool,
    pub forward_target: Option<String>,
}

impl DialoguePolicy {
    /// The operator number, only when forwarding is enabled and a target is set.
    pub fn transfer_target(&self) -> Option<&str> {
        if !self.forwarding_enabled {
            return None;
        }
        self.forward_target
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
    }
}

impl Default for DialoguePolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            forwarding_enabled: false,
            forward_target: None,
        }
    }
}

/// Why an answer did not advance the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Miss {
    Silence,
    Rejected,
}

/// Where "today" comes from when resolving relative dates.
#[derive(Debug, Clone, Copy)]
enum Clock {
    /// The current date in the restaurant's time zone.
    Zoned(Tz),
    Fixed(fn() -> NaiveDate),
}

impl Clock {
    fn today(&self) -> NaiveDate {
        match self {
            Clock::Zoned(tz) => Utc::now().with_timezone(tz).date_naive(),
            Clock::Fixed(today) => today(),
        }
    }
}

pub struct DialogueEngine {
    sessions: Arc<SessionStore>,
    pipeline: Arc<CompletionPipeline>,
    policy: DialoguePolicy,
    clock: Clock,
}

impl DialogueEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        pipeline: Arc<CompletionPipeline>,
        policy: DialoguePolicy,
    ) -> Self {
        Self {
            sessions,
            pipeline,
            policy,
            clock: Clock::Zoned(Tz::UTC),
        }
    }

    /// Resolves "oggi", "domani" and weekdays against the calendar date in `tz`.
    pub fn with_time_zone(mut self, tz: Tz) -> Self {
        self.clock = Clock::Zoned(tz);
        self
    }

    /// Pins "today" to a fixed source.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.clock = Clock::Fixed(today);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn policy(&self) -> &DialoguePolicy {
        &self.policy
    }

    /// Handles the inbound-call webhook: begins a session or repeats the current question.
    #[instrument(name = "voice_begin", skip_all, fields(call_id = %call_id))]
    pub async fn begin(&self, call_id: &str) -> VoiceAction {
        let session = self.acquire(call_id).await;
        match session.current_step() {
            Some(step) if session.is_fresh() => VoiceAction::Prompt(format!(
                "Benvenuto a {}. Ti aiuto a prenotare un tavolo. {}",
                self.pipeline.restaurant_name(),
                step.prompt
            )),
            Some(step) => VoiceAction::Prompt(step.prompt.to_string()),
            None => VoiceAction::Prompt(STEPS[0].prompt.to_string()),
        }
    }

    /// Handles one transcribed answer for `call_id`.
    ///
    /// The call's session stays locked for the whole transition, completion
    /// included, so duplicated callbacks for the same call are serialized.
    #[instrument(name = "voice_step", skip_all, fields(call_id = %call_id))]
    pub async fn handle_utterance(&self, call_id: &str, utterance: &str) -> VoiceAction {
        let mut session = self.acquire(call_id).await;
        let Some(step) = session.current_step() else {
            warn!(state = ?session.state(), "Session is not awaiting input; restarting questionnaire");
            return VoiceAction::Prompt(STEPS[0].prompt.to_string());
        };

        let utterance = utterance.trim();
        if utterance.is_empty() {
            return self.miss(&mut session, step, Miss::Silence).await;
        }

        let Some(value) = normalize(step.field, utterance, self.clock.today()) else {
            debug!(field = %step.field, "Answer rejected by normalizer");
            return self.miss(&mut session, step, Miss::Rejected).await;
        };

        info!(field = %step.field, "Answer accepted");
        session.accept(value);
        match session.current_step() {
            Some(next) => VoiceAction::Prompt(next.prompt.to_string()),
            None => self.complete(&mut session).await,
        }
    }

    /// Forgets a call the caller left before it finished.
    ///
    /// Waits for any in-flight callback on the same call, then closes and drops its session.
    #[instrument(name = "voice_abandon", skip_all, fields(call_id = %call_id))]
    pub async fn abandon(&self, call_id: &str) -> bool {
        let Some(shared) = self.sessions.get(call_id).await else {
            return false;
        };
        let mut session = shared.lock().await;
        if !session.is_closed() {
            info!(step = session.step_index, "Caller left mid-dialogue");
            session.close(DialogueState::Terminated);
        }
        self.sessions.delete(call_id).await
    }

    /// Locks the live session for `call_id`, skipping one that a concurrent
    /// callback has already closed.
    async fn acquire(&self, call_id: &str) -> OwnedMutexGuard<CallSession> {
        loop {
            let shared = self.sessions.get_or_create(call_id).await;
            let session = shared.lock_owned().await;
            if !session.is_closed() {
                return session;
            }
            debug!("Session closed by a concurrent callback; starting fresh");
        }
    }

    async fn miss(&self, session: &mut CallSession, step: &StepDefinition, miss: Miss) -> VoiceAction {
        let attempts = session.register_failure();
        if attempts > self.policy.max_retries {
            warn!(attempts, field = %step.field, "Retry ceiling exceeded");
            return self.escalate(session).await;
        }
        debug!(attempts, ?miss, "Re-prompting current step");
        match miss {
            Miss::Silence => VoiceAction::Prompt(format!("{SILENCE_PREFIX} {}", step.prompt)),
            Miss::Rejected => VoiceAction::Prompt(step.retry_prompt.to_string()),
        }
    }

    async fn escalate(&self, session: &mut CallSession) -> VoiceAction {
        let action = match self.policy.transfer_target() {
            Some(target) => {
                session.close(DialogueState::Transferred);
                VoiceAction::Transfer {
                    notice: TRANSFER_NOTICE.to_string(),
                    target: target.to_string(),
                }
            }
            None => {
                session.close(DialogueState::Terminated);
                VoiceAction::Hangup(APOLOGY.to_string())
            }
        };
        self.sessions.delete(&session.call_id).await;
        action
    }

    async fn complete(&self, session: &mut CallSession) -> VoiceAction {
        debug_assert_eq!(session.state(), DialogueState::Completing);
        let outcome = self.pipeline.complete(&session.call_id, &session.fields).await;

        session.close(DialogueState::Terminated);
        self.sessions.delete(&session.call_id).await;

        match outcome {
            Ok(confirmation) => {
                let booking = &confirmation.booking;
                let sms = if confirmation.notified {
                    " Riceverai un SMS di conferma."
                } else {
                    ""
                };
                info!(
                    event_id = %confirmation.event.id,
                    reused = confirmation.event_reused,
                    persisted = confirmation.persisted,
                    notified = confirmation.notified,
                    "Booking confirmed"
                );
                VoiceAction::Hangup(format!(
                    "Perfetto {}, la prenotazione per {} persone il {} alle {} è registrata.{} Grazie e a presto!",
                    booking.name,
                    booking.party_size,
                    booking.display_date(),
                    booking.display_time(),
                    sms
                ))
            }
            Err(e) => {
                error!(error = %e, "Completion pipeline failed");
                VoiceAction::Hangup(TECHNICAL_ERROR.to_string())
            }
        }
    }
}
