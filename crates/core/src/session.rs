//! Ephemeral per-call state.
//!
//! Sessions live only in process memory. The store hands out one shared,
//! individually locked session per call identifier, so callbacks for different
//! calls never contend and callbacks for the same call run one at a time.

use crate::steps::{CollectedFields, FieldValue, STEP_COUNT, STEPS, StepDefinition};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Where a call currently is in the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    AwaitingInput(usize),
    Completing,
    Transferred,
    Terminated,
}

impl DialogueState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DialogueState::Transferred | DialogueState::Terminated)
    }
}

/// State of one call.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    /// Position in [`STEPS`]; equals [`STEP_COUNT`] once every field is collected.
    pub step_index: usize,
    /// Consecutive failed or empty answers at the current step.
    pub attempts: u32,
    pub fields: CollectedFields,
    pub created_at: DateTime<Utc>,
    state: DialogueState,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            step_index: 0,
            attempts: 0,
            fields: CollectedFields::default(),
            created_at: Utc::now(),
            state: DialogueState::AwaitingInput(0),
        }
    }

    pub fn state(&self) -> DialogueState {
        self.state
    }

    /// The step waiting for an answer, if the session is still collecting input.
    pub fn current_step(&self) -> Option<&'static StepDefinition> {
        match self.state {
            DialogueState::AwaitingInput(index) => STEPS.get(index),
            _ => None,
        }
    }

    /// Returns `true` for a brand-new session that has not heard anything yet.
    pub fn is_fresh(&self) -> bool {
        self.step_index == 0 && self.attempts == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Counts one failed or empty answer and returns the new total.
    pub fn register_failure(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Stores an accepted answer for the current step and moves to the next one.
    ///
    /// Once the last step is answered the session enters `Completing`.
    pub fn accept(&mut self, value: FieldValue) {
        self.fields.set(value);
        self.attempts = 0;
        self.step_index = (self.step_index + 1).min(STEP_COUNT);
        self.state = if self.step_index < STEP_COUNT {
            DialogueState::AwaitingInput(self.step_index)
        } else {
            DialogueState::Completing
        };
    }

    /// Moves the session into a terminal state.
    pub fn close(&mut self, state: DialogueState) {
        debug_assert!(state.is_terminal());
        self.state = state;
    }
}

pub type SharedSession = Arc<Mutex<CallSession>>;

/// In-memory map from call identifier to its session.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `call_id`, creating a fresh one on first contact.
    pub async fn get_or_create(&self, call_id: &str) -> SharedSession {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(call_id.to_string())
            .or_insert_with(|| {
                info!(call_id, "Creating call session");
                Arc::new(Mutex::new(CallSession::new(call_id)))
            })
            .clone()
    }

    pub async fn get(&self, call_id: &str) -> Option<SharedSession> {
        self.sessions.lock().await.get(call_id).cloned()
    }

    /// Forgets the session for `call_id`. Returns `true` if one existed.
    pub async fn delete(&self, call_id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(call_id).is_some();
        if removed {
            debug!(call_id, "Call session deleted");
        }
        removed
    }

    /// Drops sessions created more than `max_age` ago and returns how many went.
    ///
    /// A session locked by an in-flight callback is left alone until the next sweep.
    pub async fn evict_older_than(&self, max_age: TimeDelta) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|call_id, shared| match shared.try_lock() {
            Ok(session) if session.created_at < cutoff => {
                debug!(call_id, "Evicting stale call session");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
