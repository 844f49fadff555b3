//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the dialogue engine,
//! the optional database handle and the rendering settings used by every handler.

use crate::{config::Config, db::Db, twiml::VoiceResponseBuilder};
use std::sync::Arc;
use tablecall_core::dialogue::DialogueEngine;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DialogueEngine>,
    pub db: Option<Arc<Db>>,
    pub voice: VoiceResponseBuilder,
    pub config: Arc<Config>,
}
