//! TableCall API Library Crate
//!
//! This library contains the web side of the reservation line: configuration,
//! Twilio webhooks, TwiML rendering, booking persistence and routing.
//! The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod twiml;
