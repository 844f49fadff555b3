pub mod booking;
pub mod calendar;
pub mod completion;
pub mod dialogue;
pub mod messaging;
pub mod normalize;
pub mod session;
pub mod steps;

/// What the telephony runtime should do next on a call.
///
/// Produced by the dialogue engine and rendered to provider markup by the API layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceAction {
    /// Speak the text and listen for the caller's answer.
    Prompt(String),
    /// Speak the notice, then connect the call to `target`.
    Transfer { notice: String, target: String },
    /// Speak the message and end the call.
    Hangup(String),
}

impl VoiceAction {
    /// Returns `true` if the call ends (or leaves this service) after the action.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VoiceAction::Prompt(_))
    }

    /// The text spoken to the caller for this action.
    pub fn spoken_text(&self) -> &str {
        match self {
            VoiceAction::Prompt(text) => text,
            VoiceAction::Transfer { notice, .. } => notice,
            VoiceAction::Hangup(message) => message,
        }
    }
}
