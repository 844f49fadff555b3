//! Renders [`VoiceAction`]s as TwiML documents for the telephony provider.

use tablecall_core::VoiceAction;
use tablecall_core::dialogue::APOLOGY;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const FALLBACK_NOTICE: &str = "Non ho ricevuto risposta.";

/// Content type for every voice webhook response.
pub const TWIML_CONTENT_TYPE: &str = "text/xml";

#[derive(Debug, Clone)]
pub struct VoiceResponseBuilder {
    step_url: String,
    language: String,
}

impl VoiceResponseBuilder {
    /// `base_url` is the externally reachable origin, without a trailing slash.
    pub fn new(base_url: &str, language: impl Into<String>) -> Self {
        Self {
            step_url: format!("{}/voice/step", base_url.trim_end_matches('/')),
            language: language.into(),
        }
    }

    pub fn render(&self, action: &VoiceAction) -> String {
        let body = match action {
            VoiceAction::Prompt(text) => self.gather(text),
            VoiceAction::Transfer { notice, target } if !target.trim().is_empty() => {
                format!(
                    "{}<Dial>{}</Dial>",
                    self.say(notice),
                    escape(target.trim())
                )
            }
            VoiceAction::Transfer { .. } => self.hangup(APOLOGY),
            VoiceAction::Hangup(message) => self.hangup(message),
        };
        format!("{XML_HEADER}<Response>{body}</Response>")
    }

    /// Listens for speech; without an answer the call falls through to the
    /// redirect, which reaches the step webhook with no `SpeechResult`.
    fn gather(&self, prompt: &str) -> String {
        let step_url = escape(&self.step_url);
        format!(
            r#"<Gather input="speech" action="{step_url}" method="POST" language="{}" speechTimeout="auto">{}</Gather>{}<Redirect method="POST">{step_url}</Redirect>"#,
            escape(&self.language),
            self.say(prompt),
            self.say(FALLBACK_NOTICE),
        )
    }

    fn hangup(&self, message: &str) -> String {
        format!("{}<Hangup/>", self.say(message))
    }

    fn say(&self, text: &str) -> String {
        format!(
            r#"<Say language="{}">{}</Say>"#,
            escape(&self.language),
            escape(text)
        )
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> VoiceResponseBuilder {
        VoiceResponseBuilder::new("https://booking.example.com/", "it-IT")
    }

    #[test]
    fn test_prompt_gathers_speech_and_redirects_on_silence() {
        let xml = builder().render(&VoiceAction::Prompt("Per favore, dimmi il tuo nome.".into()));

        assert!(xml.starts_with(XML_HEADER));
        assert!(xml.contains(
            r#"<Gather input="speech" action="https://booking.example.com/voice/step" method="POST" language="it-IT" speechTimeout="auto">"#
        ));
        assert!(xml.contains("<Say language=\"it-IT\">Per favore, dimmi il tuo nome.</Say></Gather>"));
        assert!(xml.ends_with(
            r#"<Redirect method="POST">https://booking.example.com/voice/step</Redirect></Response>"#
        ));
    }

    #[test]
    fn test_transfer_dials_target() {
        let xml = builder().render(&VoiceAction::Transfer {
            notice: "Ti passo un operatore.".into(),
            target: " +390612345678 ".into(),
        });
        assert!(xml.contains("<Say language=\"it-IT\">Ti passo un operatore.</Say>"));
        assert!(xml.contains("<Dial>+390612345678</Dial>"));
        assert!(!xml.contains("<Hangup/>"));
    }

    #[test]
    fn test_transfer_without_target_degrades_to_apology() {
        let xml = builder().render(&VoiceAction::Transfer {
            notice: "Ti passo un operatore.".into(),
            target: "  ".into(),
        });
        assert!(!xml.contains("<Dial>"));
        assert!(xml.contains(&escape(APOLOGY)));
        assert!(xml.contains("<Hangup/>"));
    }

    #[test]
    fn test_hangup_says_then_hangs_up() {
        let xml = builder().render(&VoiceAction::Hangup("Grazie e a presto!".into()));
        assert_eq!(
            xml,
            format!(
                "{XML_HEADER}<Response><Say language=\"it-IT\">Grazie e a presto!</Say><Hangup/></Response>"
            )
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = builder().render(&VoiceAction::Hangup("Tom & Jerry <3 \"ciao\"".into()));
        assert!(xml.contains("Tom &amp; Jerry &lt;3 &quot;ciao&quot;"));
        assert!(!xml.contains("Tom & Jerry"));
    }
}
