use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response envelope version expected by the voice platform
pub const VERSION: &str = "1.0";

/// Slot carrying the user's free-form utterance
pub const QUESTION_SLOT: &str = "pergunta";

/// Inbound skill request.
/// Every field is optional so that partial payloads still parse; the
/// dispatcher decides what is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SkillSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillSession {
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<HashMap<String, Slot>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Slot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Request type as reported in `request.type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Launch,
    Intent,
    SessionEnded,
    Other(String),
    Missing,
}

impl SkillRequest {
    pub fn kind(&self) -> RequestKind {
        match self.request.as_ref().and_then(|r| r.kind.as_deref()) {
            Some("LaunchRequest") => RequestKind::Launch,
            Some("IntentRequest") => RequestKind::Intent,
            Some("SessionEndedRequest") => RequestKind::SessionEnded,
            Some(other) => RequestKind::Other(other.to_string()),
            None => RequestKind::Missing,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref()?.session_id.as_deref()
    }

    pub fn intent_name(&self) -> Option<&str> {
        self.request.as_ref()?.intent.as_ref()?.name.as_deref()
    }

    /// Value of a named slot, `None` when any level of the path is absent
    pub fn slot_value(&self, slot: &str) -> Option<&str> {
        self.request
            .as_ref()?
            .intent
            .as_ref()?
            .slots
            .as_ref()?
            .get(slot)?
            .value
            .as_deref()
    }

    pub fn question(&self) -> Option<&str> {
        self.slot_value(QUESTION_SLOT)
    }
}

/// Outbound skill response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillResponse {
    pub version: String,
    pub response: ResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "outputSpeech", skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(rename = "shouldEndSession")]
    pub should_end_session: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpeech {
    #[serde(rename = "type")]
    pub kind: String, // "PlainText"
    pub text: String,
}

impl SkillResponse {
    pub fn speak<S: Into<String>>(text: S, should_end_session: bool) -> Self {
        Self {
            version: VERSION.to_string(),
            response: ResponseBody {
                output_speech: Some(OutputSpeech {
                    kind: "PlainText".to_string(),
                    text: text.into(),
                }),
                should_end_session,
            },
        }
    }

    /// Closing response without speech (the platform ignores speech here anyway)
    pub fn end_silently() -> Self {
        Self {
            version: VERSION.to_string(),
            response: ResponseBody {
                output_speech: None,
                should_end_session: true,
            },
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.response.output_speech.as_ref().map(|s| s.text.as_str())
    }

    pub fn ends_session(&self) -> bool {
        self.response.should_end_session
    }
}

/// Body of the simplified test endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub pergunta: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub resposta: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_intent_request() {
        let raw = json!({
            "version": "1.0",
            "session": { "sessionId": "amzn1.echo-api.session.abc", "new": false },
            "request": {
                "type": "IntentRequest",
                "requestId": "req-1",
                "intent": {
                    "name": "PerguntaIntent",
                    "slots": { "pergunta": { "name": "pergunta", "value": "qual a capital da frança" } }
                }
            }
        });

        let req: SkillRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.kind(), RequestKind::Intent);
        assert_eq!(req.session_id(), Some("amzn1.echo-api.session.abc"));
        assert_eq!(req.intent_name(), Some("PerguntaIntent"));
        assert_eq!(req.question(), Some("qual a capital da frança"));
    }

    #[test]
    fn test_missing_slots_yield_none() {
        let raw = json!({
            "session": { "sessionId": "s1" },
            "request": { "type": "IntentRequest", "intent": { "name": "AMAZON.HelpIntent" } }
        });

        let req: SkillRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.question(), None);

        let raw = json!({ "request": { "type": "IntentRequest", "intent": { "slots": null } } });
        let req: SkillRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.question(), None);
        assert_eq!(req.session_id(), None);
    }

    #[test]
    fn test_request_kinds() {
        let kind = |t: &str| {
            serde_json::from_value::<SkillRequest>(json!({ "request": { "type": t } }))
                .unwrap()
                .kind()
        };
        assert_eq!(kind("LaunchRequest"), RequestKind::Launch);
        assert_eq!(kind("SessionEndedRequest"), RequestKind::SessionEnded);
        assert_eq!(kind("CanFulfillIntentRequest"), RequestKind::Other("CanFulfillIntentRequest".into()));
        assert_eq!(SkillRequest::default().kind(), RequestKind::Missing);
    }

    #[test]
    fn test_response_shape() {
        let value = serde_json::to_value(SkillResponse::speak("Olá", false)).unwrap();
        assert_eq!(
            value,
            json!({
                "version": "1.0",
                "response": {
                    "outputSpeech": { "type": "PlainText", "text": "Olá" },
                    "shouldEndSession": false
                }
            })
        );

        let value = serde_json::to_value(SkillResponse::end_silently()).unwrap();
        assert_eq!(value, json!({ "version": "1.0", "response": { "shouldEndSession": true } }));
    }
}
