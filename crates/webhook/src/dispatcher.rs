use crate::inference::Inference;
use crate::prompt::{build_prompt, clean_question};
use history::{build_context, HistoryCache};
use llm::{truncate_reply, InferenceError, MAX_REPLY_CHARS};
use protocol::{RequestKind, SkillRequest, SkillResponse};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const WELCOME: &str = "Bem-vindo ao modo inteligente! Você pode me perguntar qualquer coisa.";
pub const FAREWELL: &str = "Até logo! Sempre que precisar de conhecimento, estarei por aqui.";
pub const CLARIFY: &str =
    "Desculpe, não entendi sua pergunta. Experimente falar Modo inteligente antes de perguntar.";
pub const EMPTY_QUESTION: &str = "Você não disse nada.";

pub const STOP_INTENTS: [&str; 2] = ["AMAZON.StopIntent", "AMAZON.CancelIntent"];

/// Exchanges included in the prompt by default
pub const DEFAULT_CONTEXT_EXCHANGES: usize = 5;

/// Maps skill requests onto history and inference calls.
///
/// Nothing here fails outward: every problem becomes something the user hears.
pub struct Dispatcher {
    history: Arc<HistoryCache>,
    inference: Arc<dyn Inference>,
    context_exchanges: usize,
}

impl Dispatcher {
    pub fn new(
        history: Arc<HistoryCache>,
        inference: Arc<dyn Inference>,
        context_exchanges: usize,
    ) -> Self {
        Self {
            history,
            inference,
            context_exchanges,
        }
    }

    pub async fn handle(&self, req: &SkillRequest) -> SkillResponse {
        let kind = req.kind();
        info!(session_id = req.session_id().unwrap_or("-"), kind = ?kind, "skill request");

        match kind {
            RequestKind::Launch => self.on_launch(req).await,
            RequestKind::Intent => self.on_intent(req).await,
            RequestKind::SessionEnded => self.on_session_ended(req).await,
            RequestKind::Other(_) | RequestKind::Missing => SkillResponse::speak(CLARIFY, false),
        }
    }

    /// Stateless question for the test endpoint: no history is read or written.
    pub async fn answer(&self, question: &str) -> String {
        self.converse(None, question).await
    }

    async fn on_launch(&self, req: &SkillRequest) -> SkillResponse {
        if let Some(session_id) = req.session_id() {
            if let Err(err) = self.history.reset(session_id).await {
                warn!(session_id, error = %err, "could not reset session history");
            }
        }
        SkillResponse::speak(WELCOME, false)
    }

    async fn on_intent(&self, req: &SkillRequest) -> SkillResponse {
        if req
            .intent_name()
            .is_some_and(|name| STOP_INTENTS.contains(&name))
        {
            if let Some(session_id) = req.session_id() {
                self.history.drop_session(session_id).await;
            }
            return SkillResponse::speak(FAREWELL, true);
        }

        let Some(question) = req.question() else {
            debug!(intent = req.intent_name().unwrap_or("-"), "intent without question slot");
            return SkillResponse::speak(CLARIFY, false);
        };

        let reply = self.converse(req.session_id(), question).await;
        SkillResponse::speak(reply, false)
    }

    async fn on_session_ended(&self, req: &SkillRequest) -> SkillResponse {
        if let Some(session_id) = req.session_id() {
            self.history.drop_session(session_id).await;
        }
        SkillResponse::end_silently()
    }

    async fn converse(&self, session_id: Option<&str>, raw_question: &str) -> String {
        let question = clean_question(raw_question);
        if question.is_empty() {
            return EMPTY_QUESTION.to_string();
        }

        let context = match session_id {
            Some(session_id) => match self
                .history
                .get_context(session_id, self.context_exchanges)
                .await
            {
                Ok(exchanges) => build_context(&exchanges),
                Err(err) => {
                    warn!(session_id, error = %err, "history unavailable, answering without context");
                    String::new()
                }
            },
            None => String::new(),
        };

        let prompt = build_prompt(&context, &question);
        let answer = match self.inference.generate(&prompt).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "inference failed");
                return spoken_error(&err);
            }
        };

        if let Some(session_id) = session_id {
            if let Err(err) = self.history.append(session_id, &question, &answer).await {
                warn!(session_id, error = %err, "could not persist exchange");
            }
        }

        answer
    }
}

/// What the user hears when the model server could not answer.
pub fn spoken_error(err: &InferenceError) -> String {
    truncate_reply(&format!("Erro ao consultar a IA: {err}"), MAX_REPLY_CHARS)
}
