use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::core::config::ResponderConfig;
use crate::core::errors::QaError;
use crate::extraction::{extract_json_object, is_sentinel, looks_like_json_fragment, sanitize};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

const SYSTEM_PROMPT: &str = r#"You answer customer support questions using ONLY the numbered evidence inside <context>.

Rules:
- Use only facts stated in the evidence. Never invent steps, names, prices or links.
- If the evidence does not fully answer the query, or the evidence items conflict, reply with exactly NO_ANSWER and nothing else.
- Reply in the same language as the query.
- Write 1 to 5 plain sentences. No greetings, no follow-up questions, no remarks about the evidence or about yourself.

Reply format: {"answer": "<your answer>"} or the bare token NO_ANSWER."#;

/// Hedges that mean the model did not actually answer.
const NON_ANSWER_MARKERS: &[&str] = &[
    "i don't know",
    "i do not know",
    "not sure",
    "cannot answer",
    "can't answer",
    "no information",
    "not enough information",
    "please clarify",
    "could you clarify",
    "can you provide",
    "could you provide",
    "не знаю",
    "нет информации",
    "уточните",
    "недостаточно информации",
];

/// One retrieved ticket offered to the model as context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    pub ticket_id: u64,
    pub question: String,
    pub answer: String,
    pub score: f32,
}

pub struct GroundedResponder {
    provider: Arc<dyn LlmProvider>,
    config: ResponderConfig,
}

impl GroundedResponder {
    pub fn new(provider: Arc<dyn LlmProvider>, config: ResponderConfig) -> Self {
        Self { provider, config }
    }

    /// The evidence that would be shown to the model, best first.
    pub fn select_evidence<'a>(&self, evidence: &'a [Evidence]) -> Vec<&'a Evidence> {
        evidence
            .iter()
            .filter(|e| e.score >= self.config.min_relevance)
            .take(self.config.max_evidence)
            .collect()
    }

    /// Answers `query` from `evidence`, or fails with `NoAnswer` when the
    /// evidence is too weak or the model declines.
    pub async fn answer(&self, query: &str, evidence: &[Evidence]) -> Result<String, QaError> {
        let usable = self.select_evidence(evidence);
        if usable.is_empty() {
            tracing::debug!("No evidence above {} for query", self.config.min_relevance);
            return Err(no_answer(query));
        }

        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(query, &usable)),
        ])
        .temperature(self.config.temperature)
        .top_p(self.config.top_p)
        .max_tokens(self.config.max_tokens);

        let raw = self.provider.chat(request).await?;
        match parse_answer(&raw) {
            Some(answer) => Ok(answer),
            None => {
                tracing::info!("Model declined to answer from {} evidence items", usable.len());
                Err(no_answer(query))
            }
        }
    }
}

fn no_answer(query: &str) -> QaError {
    QaError::NoAnswer {
        query: query.to_string(),
    }
}

fn build_user_prompt(query: &str, evidence: &[&Evidence]) -> String {
    let blocks: Vec<String> = evidence
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "[{}] ticket {} (score {:.2})\nQ: {}\nA: {}",
                i + 1,
                e.ticket_id,
                e.score,
                e.question.trim(),
                e.answer.trim()
            )
        })
        .collect();

    format!(
        "<context>\n{}\n</context>\n\n<query>\n{}\n</query>",
        blocks.join("\n\n"),
        query.trim()
    )
}

/// The usable answer text, or `None` for any form of refusal.
fn parse_answer(raw: &str) -> Option<String> {
    let text = sanitize(raw);
    if text.is_empty() || is_sentinel(&text) {
        return None;
    }

    let answer = match extract_json_object(&text) {
        Some(object) => match object.get("answer") {
            Some(Value::String(answer)) => sanitize(answer),
            _ => return None,
        },
        None if looks_like_json_fragment(&text) => return None,
        None => text,
    };

    (!answer.is_empty() && !is_sentinel(&answer) && !is_non_answer(&answer)).then_some(answer)
}

fn is_non_answer(answer: &str) -> bool {
    if answer.contains('?') {
        return true;
    }
    let lower = answer.to_lowercase().replace('\u{2019}', "'");
    NON_ANSWER_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    fn evidence(score: f32) -> Vec<Evidence> {
        vec![Evidence {
            ticket_id: 17,
            question: "How do I change my plan?".to_string(),
            answer: "Go to Billing > Plans".to_string(),
            score,
        }]
    }

    fn responder(replies: Vec<&str>) -> (GroundedResponder, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(
            replies.into_iter().map(|r| Ok(r.to_string())).collect(),
        ));
        (
            GroundedResponder::new(provider.clone(), ResponderConfig::default()),
            provider,
        )
    }

    #[tokio::test]
    async fn no_usable_evidence_refuses_without_calling_model() {
        let (responder, provider) = responder(vec![]);

        let err = responder.answer("How to upgrade?", &[]).await.unwrap_err();
        assert!(matches!(err, QaError::NoAnswer { ref query } if query == "How to upgrade?"));

        let err = responder.answer("How to upgrade?", &evidence(0.1)).await.unwrap_err();
        assert!(matches!(err, QaError::NoAnswer { .. }));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn json_answer_is_returned() {
        let (responder, provider) =
            responder(vec![r#"{"answer": "Open Billing, then Plans, and pick a new plan."}"#]);

        let answer = responder.answer("How do I upgrade?", &evidence(0.8)).await.unwrap();
        assert_eq!(answer, "Open Billing, then Plans, and pick a new plan.");

        let requests = provider.requests();
        assert_eq!(requests[0].temperature, Some(0.2));
        assert_eq!(requests[0].top_p, Some(0.9));
        let prompt = &requests[0].messages[1].content;
        assert!(prompt.contains("[1] ticket 17 (score 0.80)\nQ: How do I change my plan?\nA: Go to Billing > Plans"));
        assert!(prompt.contains("<query>\nHow do I upgrade?\n</query>"));
    }

    #[tokio::test]
    async fn plain_text_answer_is_accepted() {
        let (responder, _) = responder(vec!["Go to Billing > Plans and choose a new plan."]);
        let answer = responder.answer("How do I upgrade?", &evidence(0.8)).await.unwrap();
        assert_eq!(answer, "Go to Billing > Plans and choose a new plan.");
    }

    #[tokio::test]
    async fn refusal_token_becomes_no_answer() {
        for reply in ["NO_ANSWER", "  \"no answer\" ", r#"{"answer": "NO_ANSWER"}"#] {
            let (responder, _) = responder(vec![reply]);
            let err = responder.answer("How?", &evidence(0.9)).await.unwrap_err();
            assert!(matches!(err, QaError::NoAnswer { .. }), "{reply}");
        }
    }

    #[tokio::test]
    async fn disguised_refusals_become_no_answer() {
        for reply in [
            "I'm not sure which plan you mean.",
            r#"{"answer": "Could you clarify your account type?"}"#,
            "Which plan are you on?",
            "Не знаю, уточните вопрос.",
            r#"{"text": "Go to Billing"}"#,
            "",
        ] {
            let (responder, _) = responder(vec![reply]);
            let err = responder.answer("How?", &evidence(0.9)).await.unwrap_err();
            assert!(matches!(err, QaError::NoAnswer { .. }), "{reply}");
        }
    }

    #[tokio::test]
    async fn inline_code_in_answer_is_kept() {
        let reply = "Run ```reset --all``` in the admin console to reset the account.";
        let (responder, _) = responder(vec![reply]);
        let answer = responder.answer("How do I reset?", &evidence(0.9)).await.unwrap();
        assert_eq!(answer, reply);
    }

    #[tokio::test]
    async fn truncated_json_answer_is_no_answer() {
        let (responder, _) = responder(vec![r#"{"answer": "Open Billing, then Pl"#]);
        let err = responder.answer("How?", &evidence(0.9)).await.unwrap_err();
        assert!(matches!(err, QaError::NoAnswer { .. }));
    }

    #[tokio::test]
    async fn backend_failure_is_not_a_refusal() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(QaError::model(
            anyhow::anyhow!("timeout"),
        ))]));
        let responder = GroundedResponder::new(provider, ResponderConfig::default());
        let err = responder.answer("How?", &evidence(0.9)).await.unwrap_err();
        assert!(matches!(err, QaError::Model(_)));
    }

    #[tokio::test]
    async fn evidence_is_capped() {
        let (responder, provider) = responder(vec!["Fine."]);
        let many: Vec<Evidence> = (0..8)
            .map(|i| Evidence {
                ticket_id: i,
                question: format!("q{i}"),
                answer: format!("a{i}"),
                score: 0.9,
            })
            .collect();
        responder.answer("How?", &many).await.unwrap();
        let prompt = &provider.requests()[0].messages[1].content;
        assert!(prompt.contains("[5] ticket 4"));
        assert!(!prompt.contains("[6]"));
    }
}
