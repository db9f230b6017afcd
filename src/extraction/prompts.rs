use super::types::Dialog;

pub const QUESTION_SYSTEM_PROMPT: &str = r#"You extract the customer's question from a support chat transcript.

Rules:
- Read ONLY lines that start with "user:". Ignore everything written by support.
- A qualifying line asks for information or help: it has a question mark or starts with an interrogative word (how, what, why, when, where, which, who, can, is, does; как, что, почему, когда, где, можно ли).
- Skip greetings, thanks, commands or requests without a question, rhetorical questions and confirmation checks such as "ok?" or "right?".
- Pick the chronologically FIRST qualifying user line.
- Rewrite it as a short standalone question that makes sense without the chat. Keep the user's language. Do not add facts that are not in the line.
- If nothing qualifies, use the value NO_QUESTION.

Respond with one JSON object and nothing else:
{"question": "<question or NO_QUESTION>", "confidence": <0.0-1.0>, "source_text": "<the user line, verbatim>", "position": <zero-based line number>}"#;

pub const ANSWER_SYSTEM_PROMPT: &str = r#"You locate the support reply that answers a given customer question in a support chat transcript.

Rules:
- Read ONLY lines that start with "support:".
- Pick the FIRST support line that directly answers the question. Greetings, apologies and promises to check later are not answers.
- Copy the answer verbatim. Do not summarise, merge lines or add anything.
- If no support line answers the question, use the value NO_ANSWER.

Respond with one JSON object and nothing else:
{"answer": "<answer or NO_ANSWER>", "relevance": <0.0-1.0>, "source_text": "<the support line, verbatim>", "support_index": <zero-based line number>}"#;

pub fn question_user_prompt(dialog: &Dialog) -> String {
    format!("Transcript:\n{}\n\nExtract the question.", dialog.render())
}

pub fn answer_user_prompt(question: &str, dialog: &Dialog) -> String {
    format!(
        "Question: {}\n\nTranscript:\n{}\n\nFind the answer.",
        question.trim(),
        dialog.render()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::types::DialogTurn;

    #[test]
    fn prompts_embed_rendered_dialog() {
        let dialog = Dialog::new(vec![
            DialogTurn::user("How do I change my plan?"),
            DialogTurn::support("Go to Billing > Plans"),
        ]);
        let prompt = answer_user_prompt(" How do I change my plan? ", &dialog);
        assert!(prompt.starts_with("Question: How do I change my plan?\n"));
        assert!(prompt.contains("user: How do I change my plan?\nsupport: Go to Billing > Plans"));
        assert!(question_user_prompt(&dialog).contains("support: Go to Billing > Plans"));
    }
}
