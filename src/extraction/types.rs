use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Support,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Support => "support",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogTurn {
    pub role: Role,
    pub content: String,
}

impl DialogTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn support(content: impl Into<String>) -> Self {
        Self {
            role: Role::Support,
            content: content.into(),
        }
    }
}

/// Ordered support conversation. Serialises as a bare array of turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dialog {
    turns: Vec<DialogTurn>,
}

impl Dialog {
    pub fn new(turns: Vec<DialogTurn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[DialogTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// One `role: content` line per turn, in order.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Index of the first user turn containing `question`, ignoring case.
    pub fn position_of_question(&self, question: &str) -> Option<usize> {
        let needle = question.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.turns.iter().position(|turn| {
            turn.role == Role::User && turn.content.to_lowercase().contains(&needle)
        })
    }
}

impl From<Vec<DialogTurn>> for Dialog {
    fn from(turns: Vec<DialogTurn>) -> Self {
        Self::new(turns)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionCandidate {
    pub question: Option<String>,
    pub confidence: f64,
    pub source_text: Option<String>,
    /// Index of the user turn the question came from.
    pub position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerCandidate {
    pub answer: Option<String>,
    pub relevance: f64,
    pub source_text: Option<String>,
    /// Index of the support turn the answer came from.
    pub support_index: Option<usize>,
}

/// A question/answer pair that passed the quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedQaPair {
    pub question: String,
    pub answer: String,
    pub quality_score: f64,
    pub issues: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialog_deserialises_from_turn_array() {
        let dialog: Dialog = serde_json::from_str(
            r#"[{"role":"user","content":"Hi"},{"role":"support","content":" Hello "}]"#,
        )
        .unwrap();
        assert_eq!(dialog.turns().len(), 2);
        assert_eq!(dialog.render(), "user: Hi\nsupport: Hello");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let parsed: Result<Dialog, _> =
            serde_json::from_str(r#"[{"role":"agent","content":"Hi"}]"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn question_position_matches_user_turns_only() {
        let dialog = Dialog::new(vec![
            DialogTurn::support("How do I change my plan? Let me check."),
            DialogTurn::user("Hi"),
            DialogTurn::user("how do i change my plan?"),
        ]);
        assert_eq!(dialog.position_of_question("How do I change my plan?"), Some(2));
        assert_eq!(dialog.position_of_question("  "), None);
    }
}
