//! Heuristic scoring of extracted Q&A pairs.
//!
//! The score ignores whatever confidence the model claimed and looks only at
//! the texts: interrogative form, answer substance, instruction phrasing and
//! term overlap.

use std::collections::HashSet;

use serde::Serialize;

use crate::core::config::QualityConfig;
use crate::extraction::ValidatedQaPair;

const INTERROGATIVES: &[&str] = &[
    "how", "what", "why", "when", "where", "which", "who", "can", "could", "is", "are", "do",
    "does", "did", "will", "would", "should", "may", "might",
    "как", "что", "почему", "зачем", "когда", "где", "какой", "кто", "сколько", "можно", "ли",
];

const ACTION_PHRASES: &[&str] = &[
    "go to", "click", "select", "enter", "set", "open", "navigate", "press", "choose",
    "перейдите", "нажмите", "выберите", "откройте", "введите",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub quality_score: f64,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QualityValidator {
    config: QualityConfig,
}

impl QualityValidator {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, question: &str, answer: &str) -> ValidationReport {
        let cfg = &self.config;
        let question = question.trim();
        let answer = answer.trim();
        let mut issues = Vec::new();

        if question.chars().count() < cfg.min_question_chars {
            issues.push("question too short".to_string());
        }
        if answer.chars().count() < cfg.min_answer_chars {
            issues.push("answer too short".to_string());
        }
        if !issues.is_empty() {
            return ValidationReport {
                is_valid: false,
                quality_score: 0.0,
                issues,
            };
        }

        let question_tokens = tokens(question);
        let answer_tokens = tokens(answer);
        let mut score = 0.0;

        if question.contains('?') {
            score += cfg.question_mark_bonus;
        } else if question_tokens.iter().any(|t| INTERROGATIVES.contains(&t.as_str())) {
            score += cfg.interrogative_bonus;
        } else {
            issues.push("lacks interrogative structure".to_string());
            score -= cfg.missing_interrogative_penalty;
        }

        if answer.split_whitespace().count() > cfg.min_answer_tokens {
            score += cfg.answer_tokens_bonus;
        } else {
            issues.push("answer is too brief".to_string());
        }

        if contains_action_phrase(&answer_tokens) {
            score += cfg.action_phrase_bonus;
        }

        let question_set: HashSet<&str> = question_tokens.iter().map(String::as_str).collect();
        let shared = answer_tokens
            .iter()
            .map(String::as_str)
            .collect::<HashSet<_>>()
            .intersection(&question_set)
            .count();
        if shared > cfg.min_shared_tokens {
            score += cfg.overlap_bonus;
        }

        if answer.chars().count() > cfg.min_answer_length {
            score += cfg.answer_length_bonus;
        }

        let quality_score = score.clamp(0.0, 1.0);
        let is_valid = quality_score >= cfg.acceptance_threshold;
        if !is_valid {
            issues.push(format!(
                "quality score {:.2} below threshold {:.2}",
                quality_score, cfg.acceptance_threshold
            ));
        }

        ValidationReport {
            is_valid,
            quality_score,
            issues,
        }
    }

    /// Validated pair, or `None` when the report rejects it.
    pub fn accept(&self, question: &str, answer: &str) -> Option<ValidatedQaPair> {
        let report = self.validate(question, answer);
        report.is_valid.then(|| ValidatedQaPair {
            question: question.trim().to_string(),
            answer: answer.trim().to_string(),
            quality_score: report.quality_score,
            issues: report.issues,
        })
    }
}

/// Lowercased whitespace tokens with surrounding punctuation trimmed.
fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn contains_action_phrase(answer_tokens: &[String]) -> bool {
    let padded = format!(" {} ", answer_tokens.join(" "));
    ACTION_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {} ", phrase)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> QualityValidator {
        QualityValidator::default()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn short_texts_are_hard_rejects() {
        let report = validator().validate("ok", "done");
        assert!(!report.is_valid);
        assert_eq!(report.quality_score, 0.0);
        assert!(report.issues.contains(&"question too short".to_string()));

        let report = validator().validate("", "A sufficiently long answer");
        assert!(!report.is_valid);

        let report = validator().validate("How do I pay?", " ok ");
        assert!(!report.is_valid);
        assert_eq!(report.issues, vec!["answer too short".to_string()]);
    }

    #[test]
    fn instructional_answer_to_real_question_scores_full() {
        let report = validator().validate(
            "How do I reset my password?",
            "Go to Settings and select Reset Password",
        );
        assert!(report.is_valid);
        assert!(approx(report.quality_score, 1.0));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn plan_change_dialog_pair_is_valid() {
        let report = validator().validate("How do I change my plan?", "Go to Billing > Plans");
        assert!(report.is_valid);
        assert!(approx(report.quality_score, 0.8));
    }

    #[test]
    fn interrogative_word_without_question_mark() {
        let report = validator().validate(
            "как изменить тариф",
            "Откройте раздел Оплата и нажмите Сменить тариф",
        );
        // only "тариф" is shared, so no overlap bonus
        assert!(approx(report.quality_score, 0.7));
        assert!(report.is_valid);
    }

    #[test]
    fn statement_is_penalised() {
        let report = validator().validate("My invoice total was wrong", "We fixed it");
        assert!(report
            .issues
            .contains(&"lacks interrogative structure".to_string()));
        assert!(!report.is_valid);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let report = validator().validate("Invoice broken", "Fixed now");
        assert_eq!(report.quality_score, 0.0);
        assert!(!report.is_valid);
    }

    #[test]
    fn weights_come_from_config() {
        let strict = QualityValidator::new(QualityConfig {
            acceptance_threshold: 0.95,
            ..QualityConfig::default()
        });
        assert!(!strict.validate("How do I change my plan?", "Go to Billing > Plans").is_valid);
        assert!(strict
            .accept("How do I reset my password?", "Go to Settings and select Reset Password")
            .is_some());
    }

    #[test]
    fn action_phrases_match_whole_words() {
        assert!(contains_action_phrase(&tokens("Please go to the portal")));
        assert!(!contains_action_phrase(&tokens("We reset your settings")));
        assert!(!contains_action_phrase(&tokens("Logo tone updated")));
    }
}
