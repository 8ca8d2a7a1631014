//! Aggregate Summaries
//!
//! Per-question tallies. Every mapping keeps declaration order so the JSON
//! output lists options the way the question declared them.

use serde::{Deserialize, Serialize};

/// Tally for one question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionSummary {
    /// Count per option. Every declared option is present.
    #[serde(with = "crate::ordered_map")]
    pub counts: Vec<(String, u32)>,
    /// Formatted share per option, e.g. `"60.0%"`.
    #[serde(with = "crate::ordered_map")]
    pub percentages: Vec<(String, String)>,
    /// Bar per option, e.g. `"████████████ 6/10"`.
    #[serde(with = "crate::ordered_map")]
    pub visual: Vec<(String, String)>,
    /// Reasonings of counted answers, in agent-processing order.
    pub explanations: Vec<String>,
    /// Number of validly counted answers.
    pub total: u32,
    /// Numeric statistics, for numerical questions with at least one answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<NumericStats>,
}

impl QuestionSummary {
    /// Count for an option, if it is part of the tally.
    pub fn count(&self, option: &str) -> Option<u32> {
        lookup(&self.counts, option).copied()
    }

    pub fn percentage(&self, option: &str) -> Option<&str> {
        lookup(&self.percentages, option).map(String::as_str)
    }

    pub fn bar(&self, option: &str) -> Option<&str> {
        lookup(&self.visual, option).map(String::as_str)
    }

    /// Sum of all counts.
    pub fn counted(&self) -> u32 {
        self.counts.iter().map(|(_, c)| c).sum()
    }
}

fn lookup<'a, V>(pairs: &'a [(String, V)], key: &str) -> Option<&'a V> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Mean, minimum and maximum of numerical answers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Summaries for a whole question set, keyed by question text in set order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary {
    #[serde(with = "crate::ordered_map")]
    pub questions: Vec<(String, QuestionSummary)>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, summary: QuestionSummary) {
        self.questions.push((question.into(), summary));
    }

    pub fn get(&self, question: &str) -> Option<&QuestionSummary> {
        lookup(&self.questions, question)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QuestionSummary)> {
        self.questions.iter().map(|(q, s)| (q.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QuestionSummary {
        QuestionSummary {
            counts: vec![("Yes".into(), 2), ("No".into(), 1)],
            percentages: vec![("Yes".into(), "66.7%".into()), ("No".into(), "33.3%".into())],
            visual: vec![("Yes".into(), "█████████████ 2/3".into()), ("No".into(), "██████ 1/3".into())],
            explanations: vec!["a".into(), "b".into(), "c".into()],
            total: 3,
            stats: None,
        }
    }

    #[test]
    fn test_lookup_helpers() {
        let summary = sample();
        assert_eq!(summary.count("Yes"), Some(2));
        assert_eq!(summary.count("Maybe"), None);
        assert_eq!(summary.percentage("No"), Some("33.3%"));
        assert_eq!(summary.counted(), summary.total);
    }

    #[test]
    fn test_summary_serializes_keyed_by_question() {
        let mut summary = Summary::new();
        summary.push("Second?", sample());
        summary.push("First?", QuestionSummary::default());

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["Second?"]["counts"]["Yes"], 2);
        assert!(value["Second?"].get("stats").is_none());

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.find("Second?").unwrap() < json.find("First?").unwrap());

        let back: Summary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
