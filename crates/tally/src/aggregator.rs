//! Response aggregation.
//!
//! Counts per-agent answers against each question's declared options.
//! An invalid answer is rejected for that agent and question only; the
//! agent's other answers still count.

use poll_events::{
    AnswerValue, NumericRange, NumericStats, QueryResult, Question, QuestionSet, QuestionSpec,
    QuestionSummary, Summary,
};

use crate::format::{format_percentage, render_bar, BAR_WIDTH};

/// An answer that could not be counted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("agent {agent_id} answered '{answer}' to '{question}', which is not a declared option")]
    UnknownOption {
        agent_id: String,
        question: String,
        answer: String,
    },
    #[error("agent {agent_id} answered '{answer}' to '{question}', which is not a number")]
    NotNumeric {
        agent_id: String,
        question: String,
        answer: String,
    },
    #[error("agent {agent_id} answered {value} to '{question}', outside [{low}, {high}]")]
    OutOfRange {
        agent_id: String,
        question: String,
        value: f64,
        low: f64,
        high: f64,
    },
    #[error(
        "agent {agent_id} returned {responses} responses and {reasonings} reasonings for {expected} questions"
    )]
    Misaligned {
        agent_id: String,
        expected: usize,
        responses: usize,
        reasonings: usize,
    },
}

impl AggregationError {
    pub fn agent_id(&self) -> &str {
        match self {
            AggregationError::UnknownOption { agent_id, .. }
            | AggregationError::NotNumeric { agent_id, .. }
            | AggregationError::OutOfRange { agent_id, .. }
            | AggregationError::Misaligned { agent_id, .. } => agent_id,
        }
    }

    /// The affected question; `None` when the whole result was rejected.
    pub fn question(&self) -> Option<&str> {
        match self {
            AggregationError::UnknownOption { question, .. }
            | AggregationError::NotNumeric { question, .. }
            | AggregationError::OutOfRange { question, .. } => Some(question),
            AggregationError::Misaligned { .. } => None,
        }
    }
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    pub summary: Summary,
    /// Rejected answers, in agent-processing order.
    pub rejections: Vec<AggregationError>,
}

/// Per-question accumulator.
#[derive(Debug)]
enum Bucket {
    Categorical {
        counts: Vec<(String, u32)>,
        explanations: Vec<String>,
    },
    Numerical {
        range: NumericRange,
        values: Vec<(String, f64)>,
        explanations: Vec<String>,
    },
}

impl Bucket {
    fn for_question(question: &Question) -> Self {
        match &question.spec {
            QuestionSpec::Categorical(options) => Bucket::Categorical {
                counts: options.iter().map(|o| (o.clone(), 0)).collect(),
                explanations: Vec::new(),
            },
            QuestionSpec::Numerical(range) => Bucket::Numerical {
                range: *range,
                values: Vec::new(),
                explanations: Vec::new(),
            },
        }
    }

    /// Counts one answer, or explains why it cannot be counted.
    fn add(
        &mut self,
        agent_id: &str,
        question: &str,
        answer: &AnswerValue,
        reasoning: &str,
    ) -> Result<(), AggregationError> {
        match self {
            Bucket::Categorical { counts, explanations } => {
                let slot = answer
                    .as_choice()
                    .and_then(|choice| counts.iter_mut().find(|(option, _)| option == choice));
                match slot {
                    Some((_, count)) => {
                        *count += 1;
                        explanations.push(reasoning.to_string());
                        Ok(())
                    }
                    None => Err(AggregationError::UnknownOption {
                        agent_id: agent_id.to_string(),
                        question: question.to_string(),
                        answer: answer.to_string(),
                    }),
                }
            }
            Bucket::Numerical {
                range,
                values,
                explanations,
            } => {
                let value = answer.as_f64().ok_or_else(|| AggregationError::NotNumeric {
                    agent_id: agent_id.to_string(),
                    question: question.to_string(),
                    answer: answer.to_string(),
                })?;
                if !range.contains(value) {
                    return Err(AggregationError::OutOfRange {
                        agent_id: agent_id.to_string(),
                        question: question.to_string(),
                        value,
                        low: range.low,
                        high: range.high,
                    });
                }
                values.push((answer.to_string(), value));
                explanations.push(reasoning.to_string());
                Ok(())
            }
        }
    }

    fn finish(self, bar_width: usize) -> QuestionSummary {
        let (counts, explanations, stats) = match self {
            Bucket::Categorical { counts, explanations } => (counts, explanations, None),
            Bucket::Numerical {
                values, explanations, ..
            } => {
                let stats = numeric_stats(&values);
                (value_counts(values), explanations, stats)
            }
        };

        let total: u32 = counts.iter().map(|(_, c)| c).sum();
        let percentages = counts
            .iter()
            .map(|(option, count)| (option.clone(), format_percentage(*count, total)))
            .collect();
        let visual = counts
            .iter()
            .map(|(option, count)| (option.clone(), render_bar(*count, total, bar_width)))
            .collect();

        QuestionSummary {
            counts,
            percentages,
            visual,
            explanations,
            total,
            stats,
        }
    }
}

/// Groups numeric answers by display value, ascending.
fn value_counts(mut values: Vec<(String, f64)>) -> Vec<(String, u32)> {
    values.sort_by(|a, b| a.1.total_cmp(&b.1));
    let mut counts: Vec<(String, u32)> = Vec::new();
    for (label, _) in values {
        match counts.last_mut() {
            Some((last, count)) if *last == label => *count += 1,
            _ => counts.push((label, 1)),
        }
    }
    counts
}

fn numeric_stats(values: &[(String, f64)]) -> Option<NumericStats> {
    if values.is_empty() {
        return None;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for (_, v) in values {
        min = min.min(*v);
        max = max.max(*v);
        sum += v;
    }
    Some(NumericStats {
        mean: sum / values.len() as f64,
        min,
        max,
    })
}

/// Aggregates per-agent results into per-question summaries.
#[derive(Debug, Clone)]
pub struct ResponseAggregator {
    bar_width: usize,
}

impl ResponseAggregator {
    /// Creates an aggregator with the standard 20-glyph bars.
    pub fn new() -> Self {
        Self {
            bar_width: BAR_WIDTH,
        }
    }

    /// Sets the maximum bar width.
    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width;
        self
    }

    /// Aggregates `results` (in agent-processing order) for `questions`.
    ///
    /// For every question, the sum of counts equals the number of answers
    /// that were counted. A result whose lengths do not match the question
    /// count is rejected as a whole.
    pub fn aggregate(&self, questions: &QuestionSet, results: &[QueryResult]) -> Tally {
        let mut buckets: Vec<Bucket> = questions.iter().map(Bucket::for_question).collect();
        let mut rejections = Vec::new();

        for result in results {
            if !result.is_aligned(questions.len()) {
                rejections.push(AggregationError::Misaligned {
                    agent_id: result.agent_id.clone(),
                    expected: questions.len(),
                    responses: result.responses.len(),
                    reasonings: result.reasonings.len(),
                });
                continue;
            }

            for (idx, question) in questions.iter().enumerate() {
                let answer = &result.responses[idx];
                let reasoning = &result.reasonings[idx];
                if let Err(e) = buckets[idx].add(&result.agent_id, &question.text, answer, reasoning) {
                    tracing::debug!(agent_id = %result.agent_id, question = %question.text, "rejected answer: {}", e);
                    rejections.push(e);
                }
            }
        }

        let mut summary = Summary::new();
        for (question, bucket) in questions.iter().zip(buckets) {
            summary.push(question.text.clone(), bucket.finish(self.bar_width));
        }

        Tally { summary, rejections }
    }
}

impl Default for ResponseAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poll_events::fixtures;

    fn numeric_result(agent: &str, values: Vec<AnswerValue>) -> QueryResult {
        let reasonings = (0..values.len()).map(|i| format!("{} r{}", agent, i)).collect();
        QueryResult::new(agent, values, reasonings)
    }

    #[test]
    fn test_six_four_split() {
        let questions = fixtures::yes_no_questions();
        let results = fixtures::yes_no_results(6, 4);

        let tally = ResponseAggregator::new().aggregate(&questions, &results);
        let q1 = tally.summary.get("Q1").unwrap();

        assert_eq!(q1.count("Yes"), Some(6));
        assert_eq!(q1.count("No"), Some(4));
        assert_eq!(q1.percentage("Yes"), Some("60.0%"));
        assert_eq!(q1.percentage("No"), Some("40.0%"));
        assert_eq!(q1.total, 10);
        assert!(tally.rejections.is_empty());

        let yes_bar = q1.bar("Yes").unwrap();
        let no_bar = q1.bar("No").unwrap();
        assert!(yes_bar.chars().count() > no_bar.chars().count());
        assert!(yes_bar.ends_with("6/10"));
    }

    #[test]
    fn test_zero_response_options_are_reported() {
        let questions = QuestionSet::categorical([("Q1", ["Yes", "No", "Undecided"])]).unwrap();
        let results = fixtures::yes_no_results(2, 0);

        let tally = ResponseAggregator::new().aggregate(&questions, &results);
        let q1 = tally.summary.get("Q1").unwrap();

        assert_eq!(q1.count("No"), Some(0));
        assert_eq!(q1.count("Undecided"), Some(0));
        assert_eq!(q1.percentage("Undecided"), Some("0.0%"));
        let options: Vec<&str> = q1.counts.iter().map(|(o, _)| o.as_str()).collect();
        assert_eq!(options, vec!["Yes", "No", "Undecided"]);
    }

    #[test]
    fn test_unknown_option_excluded_other_answers_kept() {
        let questions = fixtures::sample_questions();
        let results = fixtures::sample_results();

        let tally = ResponseAggregator::new().aggregate(&questions, &results);

        // gss_0004 answered "Maybe" to the second question only.
        assert_eq!(tally.rejections.len(), 1);
        let rejection = &tally.rejections[0];
        assert_eq!(rejection.agent_id(), "gss_0004");
        assert_eq!(rejection.question(), Some("How often do you attend religious services?"));

        let transit = tally
            .summary
            .get("Do you support expanding public transit in your city?")
            .unwrap();
        assert_eq!(transit.total, 4);
        assert_eq!(transit.count("Undecided"), Some(1));

        let services = tally
            .summary
            .get("How often do you attend religious services?")
            .unwrap();
        assert_eq!(services.total, 3);
        assert_eq!(services.explanations.len(), 3);
    }

    #[test]
    fn test_counts_sum_to_total() {
        let questions = fixtures::sample_questions();
        let results = fixtures::sample_results();
        let tally = ResponseAggregator::new().aggregate(&questions, &results);

        for (_, summary) in tally.summary.iter() {
            assert_eq!(summary.counted(), summary.total);
            assert_eq!(summary.explanations.len() as u32, summary.total);
        }
    }

    #[test]
    fn test_explanations_follow_agent_order() {
        let questions = fixtures::yes_no_questions();
        let mut results = fixtures::yes_no_results(2, 2);
        results.reverse();

        let tally = ResponseAggregator::new().aggregate(&questions, &results);
        let q1 = tally.summary.get("Q1").unwrap();
        assert_eq!(q1.explanations, vec!["reason 3", "reason 2", "reason 1", "reason 0"]);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let questions = fixtures::sample_questions();
        let results = fixtures::sample_results();
        let aggregator = ResponseAggregator::new();

        let first = serde_json::to_string(&aggregator.aggregate(&questions, &results).summary).unwrap();
        let second = serde_json::to_string(&aggregator.aggregate(&questions, &results).summary).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_results_gives_zero_state() {
        let questions = fixtures::yes_no_questions();
        let tally = ResponseAggregator::new().aggregate(&questions, &[]);
        let q1 = tally.summary.get("Q1").unwrap();

        assert_eq!(q1.total, 0);
        assert_eq!(q1.percentage("Yes"), Some("0.0%"));
        assert_eq!(q1.bar("No"), Some(" 0/0"));
    }

    #[test]
    fn test_misaligned_result_rejected_whole() {
        let questions = fixtures::yes_no_questions();
        let results = vec![QueryResult::new(
            "short",
            vec![],
            vec![],
        )];

        let tally = ResponseAggregator::new().aggregate(&questions, &results);
        assert!(matches!(tally.rejections[0], AggregationError::Misaligned { expected: 1, .. }));
        assert_eq!(tally.summary.get("Q1").unwrap().total, 0);
    }

    #[test]
    fn test_numerical_counts_and_stats() {
        let range = NumericRange::new(0.0, 10.0).unwrap();
        let questions = QuestionSet::numerical([("Rate", range)]).unwrap();
        let results = vec![
            numeric_result("a", vec![AnswerValue::Float(7.5)]),
            numeric_result("b", vec![AnswerValue::Float(3.0)]),
            numeric_result("c", vec![AnswerValue::Float(7.5)]),
            numeric_result("d", vec![AnswerValue::Float(11.0)]),
        ];

        let tally = ResponseAggregator::new().aggregate(&questions, &results);
        let rate = tally.summary.get("Rate").unwrap();

        assert_eq!(rate.counts, vec![("3".to_string(), 1), ("7.5".to_string(), 2)]);
        assert_eq!(rate.total, 3);
        let stats = rate.stats.unwrap();
        assert_eq!(stats.min, 3.0);
        assert_eq!(stats.max, 7.5);
        assert!((stats.mean - 6.0).abs() < 1e-9);

        assert_eq!(tally.rejections.len(), 1);
        assert!(matches!(tally.rejections[0], AggregationError::OutOfRange { value, .. } if value == 11.0));
    }

    #[test]
    fn test_numerical_rejects_text_answers() {
        let range = NumericRange::new(1.0, 5.0).unwrap();
        let questions = QuestionSet::numerical([("Score", range)]).unwrap();
        let results = vec![numeric_result("a", vec![AnswerValue::Choice("high".into())])];

        let tally = ResponseAggregator::new().aggregate(&questions, &results);
        assert!(matches!(tally.rejections[0], AggregationError::NotNumeric { .. }));
        assert!(tally.summary.get("Score").unwrap().stats.is_none());
    }

    #[test]
    fn test_custom_bar_width() {
        let questions = fixtures::yes_no_questions();
        let results = fixtures::yes_no_results(1, 1);
        let tally = ResponseAggregator::new().with_bar_width(10).aggregate(&questions, &results);
        assert_eq!(tally.summary.get("Q1").unwrap().bar("Yes"), Some("█████ 1/2"));
    }
}
