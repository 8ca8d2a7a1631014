//! Question Sets
//!
//! Ordered survey questions. Responses are correlated to questions by
//! position, so a `QuestionSet` never reorders its entries.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Inclusive numeric answer range.
///
/// Serializes as a two-element array, e.g. `[0, 10]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub low: f64,
    pub high: f64,
}

impl NumericRange {
    /// Creates a range, rejecting non-finite bounds and `low > high`.
    pub fn new(low: f64, high: f64) -> Result<Self, QuestionError> {
        let range = Self { low, high };
        if range.is_valid() {
            Ok(range)
        } else {
            Err(QuestionError::InvalidRange {
                question: String::new(),
                low,
                high,
            })
        }
    }

    fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }

    /// Returns true if `value` lies inside the range (bounds included).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

impl Serialize for NumericRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [self.low, self.high].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NumericRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let [low, high] = <[f64; 2]>::deserialize(deserializer)?;
        Ok(Self { low, high })
    }
}

/// What kind of answer a question expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QuestionSpec {
    /// Fixed option choice. Never empty.
    Categorical(Vec<String>),
    /// Numeric value inside a range.
    Numerical(NumericRange),
}

/// Answer shape shared by every question in a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Categorical,
    Numerical,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Categorical => write!(f, "categorical"),
            QuestionKind::Numerical => write!(f, "numerical"),
        }
    }
}

/// A single question and its answer specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub text: String,
    pub spec: QuestionSpec,
}

impl Question {
    /// Declared options, if categorical.
    pub fn options(&self) -> Option<&[String]> {
        match &self.spec {
            QuestionSpec::Categorical(options) => Some(options),
            QuestionSpec::Numerical(_) => None,
        }
    }

    /// Declared range, if numerical.
    pub fn range(&self) -> Option<NumericRange> {
        match &self.spec {
            QuestionSpec::Categorical(_) => None,
            QuestionSpec::Numerical(range) => Some(*range),
        }
    }
}

/// Ordered, validated collection of questions of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    kind: QuestionKind,
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Builds a categorical set from `(question, options)` pairs.
    ///
    /// # Example
    ///
    /// ```
    /// use poll_events::QuestionSet;
    ///
    /// let set = QuestionSet::categorical([("Do you vote?", ["Yes", "No"])]).unwrap();
    /// assert_eq!(set.len(), 1);
    /// assert_eq!(set.get(0).unwrap().options().unwrap(), ["Yes", "No"]);
    /// ```
    pub fn categorical<I, T, O, S>(items: I) -> Result<Self, QuestionError>
    where
        I: IntoIterator<Item = (T, O)>,
        T: Into<String>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let questions = items
            .into_iter()
            .map(|(text, options)| Question {
                text: text.into(),
                spec: QuestionSpec::Categorical(options.into_iter().map(Into::into).collect()),
            })
            .collect();
        Self::from_questions(QuestionKind::Categorical, questions)
    }

    /// Builds a numerical set from `(question, range)` pairs.
    pub fn numerical<I, T>(items: I) -> Result<Self, QuestionError>
    where
        I: IntoIterator<Item = (T, NumericRange)>,
        T: Into<String>,
    {
        let questions = items
            .into_iter()
            .map(|(text, range)| Question {
                text: text.into(),
                spec: QuestionSpec::Numerical(range),
            })
            .collect();
        Self::from_questions(QuestionKind::Numerical, questions)
    }

    fn from_questions(kind: QuestionKind, questions: Vec<Question>) -> Result<Self, QuestionError> {
        if questions.is_empty() {
            return Err(QuestionError::Empty);
        }

        let mut seen = HashSet::new();
        for question in &questions {
            if !seen.insert(question.text.as_str()) {
                return Err(QuestionError::DuplicateQuestion(question.text.clone()));
            }
            match &question.spec {
                QuestionSpec::Categorical(options) => {
                    if options.is_empty() {
                        return Err(QuestionError::NoOptions(question.text.clone()));
                    }
                    let mut seen_options = HashSet::new();
                    for option in options {
                        if !seen_options.insert(option.as_str()) {
                            return Err(QuestionError::DuplicateOption {
                                question: question.text.clone(),
                                option: option.clone(),
                            });
                        }
                    }
                }
                QuestionSpec::Numerical(range) => {
                    if !range.is_valid() {
                        return Err(QuestionError::InvalidRange {
                            question: question.text.clone(),
                            low: range.low,
                            high: range.high,
                        });
                    }
                }
            }
        }

        Ok(Self { kind, questions })
    }

    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false for a constructed set; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// True when the set holds more than one question.
    pub fn is_batch(&self) -> bool {
        self.questions.len() > 1
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.questions.iter()
    }

    /// Question texts in set order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(|q| q.text.as_str())
    }
}

impl<'a> IntoIterator for &'a QuestionSet {
    type Item = &'a Question;
    type IntoIter = std::slice::Iter<'a, Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.iter()
    }
}

// Serialized as `{ "question": spec, ... }` in set order.
impl Serialize for QuestionSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let pairs: Vec<(&str, &QuestionSpec)> =
            self.questions.iter().map(|q| (q.text.as_str(), &q.spec)).collect();
        crate::ordered_map::serialize(&pairs, serializer)
    }
}

/// Serde adapter for categorical sets: `{ "question": ["opt", ...] }`.
pub mod categorical {
    use super::QuestionSet;
    use serde::{Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(set: &QuestionSet, serializer: S) -> Result<S::Ok, S::Error> {
        set.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QuestionSet, D::Error> {
        let pairs: Vec<(String, Vec<String>)> = crate::ordered_map::deserialize(deserializer)?;
        QuestionSet::categorical(pairs).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for numerical sets: `{ "question": [low, high] }`.
pub mod numerical {
    use super::{NumericRange, QuestionSet};
    use serde::{Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(set: &QuestionSet, serializer: S) -> Result<S::Ok, S::Error> {
        set.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QuestionSet, D::Error> {
        let pairs: Vec<(String, NumericRange)> = crate::ordered_map::deserialize(deserializer)?;
        QuestionSet::numerical(pairs).map_err(serde::de::Error::custom)
    }
}

/// Errors raised while building a question set.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuestionError {
    #[error("question set is empty")]
    Empty,
    #[error("question '{0}' has no options")]
    NoOptions(String),
    #[error("question '{0}' appears more than once")]
    DuplicateQuestion(String),
    #[error("question '{question}' declares option '{option}' more than once")]
    DuplicateOption { question: String, option: String },
    #[error("question '{question}' has invalid range [{low}, {high}]")]
    InvalidRange { question: String, low: f64, high: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorical_keeps_input_order() {
        let set = QuestionSet::categorical([
            ("Q2", vec!["a", "b"]),
            ("Q1", vec!["c"]),
            ("Q3", vec!["d", "e", "f"]),
        ])
        .unwrap();

        let texts: Vec<&str> = set.texts().collect();
        assert_eq!(texts, vec!["Q2", "Q1", "Q3"]);
        assert_eq!(set.kind(), QuestionKind::Categorical);
        assert!(set.is_batch());
    }

    #[test]
    fn test_empty_options_rejected() {
        let err = QuestionSet::categorical([("Q1", Vec::<String>::new())]).unwrap_err();
        assert_eq!(err, QuestionError::NoOptions("Q1".to_string()));
    }

    #[test]
    fn test_empty_set_rejected() {
        let err = QuestionSet::categorical(Vec::<(String, Vec<String>)>::new()).unwrap_err();
        assert_eq!(err, QuestionError::Empty);
    }

    #[test]
    fn test_duplicate_option_rejected() {
        let err = QuestionSet::categorical([("Q1", ["Yes", "Yes"])]).unwrap_err();
        assert!(matches!(err, QuestionError::DuplicateOption { .. }));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(NumericRange::new(10.0, 1.0).is_err());

        let bad = NumericRange { low: 5.0, high: 1.0 };
        let err = QuestionSet::numerical([("How many?", bad)]).unwrap_err();
        assert!(matches!(err, QuestionError::InvalidRange { ref question, .. } if question == "How many?"));
    }

    #[test]
    fn test_categorical_adapter_reads_document_order() {
        #[derive(Deserialize)]
        struct Input {
            #[serde(with = "categorical")]
            questions: QuestionSet,
        }

        let json = r#"{"questions": {"Zebra?": ["Yes", "No"], "Apple?": ["Maybe"]}}"#;
        let input: Input = serde_json::from_str(json).unwrap();
        let texts: Vec<&str> = input.questions.texts().collect();
        assert_eq!(texts, vec!["Zebra?", "Apple?"]);
    }

    #[test]
    fn test_numerical_adapter_parses_ranges() {
        #[derive(Deserialize)]
        struct Input {
            #[serde(with = "numerical")]
            questions: QuestionSet,
        }

        let json = r#"{"questions": {"Rate it": [1, 10]}}"#;
        let input: Input = serde_json::from_str(json).unwrap();
        let range = input.questions.get(0).unwrap().range().unwrap();
        assert_eq!(range, NumericRange { low: 1.0, high: 10.0 });
        assert_eq!(range.to_string(), "[1, 10]");
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let set = QuestionSet::categorical([("B?", vec!["x"]), ("A?", vec!["y", "z"])]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"B?":["x"],"A?":["y","z"]}"#);
    }
}
