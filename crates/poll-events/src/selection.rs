//! Selection Requests
//!
//! How many agents a run should query: an exact count (`10`) or a share of
//! the population (`"25%"`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Requested sample size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionRequest {
    /// Exact number of agents, at least one. A count of one always means
    /// the baseline persona.
    Count(u32),
    /// Percentage of the population, in `(0, 100]`.
    Percent(f64),
}

impl SelectionRequest {
    /// Creates an exact-count request.
    pub fn count(n: u32) -> Result<Self, SelectionParseError> {
        if n == 0 {
            return Err(SelectionParseError::ZeroCount);
        }
        Ok(SelectionRequest::Count(n))
    }

    /// Creates a percentage request.
    pub fn percent(p: f64) -> Result<Self, SelectionParseError> {
        if !(p.is_finite() && p > 0.0 && p <= 100.0) {
            return Err(SelectionParseError::PercentOutOfRange(p));
        }
        Ok(SelectionRequest::Percent(p))
    }

    /// True for the single-agent baseline request.
    pub fn is_baseline(&self) -> bool {
        matches!(self, SelectionRequest::Count(1))
    }

    /// Number of agents this request resolves to for a population of
    /// `population_size`, ignoring the baseline special case.
    ///
    /// Percentages use `max(1, floor(size * p / 100))`.
    pub fn resolve(&self, population_size: usize) -> usize {
        match *self {
            SelectionRequest::Count(n) => (n as usize).min(population_size),
            SelectionRequest::Percent(p) => {
                let num = (population_size as f64 * p / 100.0).floor() as usize;
                num.max(1).min(population_size)
            }
        }
    }
}

impl Default for SelectionRequest {
    fn default() -> Self {
        SelectionRequest::Count(1)
    }
}

impl fmt::Display for SelectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionRequest::Count(n) => write!(f, "{}", n),
            SelectionRequest::Percent(p) => write!(f, "{}%", p),
        }
    }
}

impl FromStr for SelectionRequest {
    type Err = SelectionParseError;

    /// Parses `"10"` or `"25%"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(number) = trimmed.strip_suffix('%') {
            let p = number
                .trim()
                .parse::<f64>()
                .map_err(|_| SelectionParseError::InvalidFormat(s.to_string()))?;
            return SelectionRequest::percent(p);
        }
        let n = trimmed
            .parse::<u32>()
            .map_err(|_| SelectionParseError::InvalidFormat(s.to_string()))?;
        SelectionRequest::count(n)
    }
}

// Counts serialize as integers, percentages as "P%" strings.
impl Serialize for SelectionRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SelectionRequest::Count(n) => serializer.serialize_u32(*n),
            SelectionRequest::Percent(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for SelectionRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(n) => {
                let n = u32::try_from(n).map_err(|_| {
                    serde::de::Error::custom(SelectionParseError::InvalidFormat(n.to_string()))
                })?;
                SelectionRequest::count(n).map_err(serde::de::Error::custom)
            }
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Errors parsing a selection request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionParseError {
    #[error("invalid agent count '{0}', expected an integer like '10' or a percentage like '25%'")]
    InvalidFormat(String),
    #[error("agent count must be at least 1")]
    ZeroCount,
    #[error("percentage {0} is outside (0, 100]")]
    PercentOutOfRange(f64),
}

/// Agents chosen for one run, in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationSelection {
    pub agent_ids: Vec<String>,
    /// Set when the selection is the fixed baseline persona.
    #[serde(default)]
    pub baseline: bool,
}

impl PopulationSelection {
    pub fn len(&self) -> usize {
        self.agent_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agent_ids.is_empty()
    }
}
