use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::record::Fields;

/// A reviewer's verdict on a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Answer {
    Yes,
    No,
    Unsure,
}

impl Answer {
    /// Single-letter wire code (`y` / `n` / `u`).
    pub fn code(self) -> &'static str {
        match self {
            Self::Yes => "y",
            Self::No => "n",
            Self::Unsure => "u",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Self::Yes),
            "n" | "no" => Some(Self::No),
            "u" | "unsure" | "uncertain" => Some(Self::Unsure),
            _ => None,
        }
    }

    /// Unsure answers carry no signal and are never sent back.
    pub fn is_signal(self) -> bool {
        !matches!(self, Self::Unsure)
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
            Self::Unsure => write!(f, "unsure"),
        }
    }
}

/// Ordered pair of records, optionally labeled.
///
/// Sides are kept as the raw objects the service sent (or, for pairs
/// derived during review, the record's wire form) so they can be echoed
/// back verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPair {
    pub left: Fields,
    pub right: Fields,
    pub answer: Option<Answer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairShapeError {
    /// Neither `[a, b]` nor `{"0": a, "1": b}`.
    NotAPair,
    /// One side missing or not an object.
    MissingSide(usize),
}

impl fmt::Display for PairShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAPair => write!(f, "training pair is not a two-record pair"),
            Self::MissingSide(side) => write!(f, "training pair is missing record {}", side + 1),
        }
    }
}

impl std::error::Error for PairShapeError {}

impl TrainingPair {
    pub fn unlabeled(left: Fields, right: Fields) -> Self {
        Self { left, right, answer: None }
    }

    pub fn labeled(left: Fields, right: Fields, answer: Answer) -> Self {
        Self { left, right, answer: Some(answer) }
    }

    pub fn with_answer(mut self, answer: Answer) -> Self {
        self.answer = Some(answer);
        self
    }

    /// Parse a candidate pair as sent by the service. Both the array form
    /// and the `"0"`/`"1"` keyed object form are accepted.
    pub fn from_wire(value: Value) -> Result<Self, PairShapeError> {
        let (left, right) = match value {
            Value::Array(mut items) if items.len() <= 2 => {
                let right = if items.len() == 2 { items.pop() } else { None };
                let left = items.pop();
                (left, right)
            }
            Value::Object(mut obj) => (obj.remove("0"), obj.remove("1")),
            _ => return Err(PairShapeError::NotAPair),
        };

        let left = side(left).ok_or(PairShapeError::MissingSide(0))?;
        let right = side(right).ok_or(PairShapeError::MissingSide(1))?;
        Ok(Self::unlabeled(left, right))
    }
}

fn side(value: Option<Value>) -> Option<Fields> {
    match value {
        Some(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

impl Serialize for TrainingPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.answer.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("0", &self.left)?;
        map.serialize_entry("1", &self.right)?;
        if let Some(answer) = self.answer {
            map.serialize_entry("answer", answer.code())?;
        }
        map.end()
    }
}
