// src/models/quiz.rs

use std::{cmp::Ordering, collections::BTreeMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

/// One entry of the catalog stored under `quizzes/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub sub_title: String,

    /// Time budget in seconds. Zero or absent means the quiz has none.
    pub duration: Option<u32>,

    /// Question id -> question. Stored either as an object or, when the ids are
    /// `0..n`, as an array.
    #[serde(deserialize_with = "keyed_questions")]
    pub questions: BTreeMap<String, Question>,
}

impl Quiz {
    pub fn effective_duration(&self) -> Option<u32> {
        self.duration.filter(|d| *d > 0)
    }

    /// Questions in key order, numeric keys first and compared as numbers.
    pub fn ordered_questions(&self) -> Vec<Question> {
        let mut entries: Vec<(&String, &Question)> = self.questions.iter().collect();
        entries.sort_by(|a, b| compare_keys(a.0, b.0));
        entries.into_iter().map(|(_, q)| q.clone()).collect()
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
#[validate(schema(function = validate_correct_answer))]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    /// 0-based index into `options`.
    pub correct_answer: usize,
}

fn validate_correct_answer(question: &Question) -> Result<(), ValidationError> {
    if question.correct_answer >= question.options.len() {
        return Err(ValidationError::new("correct_answer_out_of_range"));
    }
    Ok(())
}

/// Key ordering used for every keyed child list: integer keys ascending,
/// then the rest lexicographically.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Children of an object or array snapshot as `(key, value)` pairs in key order.
/// Array holes (`null`) are dropped.
pub fn children(snapshot: &Value) -> Vec<(String, &Value)> {
    let mut entries: Vec<(String, &Value)> = match snapshot {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    };
    entries.sort_by(|a, b| compare_keys(&a.0, &b.0));
    entries
}

fn keyed_questions<'de, D>(deserializer: D) -> Result<BTreeMap<String, Question>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    children(&raw)
        .into_iter()
        .map(|(key, value)| {
            Question::deserialize(value)
                .map(|q| (key, q))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}
