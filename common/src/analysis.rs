use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Classifier verdict severity, in escalating order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    None,
    Warning,
    Trigger,
}

/// Unsafe-content category scored by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Nudity,
    Gore,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Nudity => "nudity",
            Category::Gore => "gore",
        }
    }
}

/// A successful classification: overall severity plus per-category scores in
/// `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub rating: Rating,
    pub details: HashMap<Category, f32>,
}

impl Analysis {
    /// The all-clear verdict.
    pub fn safe() -> Self {
        Self { rating: Rating::None, details: HashMap::new() }
    }
}
