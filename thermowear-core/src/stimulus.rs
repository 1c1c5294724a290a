use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of the temperature change applied during a trial.
///
/// Strings other than `warm`, `cool` and `baseline` are kept verbatim so the
/// export reproduces what the experiment file said. The heating element
/// treats them like `baseline`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Condition {
    Warm,
    Cool,
    Baseline,
    Unrecognized(String),
}

impl Condition {
    pub fn as_str(&self) -> &str {
        match self {
            Condition::Warm => "warm",
            Condition::Cool => "cool",
            Condition::Baseline => "baseline",
            Condition::Unrecognized(other) => other,
        }
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        match value {
            "warm" => Condition::Warm,
            "cool" => Condition::Cool,
            "baseline" => Condition::Baseline,
            other => Condition::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        Condition::from(value.as_str())
    }
}

impl From<Condition> for String {
    fn from(value: Condition) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
