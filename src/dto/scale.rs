use std::fmt;

use serde::{Deserialize, Serialize};

const FIBONACCI: &[&str] = &["0", "0.5", "1", "2", "3", "5", "8", "13", "21", "?", "coffee"];
const MODIFIED_FIBONACCI: &[&str] = &[
    "0", "0.5", "1", "2", "3", "5", "8", "13", "20", "40", "100", "?", "coffee",
];
const T_SHIRT: &[&str] = &["XS", "S", "M", "L", "XL", "XXL", "?", "coffee"];

/// Set of legal vote tokens for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationScale {
    #[default]
    Fibonacci,
    ModifiedFibonacci,
    TShirt,
    /// Scale identifier this client does not know; displayed as fibonacci.
    #[serde(other)]
    Unknown,
}

impl EstimationScale {
    /// Vote tokens offered for this scale.
    pub fn values(self) -> &'static [&'static str] {
        match self {
            Self::Fibonacci | Self::Unknown => FIBONACCI,
            Self::ModifiedFibonacci => MODIFIED_FIBONACCI,
            Self::TShirt => T_SHIRT,
        }
    }

    /// Whether `value` is one of the tokens for this scale.
    pub fn accepts(self, value: &str) -> bool {
        self.values().contains(&value)
    }
}

impl fmt::Display for EstimationScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fibonacci => "fibonacci",
            Self::ModifiedFibonacci => "modified_fibonacci",
            Self::TShirt => "t_shirt",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
