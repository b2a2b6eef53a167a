//! Token budget declarations for sections.
//!
//! A section declares how much of its parent's budget it wants:
//! a fixed count, a fraction of the parent's budget, or an equal share of
//! whatever is left once the explicit claims are satisfied.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTokens", into = "RawTokens")]
pub enum TokenBudget {
    /// A literal token count.
    Fixed(usize),
    /// A fraction in (0, 1) of the parent's budget.
    Proportional(f64),
    /// An equal share of the budget left after fixed and proportional siblings.
    #[default]
    Remaining,
}

impl TokenBudget {
    /// Interpret a single numeric value the way prompt definitions spell it.
    ///
    /// `-1` is the remaining sentinel, values in (0, 1) are fractions and
    /// non-negative values are literal counts. Anything malformed (NaN,
    /// infinities, other negatives) is treated as `Remaining`.
    pub fn from_raw(value: f64) -> Self {
        if !value.is_finite() || value < 0.0 {
            return Self::Remaining;
        }
        if value > 0.0 && value < 1.0 {
            Self::Proportional(value)
        } else {
            Self::Fixed(value.floor() as usize)
        }
    }

    /// The explicit claim against `total`, or `None` for `Remaining`.
    pub fn claim(&self, total: usize) -> Option<usize> {
        match self {
            Self::Fixed(n) => Some(*n),
            Self::Proportional(f) => Some((f * total as f64).floor() as usize),
            Self::Remaining => None,
        }
    }

    pub fn is_remaining(&self) -> bool {
        matches!(self, Self::Remaining)
    }
}

impl std::fmt::Display for TokenBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n} tokens"),
            Self::Proportional(p) => write!(f, "{:.0}%", p * 100.0),
            Self::Remaining => write!(f, "remaining"),
        }
    }
}

/// Wire form: a number, or a keyword such as `"remaining"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawTokens {
    Number(f64),
    Keyword(String),
}

impl From<RawTokens> for TokenBudget {
    fn from(raw: RawTokens) -> Self {
        match raw {
            RawTokens::Number(n) => Self::from_raw(n),
            // "remaining", "auto" and anything unrecognised
            RawTokens::Keyword(_) => Self::Remaining,
        }
    }
}

impl From<TokenBudget> for RawTokens {
    fn from(budget: TokenBudget) -> Self {
        match budget {
            TokenBudget::Fixed(n) => Self::Number(n as f64),
            TokenBudget::Proportional(p) => Self::Number(p),
            TokenBudget::Remaining => Self::Keyword("remaining".into()),
        }
    }
}
