//! Context Policy
//!
//! Decides how a new answer relates to the previous one:
//!
//! | keep_context | overwrite_next | history | decision |
//! |---|---|---|---|
//! | any | true | non-empty | [`ContextDecision::Replace`] |
//! | true | false | non-empty | [`ContextDecision::Continue`] |
//! | any | any | empty | [`ContextDecision::Create`] |
//! | false | false | non-empty | [`ContextDecision::Create`] |
//!
//! `overwrite_next` is a one-shot flag: [`ContextFlags::take_decision`] clears
//! it whenever a decision is made, whatever that decision is.

use serde::{Deserialize, Serialize};

/// How the active history entry is prepared for a new stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextDecision {
    /// Append the new answer to the newest entry after a separator
    Continue,
    /// Regenerate the newest entry in place
    Replace,
    /// Insert a fresh entry at the front of the log
    Create,
}

impl std::fmt::Display for ContextDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Replace => write!(f, "replace"),
            Self::Create => write!(f, "create"),
        }
    }
}

/// Caller-owned flags read by the policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFlags {
    /// Persistent preference: carry the previous answer into the next one
    pub keep_context: bool,
    /// One-shot request to regenerate the newest answer
    pub overwrite_next: bool,
}

impl ContextFlags {
    /// Create flags with the given context preference and no pending overwrite
    #[must_use]
    pub fn new(keep_context: bool) -> Self {
        Self {
            keep_context,
            overwrite_next: false,
        }
    }

    /// Arm the one-shot overwrite for the next stream
    pub fn request_overwrite(&mut self) {
        self.overwrite_next = true;
    }

    /// Decide for the next stream and consume the overwrite flag
    pub fn take_decision(&mut self, history_non_empty: bool) -> ContextDecision {
        let decision = decide(self, history_non_empty);
        self.overwrite_next = false;
        decision
    }
}

/// Pure policy decision
#[must_use]
pub fn decide(flags: &ContextFlags, history_non_empty: bool) -> ContextDecision {
    if !history_non_empty {
        return ContextDecision::Create;
    }
    if flags.overwrite_next {
        ContextDecision::Replace
    } else if flags.keep_context {
        ContextDecision::Continue
    } else {
        ContextDecision::Create
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(keep_context: bool, overwrite_next: bool) -> ContextFlags {
        ContextFlags {
            keep_context,
            overwrite_next,
        }
    }

    #[test]
    fn test_decision_table() {
        let cases = [
            (false, false, false, ContextDecision::Create),
            (true, false, false, ContextDecision::Create),
            (false, true, false, ContextDecision::Create),
            (true, true, false, ContextDecision::Create),
            (false, false, true, ContextDecision::Create),
            (true, false, true, ContextDecision::Continue),
            (false, true, true, ContextDecision::Replace),
            (true, true, true, ContextDecision::Replace),
        ];

        for (keep, overwrite, non_empty, expected) in cases {
            assert_eq!(
                decide(&flags(keep, overwrite), non_empty),
                expected,
                "keep={keep} overwrite={overwrite} non_empty={non_empty}"
            );
        }
    }

    #[test]
    fn test_take_decision_consumes_overwrite() {
        let mut f = ContextFlags::new(true);
        f.request_overwrite();

        assert_eq!(f.take_decision(true), ContextDecision::Replace);
        assert!(!f.overwrite_next);
        assert!(f.keep_context);

        // Second stream falls back to the persistent preference
        assert_eq!(f.take_decision(true), ContextDecision::Continue);
    }

    #[test]
    fn test_overwrite_consumed_even_when_log_empty() {
        let mut f = ContextFlags::new(false);
        f.request_overwrite();

        assert_eq!(f.take_decision(false), ContextDecision::Create);
        assert!(!f.overwrite_next);
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(ContextDecision::Continue.to_string(), "continue");
        assert_eq!(ContextDecision::Replace.to_string(), "replace");
        assert_eq!(ContextDecision::Create.to_string(), "create");
    }
}
