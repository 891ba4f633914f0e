//! Approval matching and retry budget policies.
//!
//! These are pure decision helpers — no I/O, no session state. The Reviewer
//! owns the mutable attempt counter; the policies here only say what counts
//! as an approval and when the budget is spent.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default approval token the Reviewer looks for.
pub const DEFAULT_APPROVAL_TOKEN: &str = "APPROVE";

/// Default number of retries before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How strictly the reviewer response is matched against the approval token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrictness {
    /// The trimmed response must equal the token.
    Exact,
    /// The token may appear anywhere in the response.
    Contains,
}

impl FromStr for MatchStrictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchStrictness::Exact),
            "contains" => Ok(MatchStrictness::Contains),
            other => Err(format!("unknown match strictness: '{}'", other)),
        }
    }
}

/// Decides whether a reviewer response approves the execution result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub token: String,
    pub strictness: MatchStrictness,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            token: DEFAULT_APPROVAL_TOKEN.to_string(),
            strictness: MatchStrictness::Exact,
        }
    }
}

impl ApprovalPolicy {
    pub fn new(token: impl Into<String>, strictness: MatchStrictness) -> Self {
        Self {
            token: token.into(),
            strictness,
        }
    }

    pub fn is_approval(&self, response: &str) -> bool {
        match self.strictness {
            MatchStrictness::Exact => response.trim() == self.token,
            MatchStrictness::Contains => response.contains(&self.token),
        }
    }
}

/// Bounded retry budget for one run
///
/// The counter itself lives in the Reviewer instance; the policy only
/// answers "is this attempt count over budget" and renders the terminal
/// give-up message. An always-rejecting reviewer therefore terminates after
/// exactly `max_attempts + 1` review turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// True once `attempts` non-approvals exceed the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_attempts
    }

    /// The deterministic terminal message for an exhausted run.
    pub fn gave_up_message(&self) -> String {
        format!("Task failed after tried {} times.", self.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ApprovalPolicy Tests ====================

    #[test]
    fn test_exact_match_accepts_trimmed_token() {
        let policy = ApprovalPolicy::default();
        assert!(policy.is_approval("APPROVE"));
        assert!(policy.is_approval("  APPROVE\n"));
    }

    #[test]
    fn test_exact_match_rejects_embedded_token() {
        let policy = ApprovalPolicy::default();
        assert!(!policy.is_approval("I APPROVE this result"));
        assert!(!policy.is_approval("approve"));
        assert!(!policy.is_approval(""));
    }

    #[test]
    fn test_contains_match_accepts_embedded_token() {
        let policy = ApprovalPolicy::new("APPROVE", MatchStrictness::Contains);
        assert!(policy.is_approval("I APPROVE this result"));
        assert!(policy.is_approval("APPROVE"));
        assert!(!policy.is_approval("needs another pass"));
    }

    #[test]
    fn test_custom_token() {
        let policy = ApprovalPolicy::new("LGTM", MatchStrictness::Exact);
        assert!(policy.is_approval("LGTM"));
        assert!(!policy.is_approval("APPROVE"));
    }

    #[test]
    fn test_strictness_from_str() {
        assert_eq!(
            "exact".parse::<MatchStrictness>().unwrap(),
            MatchStrictness::Exact
        );
        assert_eq!(
            "Contains".parse::<MatchStrictness>().unwrap(),
            MatchStrictness::Contains
        );
        assert!("fuzzy".parse::<MatchStrictness>().is_err());
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_budget_exhaustion_boundary() {
        let policy = RetryPolicy::new(3);
        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }

    #[test]
    fn test_zero_budget_exhausts_on_first_rejection() {
        let policy = RetryPolicy::new(0);
        assert!(!policy.is_exhausted(0));
        assert!(policy.is_exhausted(1));
    }

    #[test]
    fn test_gave_up_message_is_deterministic() {
        assert_eq!(
            RetryPolicy::new(1).gave_up_message(),
            "Task failed after tried 1 times."
        );
        assert_eq!(
            RetryPolicy::default().gave_up_message(),
            "Task failed after tried 3 times."
        );
    }
}
