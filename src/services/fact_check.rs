//! Fact checking
//!
//! Tier 4 is driven entirely through this interface. The contract is
//! idempotence: checking the same article twice yields the same outcome,
//! and the scheduler only ever submits articles still marked `unchecked`.

use async_trait::async_trait;

use crate::models::article::{Article, FactCheckFlag, FactCheckStatus};

/// Result of checking one article.
#[derive(Debug, Clone)]
pub struct FactCheckOutcome {
    pub status: FactCheckStatus,
    pub flags: Vec<FactCheckFlag>,
}

/// External fact-checking collaborator.
#[async_trait]
pub trait FactChecker: Send + Sync {
    /// Whether Tier 4 should run at all.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn check(&self, article: &Article) -> anyhow::Result<FactCheckOutcome>;
}

/// The default collaborator when no checker is configured: Tier 4 is a
/// no-op and articles stay `unchecked`.
pub struct DisabledFactChecker;

#[async_trait]
impl FactChecker for DisabledFactChecker {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn check(&self, _article: &Article) -> anyhow::Result<FactCheckOutcome> {
        Ok(FactCheckOutcome {
            status: FactCheckStatus::Unchecked,
            flags: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_checker_is_disabled() {
        assert!(!DisabledFactChecker.is_enabled());
    }
}
