//! Credit charging for billable operations.
//!
//! The pipeline never touches credits. The translation routes reserve credits
//! before calling the model and refund them if the call fails.

use crate::error::{PipelineError, PipelineResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

const CHARS_PER_CREDIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOperation {
    Translation,
    ExtractAndTranslate,
}

/// One credit per started 1000 characters, minimum 1.
pub fn credits_for_translation(text_len: usize) -> u64 {
    text_len.div_ceil(CHARS_PER_CREDIT).max(1) as u64
}

/// Balances per organization. Every mutation checks and updates the balance
/// in one step, so concurrent requests cannot overdraw it.
pub trait CreditLedger: Send + Sync {
    fn balance(&self, organization_id: &str) -> PipelineResult<u64>;

    /// Deduct exactly `credits` and return the remaining balance. Fails with
    /// `InsufficientCredits` and leaves the balance untouched if it is short.
    fn deduct(
        &self,
        organization_id: &str,
        credits: u64,
        operation: CreditOperation,
    ) -> PipelineResult<u64>;

    /// Deduct at most `credits`, never going below zero. Returns the amount
    /// actually charged.
    fn deduct_up_to(
        &self,
        organization_id: &str,
        credits: u64,
        operation: CreditOperation,
    ) -> PipelineResult<u64>;

    /// Give back credits reserved for an operation that did not complete.
    fn refund(&self, organization_id: &str, credits: u64) -> PipelineResult<u64>;
}

/// Process-local ledger. Balances are seeded at startup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCreditLedger {
    inner: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryCreditLedger {
    pub fn new(balances: HashMap<String, u64>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(balances)),
        }
    }

    /// Apply `update` to the organization's balance under the write lock.
    /// `update` returns the amount charged, or an error to leave it unchanged.
    fn update<F>(&self, organization_id: &str, update: F) -> PipelineResult<(u64, u64)>
    where
        F: FnOnce(u64) -> PipelineResult<u64>,
    {
        let mut balances = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let balance = balances
            .get_mut(organization_id)
            .ok_or_else(|| PipelineError::OrganizationNotFound(organization_id.to_string()))?;

        let charged = update(*balance)?;
        *balance -= charged;
        Ok((charged, *balance))
    }
}

impl CreditLedger for InMemoryCreditLedger {
    fn balance(&self, organization_id: &str) -> PipelineResult<u64> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(organization_id)
            .copied()
            .ok_or_else(|| PipelineError::OrganizationNotFound(organization_id.to_string()))
    }

    fn deduct(
        &self,
        organization_id: &str,
        credits: u64,
        operation: CreditOperation,
    ) -> PipelineResult<u64> {
        let (_, remaining) = self.update(organization_id, |available| {
            if available < credits {
                return Err(PipelineError::InsufficientCredits {
                    required: credits,
                    available,
                });
            }
            Ok(credits)
        })?;

        info!(
            "Deducted {} credits from {} for {:?} ({} left)",
            credits, organization_id, operation, remaining
        );
        Ok(remaining)
    }

    fn deduct_up_to(
        &self,
        organization_id: &str,
        credits: u64,
        operation: CreditOperation,
    ) -> PipelineResult<u64> {
        let (charged, remaining) =
            self.update(organization_id, |available| Ok(credits.min(available)))?;

        if charged < credits {
            warn!(
                "Organization {} short by {} credits for {:?}; charged remaining balance",
                organization_id,
                credits - charged,
                operation
            );
        }
        info!(
            "Deducted {} credits from {} for {:?} ({} left)",
            charged, organization_id, operation, remaining
        );
        Ok(charged)
    }

    fn refund(&self, organization_id: &str, credits: u64) -> PipelineResult<u64> {
        let mut balances = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let balance = balances
            .get_mut(organization_id)
            .ok_or_else(|| PipelineError::OrganizationNotFound(organization_id.to_string()))?;
        *balance = balance.saturating_add(credits);

        info!("Refunded {} credits to {} ({} left)", credits, organization_id, *balance);
        Ok(*balance)
    }
}
