//! Retrying decorator for lookup collaborators.
//!
//! Retries transient failures (`Unavailable`, `RateLimited`) with
//! exponential backoff. The engine itself never retries; wrap the
//! collaborators here when the transport calls for it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use warden_core::{LookupError, ResourceId, Unit, UnitIdSet, UserId};

use crate::{AssignmentLookup, MembershipLookup, UnitLookup};

/// Default retry attempts after the first failure.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry; doubles on every attempt.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Wraps a lookup and retries its transient failures.
///
/// ```ignore
/// let units = Retrying::new(directory.clone(), RetryPolicy::default());
/// ```
#[derive(Debug, Clone)]
pub struct Retrying<L> {
    inner: L,
    policy: RetryPolicy,
}

impl<L> Retrying<L> {
    pub fn new(inner: L, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, LookupError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LookupError>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        service = %e.service(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying lookup"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<L: AssignmentLookup> AssignmentLookup for Retrying<L> {
    async fn assigned_units(&self, resource_id: &ResourceId) -> Result<UnitIdSet, LookupError> {
        self.run(|| self.inner.assigned_units(resource_id)).await
    }
}

#[async_trait]
impl<L: UnitLookup> UnitLookup for Retrying<L> {
    async fn units(&self, unit_ids: &UnitIdSet) -> Result<Vec<Unit>, LookupError> {
        self.run(|| self.inner.units(unit_ids)).await
    }
}

#[async_trait]
impl<L: MembershipLookup> MembershipLookup for Retrying<L> {
    async fn memberships(
        &self,
        user_id: &UserId,
        unit_ids: &UnitIdSet,
    ) -> Result<UnitIdSet, LookupError> {
        self.run(|| self.inner.memberships(user_id, unit_ids)).await
    }
}
