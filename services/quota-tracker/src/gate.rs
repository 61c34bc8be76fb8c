use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::tracker::{QuotaError, QuotaTracker, QuotaUsage};

/// How a gated action is metered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateMode {
    /// Check, act, then record. Concurrent callers for one subject can all
    /// pass the check on the last slot and overshoot the limit.
    CheckThenIncrement,
    /// Claim a slot in one conditional write, act, and give the slot back if
    /// the action fails.
    #[default]
    AtomicClaim,
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateMode::CheckThenIncrement => f.write_str("check_then_increment"),
            GateMode::AtomicClaim => f.write_str("atomic_claim"),
        }
    }
}

impl FromStr for GateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "check_then_increment" | "two_step" => Ok(GateMode::CheckThenIncrement),
            "atomic_claim" | "atomic" => Ok(GateMode::AtomicClaim),
            other => Err(format!("unknown gate mode {other}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum GateError<E> {
    #[error("daily quota exceeded: limit={limit}, used={used}")]
    QuotaExceeded {
        limit: u64,
        used: u64,
        resets_at: DateTime<Utc>,
    },
    #[error("quota bookkeeping failed: {0}")]
    Quota(QuotaError),
    #[error("gated action failed: {0}")]
    Action(E),
}

impl<E> From<QuotaError> for GateError<E> {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::Exceeded {
                limit,
                used,
                resets_at,
                ..
            } => GateError::QuotaExceeded {
                limit,
                used,
                resets_at,
            },
            other => GateError::Quota(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatedOutcome<T> {
    pub output: T,
    pub usage: QuotaUsage,
}

/// Runs rate-limited actions against a [`QuotaTracker`].
#[derive(Clone)]
pub struct QuotaGate {
    tracker: QuotaTracker,
    mode: GateMode,
}

impl QuotaGate {
    pub fn new(tracker: QuotaTracker, mode: GateMode) -> Self {
        Self { tracker, mode }
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn tracker(&self) -> &QuotaTracker {
        &self.tracker
    }

    /// Runs `action` for `subject_id` if the subject has quota left today.
    ///
    /// Only successful actions are counted. The action is never rolled back
    /// when recording its usage fails afterwards.
    pub async fn run<T, E, F, Fut>(
        &self,
        subject_id: &str,
        action: F,
    ) -> Result<GatedOutcome<T>, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.mode {
            GateMode::CheckThenIncrement => self.check_then_increment(subject_id, action).await,
            GateMode::AtomicClaim => self.atomic_claim(subject_id, action).await,
        }
    }

    async fn check_then_increment<T, E, F, Fut>(
        &self,
        subject_id: &str,
        action: F,
    ) -> Result<GatedOutcome<T>, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let status = self.tracker.check_quota(subject_id).await?;
        if !status.allowed {
            debug!(subject_id, used = status.used, "gate denied by quota check");
            return Err(GateError::QuotaExceeded {
                limit: status.limit,
                used: status.used,
                resets_at: self.tracker.resets_at(),
            });
        }

        let output = action().await.map_err(GateError::Action)?;

        let usage = self
            .tracker
            .increment_quota(subject_id)
            .await
            .map_err(|err| {
                warn!(
                    subject_id,
                    error = %err,
                    "gated action succeeded but usage was not recorded"
                );
                GateError::Quota(err)
            })?;

        Ok(GatedOutcome { output, usage })
    }

    async fn atomic_claim<T, E, F, Fut>(
        &self,
        subject_id: &str,
        action: F,
    ) -> Result<GatedOutcome<T>, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let usage = self.tracker.claim_slot(subject_id).await?;

        match action().await {
            Ok(output) => Ok(GatedOutcome { output, usage }),
            Err(err) => {
                if let Err(release_err) = self.tracker.release_slot(subject_id).await {
                    warn!(
                        subject_id,
                        error = %release_err,
                        "failed to release quota slot after action error"
                    );
                }
                Err(GateError::Action(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::storage::InMemoryQuotaStore;

    fn gate(mode: GateMode, limit: u64) -> QuotaGate {
        let tracker = QuotaTracker::new(Arc::new(InMemoryQuotaStore::new()), limit);
        QuotaGate::new(tracker, mode)
    }

    #[tokio::test]
    async fn counts_only_successful_actions() {
        for mode in [GateMode::CheckThenIncrement, GateMode::AtomicClaim] {
            let gate = gate(mode, 3);

            let failed = gate
                .run("u1", || async { Err::<(), _>("upstream unavailable") })
                .await;
            assert!(matches!(failed, Err(GateError::Action("upstream unavailable"))));
            assert_eq!(gate.tracker().get_quota("u1").await.unwrap().used, 0, "{mode}");

            let outcome = gate
                .run("u1", || async { Ok::<_, &str>("answer") })
                .await
                .unwrap();
            assert_eq!(outcome.output, "answer");
            assert_eq!(outcome.usage.used, 1, "{mode}");
            assert_eq!(outcome.usage.remaining, 2, "{mode}");
        }
    }

    #[tokio::test]
    async fn denies_without_running_the_action() {
        for mode in [GateMode::CheckThenIncrement, GateMode::AtomicClaim] {
            let gate = gate(mode, 2);
            let calls = AtomicUsize::new(0);

            for _ in 0..2 {
                gate.run("u1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(())
                })
                .await
                .unwrap();
            }

            let denied = gate
                .run("u1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(())
                })
                .await;

            match denied {
                Err(GateError::QuotaExceeded { limit, used, .. }) => {
                    assert_eq!(limit, 2);
                    assert_eq!(used, 2);
                }
                _ => panic!("expected quota exceeded in {mode}"),
            }
            assert_eq!(calls.load(Ordering::SeqCst), 2, "{mode}");
        }
    }

    #[tokio::test]
    async fn invalid_subject_is_a_quota_error() {
        let gate = gate(GateMode::AtomicClaim, 2);
        let result = gate.run("", || async { Ok::<_, ()>(()) }).await;
        assert!(matches!(
            result,
            Err(GateError::Quota(QuotaError::InvalidSubject(_)))
        ));
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("atomic".parse::<GateMode>().unwrap(), GateMode::AtomicClaim);
        assert_eq!(
            "CHECK_THEN_INCREMENT".parse::<GateMode>().unwrap(),
            GateMode::CheckThenIncrement
        );
        assert!("optimistic".parse::<GateMode>().is_err());
        assert_eq!(GateMode::default(), GateMode::AtomicClaim);
    }
}
