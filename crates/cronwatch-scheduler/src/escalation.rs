//! Failure escalation: decides when a failing job deserves an alert.
//!
//! A stateless decision over explicit counters and timestamps. The caller
//! records `last_failure_notification_at_ms = now_ms` exactly when an alert is
//! emitted.

/// Consecutive failures that trigger the first alert. Not configurable.
pub const FAILURE_ALERT_THRESHOLD: u32 = 3;

/// Minimum spacing between two alerts for the same job (one hour).
pub const DEFAULT_FAILURE_ALERT_THROTTLE_MS: i64 = 3_600_000;

/// Throttle window for failure alerts past [`FAILURE_ALERT_THRESHOLD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub throttle_ms: i64,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_FAILURE_ALERT_THROTTLE_MS,
        }
    }
}

/// Inputs for one decision.
#[derive(Debug, Clone, Copy)]
pub struct EscalationInput<'a> {
    pub job_name: &'a str,
    pub previous_failures: u32,
    pub consecutive_failures: u32,
    pub last_notification_at_ms: Option<i64>,
    pub last_error: &'a str,
    pub now_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationDecision {
    Suppress,
    Alert { message: String },
}

impl EscalationDecision {
    pub fn should_alert(&self) -> bool {
        matches!(self, EscalationDecision::Alert { .. })
    }
}

impl EscalationPolicy {
    pub fn new(throttle_ms: i64) -> Self {
        Self { throttle_ms }
    }

    pub fn threshold(&self) -> u32 {
        FAILURE_ALERT_THRESHOLD
    }

    pub fn evaluate(&self, input: EscalationInput<'_>) -> EscalationDecision {
        let threshold = self.threshold();
        if input.consecutive_failures < threshold {
            return EscalationDecision::Suppress;
        }

        let crossed = input.previous_failures < threshold;
        let window_elapsed = match input.last_notification_at_ms {
            // Over the threshold without a recorded alert: nothing to throttle against.
            None => true,
            Some(last) => input.now_ms.saturating_sub(last) >= self.throttle_ms,
        };

        if crossed || window_elapsed {
            EscalationDecision::Alert {
                message: alert_message(
                    input.job_name,
                    input.consecutive_failures,
                    input.last_error,
                ),
            }
        } else {
            EscalationDecision::Suppress
        }
    }
}

/// Render the user-visible alert text.
pub fn alert_message(job_name: &str, consecutive_failures: u32, last_error: &str) -> String {
    format!(
        "Alert: Cron job \"{}\" failed {} times in a row. Last error: {}",
        job_name, consecutive_failures, last_error
    )
}

#[cfg(test)]
#[path = "escalation_tests.rs"]
mod tests;
