use crate::completion::CompletionConfig;
use crate::error::{Result, StageError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff for transient stage errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per stage, the first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failed_attempt`-th attempt (1-based): `base · 2^(n-1)`, capped.
    #[must_use]
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(20);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hard bound on stage attempts per task, retries included
    pub max_steps: usize,
    pub stage_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Hypotheses handed to the executor and kept in the final report
    pub top_hypotheses: usize,
    pub completion: CompletionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_steps: 12,
            stage_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
            top_hypotheses: 3,
            completion: CompletionConfig::default(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    /// Longest a single stage can hold the task: every attempt hitting the timeout, plus
    /// the backoff between attempts.
    #[must_use]
    pub fn worst_case_stage_duration(&self) -> Duration {
        let retry = &self.retry;
        let running = self
            .stage_timeout_ms
            .saturating_mul(u64::from(retry.max_attempts));
        let mut backoff = 0u64;
        for failed in 1..retry.max_attempts {
            let delay = u64::try_from(retry.delay_for(failed).as_millis()).unwrap_or(u64::MAX);
            if delay >= retry.max_delay_ms {
                let remaining = u64::from(retry.max_attempts - failed);
                backoff = backoff.saturating_add(delay.saturating_mul(remaining));
                break;
            }
            backoff = backoff.saturating_add(delay);
        }
        Duration::from_millis(running.saturating_add(backoff))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps < 4 {
            return Err(StageError::InvalidConfig(format!(
                "pipeline.max_steps must be >= 4 (one per stage), got {}",
                self.max_steps
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(StageError::InvalidConfig(
                "pipeline.retry.max_attempts must be > 0".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(StageError::InvalidConfig(
                "pipeline.retry.base_delay_ms cannot exceed max_delay_ms".to_string(),
            ));
        }
        if self.stage_timeout_ms == 0 {
            return Err(StageError::InvalidConfig(
                "pipeline.stage_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.top_hypotheses == 0 {
            return Err(StageError::InvalidConfig(
                "pipeline.top_hypotheses must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for(3), Duration::from_millis(800));
        assert_eq!(retry.delay_for(10), Duration::from_millis(5_000));
        assert_eq!(retry.delay_for(u32::MAX), Duration::from_millis(5_000));
    }

    #[test]
    fn worst_case_stage_covers_every_attempt_and_backoff() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.worst_case_stage_duration(), Duration::from_millis(90_600));

        let capped = PipelineConfig {
            stage_timeout_ms: 1_000,
            retry: RetryPolicy {
                max_attempts: 5,
                base_delay_ms: 300,
                max_delay_ms: 1_000,
            },
            ..PipelineConfig::default()
        };
        // 5 x 1000 + 300 + 600 + 1000 + 1000
        assert_eq!(capped.worst_case_stage_duration(), Duration::from_millis(7_900));
    }

    #[test]
    fn step_budget_must_cover_every_stage() {
        let cfg = PipelineConfig {
            max_steps: 3,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let cfg: PipelineConfig = toml::from_str("[retry]\nmax_attempts = 0").unwrap();
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.max_steps, 12);
    }
}
