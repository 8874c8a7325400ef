use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};

use trident_core::config::RetryConfig;
use trident_core::error::ErrorKind;

use crate::error::ChainError;

/// Run a transport call with per-attempt timeout and capped
/// exponential backoff plus jitter.
///
/// Only transport failures retry. A protocol answer (validation,
/// state conflict, bad proof, timing) returns immediately: retrying
/// it would just replay the same rejection.
pub async fn retry_transport<T, F, Fut>(
    label: &'static str,
    config: &RetryConfig,
    mut action: F,
) -> Result<T, ChainError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ChainError>>,
{
    let attempts = config.max_attempts.max(1);
    let attempt_timeout = Duration::from_millis(config.attempt_timeout_ms);

    for attempt in 1..=attempts {
        match timeout(attempt_timeout, action()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if err.kind() != ErrorKind::Transport => return Err(err),
            Ok(Err(err)) => {
                if attempt == attempts {
                    return Err(err);
                }
                tracing::warn!(attempt, error = %err, "transport error on {label}; retrying");
            }
            Err(_) => {
                if attempt == attempts {
                    return Err(ChainError::Transport(format!("{label} timed out")));
                }
                tracing::warn!(attempt, "timeout on {label}; retrying");
            }
        }

        let backoff = config
            .base_delay_ms
            .saturating_mul(1u64 << (attempt - 1).min(16));
        let capped = backoff.min(config.max_delay_ms);
        let jitter = if config.base_delay_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=config.base_delay_ms)
        };
        sleep(Duration::from_millis(capped + jitter)).await;
    }

    Err(ChainError::Transport(format!("{label} retries exhausted")))
}
