//! Time-limited invocation.
//!
//! **Note**: This interceptor requires the `tokio` runtime.

use sluice_core::{
    AroundInterceptor, ConfigurationError, MessagingError, MethodInvocation, Payload,
};
use std::time::Duration;
use thiserror::Error;

/// Error returned when an invocation exceeds its time limit.
#[derive(Error, Debug, Clone, Copy)]
#[error("invocation timed out after {0:?}")]
pub struct TimeLimitExceeded(pub Duration);

/// An around-interceptor that aborts the rest of the chain once it runs
/// longer than a fixed limit.
///
/// # Example
///
/// ```rust,ignore
/// let limit = TimeLimitInterceptor::millis(500)?;
/// builder.add_around_interceptor(Arc::new(limit));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TimeLimitInterceptor {
    limit: Duration,
}

impl TimeLimitInterceptor {
    /// Create an interceptor with the given limit.
    pub const fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// Create an interceptor with the limit in milliseconds, which must be
    /// positive.
    pub fn millis(millis: i64) -> Result<Self, ConfigurationError> {
        if millis <= 0 {
            return Err(ConfigurationError::NotPositive {
                name: "time limit",
                value: millis,
            });
        }
        Ok(Self::new(Duration::from_millis(millis.unsigned_abs())))
    }

    /// The configured limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl AroundInterceptor for TimeLimitInterceptor {
    async fn around(&self, invocation: MethodInvocation) -> Result<Option<Payload>, MessagingError> {
        let target = invocation.interface().to_string();
        match tokio::time::timeout(self.limit, invocation.proceed()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(target_method = %target, limit_ms = self.limit.as_millis() as u64, "time limit exceeded");
                Err(MessagingError::Custom(Box::new(TimeLimitExceeded(self.limit))))
            }
        }
    }
}
