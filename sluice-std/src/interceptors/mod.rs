//! Standard interceptors.

mod logging;
mod timeout;

pub use logging::{LoggingAroundInterceptor, LoggingChannelInterceptor};
pub use timeout::{TimeLimitExceeded, TimeLimitInterceptor};
