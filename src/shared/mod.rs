//! Cross-cutting pieces: configuration and the retry / rate-limit policies.

pub mod config;
pub mod rate_limit;
pub mod retry;

pub use self::config::{AppConfig, ChatSettings};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
