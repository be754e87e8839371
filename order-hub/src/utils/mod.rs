pub mod logger;
pub mod retry;
pub mod time;

pub use retry::{RetryPolicy, Transient, with_backoff};
pub use time::{Clock, ManualClock, SharedClock, SystemClock};
