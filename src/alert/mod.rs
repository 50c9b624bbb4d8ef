//! Alerting on newly parsed errors and warnings.

mod notice;
mod throttle;

pub use notice::{AlertNotice, DEFAULT_BODY_LIMIT};
pub use throttle::{AlertThrottle, LastAlert, SharedThrottle, DEFAULT_COOLDOWN};
