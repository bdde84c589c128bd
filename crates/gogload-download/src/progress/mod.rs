//! Progress measurement and throttling.

mod speed;
mod throttle;

pub use speed::SpeedMeter;
pub use throttle::ProgressThrottle;
