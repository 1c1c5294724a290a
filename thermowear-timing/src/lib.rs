pub mod countdown;
pub mod timer;

pub use countdown::Countdown;
pub use timer::{epoch_seconds, Clock, MonotonicClock};
