pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::TrialPhase;
pub use stimulus::Condition;
pub use trial::{Rating, Trial, UNSET, UserResponse};
