pub mod decision;
pub mod submission;

pub use decision::{Decision, DecisionRecord};
pub use submission::{FieldMap, MalformedEvent, Submission};
