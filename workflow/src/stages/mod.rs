//! Stage sub-workflows: each drives one stage's activities in order and
//! returns the summary persisted on the stage marker.

pub mod enriched;
pub mod extracted;
pub mod processed;
pub mod summarized;
