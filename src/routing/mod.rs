pub mod matcher;

pub use matcher::{Matcher, Params, PatternError, Segment, CATCH_ALL};
