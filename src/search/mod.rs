//! Query preprocessing and rank fusion for the search path.

pub mod fusion;
pub mod query;
