//! Result reporting
//!
//! Console text for people, JSON for scripts.

pub mod json;
pub mod text;
