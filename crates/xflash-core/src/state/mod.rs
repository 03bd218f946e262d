//! State module.

pub mod machine;

pub use machine::{StateError, StateMachine};
