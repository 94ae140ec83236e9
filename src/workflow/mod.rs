pub mod actions;
pub mod condition;
pub mod edge;
pub mod node;
pub mod template;
mod workflow;

pub use workflow::{Readiness, Workflow};
