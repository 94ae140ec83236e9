//! Graph scheduling and single node execution.

mod dispatcher;
mod runner;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use runner::{NodeOutcome, NodeRunner};
