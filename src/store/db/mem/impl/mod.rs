mod execution;
mod flow;
mod node_execution;
