pub mod time;

use std::sync::Arc;

use tokio::{
    runtime::{Handle, Runtime},
    task::block_in_place,
};

/// Generate a 21 character url-safe id.
pub fn longid() -> String {
    nanoid::nanoid!()
}

/// Generate a random v4 uuid, used for execution ids.
pub fn uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Drive a future to completion on `runtime` from synchronous code.
///
/// Works both outside any runtime and from inside a multi-threaded one.
pub fn block_on<F: Future>(
    runtime: &Arc<Runtime>,
    fut: F,
) -> F::Output {
    if Handle::try_current().is_ok() {
        block_in_place(|| runtime.block_on(fut))
    } else {
        runtime.block_on(fut)
    }
}
