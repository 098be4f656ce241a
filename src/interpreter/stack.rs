//! Every run gets a thread whose stack is sized from the call depth limit,
//! so deep recursion halts with HND-RT-0701 instead of overflowing the host.

use super::{RunResult, RuntimeError};
use crate::span::Origin;

use tracing::{debug, warn};

use std::panic;
use std::thread;

/// Reserved per allowed call. Covers the deepest call path of an
/// unoptimised build with room to spare.
const STACK_PER_CALL: usize = 256 * 1024;
/// Reserved for everything that is not a nested call.
const BASE_STACK: usize = 8 * 1024 * 1024;
const MAX_STACK: usize = 1024 * 1024 * 1024;

/// Bytes of stack a run with `max_call_depth` is given.
pub fn stack_size(max_call_depth: usize) -> usize {
    max_call_depth
        .saturating_mul(STACK_PER_CALL)
        .saturating_add(BASE_STACK)
        .min(MAX_STACK)
}

/// Performs `run` on a dedicated thread and waits for it.
pub fn on_run_stack(max_call_depth: usize, run: impl FnOnce() -> RunResult + Send) -> RunResult {
    let bytes = stack_size(max_call_depth);
    thread::scope(|scope| {
        let spawned = thread::Builder::new()
            .name("hand-run".to_string())
            .stack_size(bytes)
            .spawn_scoped(scope, run);
        match spawned {
            Ok(handle) => {
                debug!(bytes, "run thread started");
                handle
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload))
            }
            Err(error) => {
                warn!(%error, bytes, "failed to spawn run thread");
                RunResult::unstarted(RuntimeError::Stack(error.to_string()))
            }
        }
    })
}

impl RunResult {
    /// A run that halted before its first statement.
    pub fn unstarted(error: RuntimeError) -> RunResult {
        RunResult {
            outputs: vec![],
            store: Default::default(),
            trace: vec![],
            diagnostics: vec![error.to_diagnostic(Origin::default())],
            completed: false,
        }
    }
}
