//! The unit of work: a single child-process invocation.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single child-process invocation owned by exactly one queue state
/// (pending, running or finished).
///
/// The ID is assigned at enqueue time, is unique within its queue and is
/// preserved verbatim through running and finished. `exit_code` and
/// `is_success` are only meaningful once the task has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Monotonically assigned within the owning queue; never reused.
    pub id: i32,
    /// Path of the executable to run.
    pub exec_name: String,
    /// Ordered argument list, not including the executable name itself.
    pub args: Vec<String>,
    /// Working directory the child changes into before exec.
    pub work_dir: String,
    /// Latched exit code once finished. A signalled exit surfaces
    /// `128 + signo`.
    pub exit_code: i32,
    /// True iff the process terminated normally with exit code 0.
    pub is_success: bool,
}

impl Task {
    /// Build a task ready for enqueueing; the queue assigns the ID.
    pub fn new(exec_name: impl Into<String>, args: Vec<String>, work_dir: impl Into<String>) -> Self {
        Self {
            id: 0,
            exec_name: exec_name.into(),
            args,
            work_dir: work_dir.into(),
            exit_code: 0,
            is_success: false,
        }
    }

    /// Serialise the argument list for the backing store.
    ///
    /// A JSON array preserves order and empty-string elements, which a
    /// naive delimiter join would not.
    pub(crate) fn encode_args(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.args)?)
    }

    /// Inverse of [`encode_args`](Self::encode_args).
    pub(crate) fn decode_args(raw: &str) -> Result<Vec<String>> {
        Ok(serde_json::from_str(raw)?)
    }
}
