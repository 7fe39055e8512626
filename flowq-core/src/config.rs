//! Compile-time tunables for the queue engine and wire layer.
//!
//! These are deliberately constants rather than runtime configuration: the
//! supervisor, the output window and the wire client all size themselves at
//! compile time, and the daemon only takes a data directory and a bind
//! address from its environment.

use std::time::Duration;

/// Size in bytes of a single PTY read. One read becomes at most one output
/// chunk, so this is also the upper bound on chunk length.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Maximum number of chunks retained in the sliding output window of a
/// running task. The oldest chunk is dropped when the window is full.
pub const OUTPUT_WINDOW_CAPACITY: usize = 256;

/// How often a queue's stepper polls the supervisor for termination.
pub const STEP_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on how long `Supervisor::stop` waits for a killed child to
/// disappear before giving up.
pub const STOP_WAIT: Duration = Duration::from_secs(2);

/// Poll interval used inside the bounded stop wait.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Deadline attached to every remote call, including the initial dial.
pub const RPC_DEADLINE: Duration = Duration::from_secs(5);

/// File extension of a queue's backing store inside the data directory.
pub const STORE_EXTENSION: &str = "db";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_holds_at_least_one_read() {
        assert!(OUTPUT_WINDOW_CAPACITY >= 1);
        assert!(READ_BUFFER_SIZE >= 512);
    }

    #[test]
    fn test_stop_wait_covers_multiple_polls() {
        assert!(STOP_WAIT.as_millis() > 10 * STOP_POLL_INTERVAL.as_millis());
    }
}
