pub mod builders;
pub mod manual_dispatcher;
pub mod recorder;

use std::sync::Once;
use std::thread;
use std::time::{Duration, Instant};

use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{ConcurrencyProbe, Gate, TaskBuilder, node, source};
pub use manual_dispatcher::{MANUAL_MODE, ManualDispatcher, manual_orchestrator};
pub use recorder::Recorder;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=jobflow=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
///
/// Returns whether the condition was met.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Default patience for asynchronous assertions.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);
