//! Cooperative shutdown signal (spec §5: "on a termination signal, a
//! component stops accepting new work, drains in-flight tasks within a
//! grace window (default 15s), then exits").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

pub const GRACE_WINDOW: Duration = Duration::from_secs(15);

/// Spawns a task that flips the returned flag on SIGINT/ctrl-c. Every
/// component's main loop polls this flag between work items instead of
/// being cancelled mid-operation. A second task enforces `GRACE_WINDOW`
/// as a real deadline: if the main loop hasn't let the process exit on
/// its own by then (a blocked stream read, a hung IPC write), this
/// force-exits rather than hanging forever (spec §5 "...then exits").
pub fn install() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let task_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, draining in-flight work");
            task_flag.store(true, Ordering::Relaxed);
            tokio::time::sleep(GRACE_WINDOW).await;
            warn!(
                grace_window_secs = GRACE_WINDOW.as_secs(),
                "grace window elapsed without a clean exit, forcing shutdown"
            );
            std::process::exit(0);
        }
    });
    flag
}

pub fn is_set(flag: &Arc<AtomicBool>) -> bool {
    flag.load(Ordering::Relaxed)
}
