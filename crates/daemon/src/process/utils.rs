use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// In-flight pin requests get this long to finish after SIGTERM
const REQUEST_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Spawns a task that resolves on SIGINT, SIGTERM or a programmatic
///  shutdown, then notifies every receiver of the returned watch.
///
/// Returns the join handle, the sender (for programmatic shutdown), and the receiver.
pub fn graceful_shutdown_blocker() -> (JoinHandle<()>, watch::Sender<()>, watch::Receiver<()>) {
    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();
    let mut programmatic = rx.clone();

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {}
            _ = programmatic.changed() => {
                tracing::debug!("shutdown requested programmatically");
            }
        }

        let _ = signal_tx.send(());
    });

    (handle, tx, rx)
}

async fn wait_for_signal() {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "failed to install signal handlers, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {
            tracing::debug!("gracefully exiting immediately on SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::debug!("SIGTERM received, shutting down after the request grace period");
            tokio::time::sleep(REQUEST_GRACE_PERIOD).await;
        }
    }
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    let build = common::prelude::build_info();

    tracing::info!(
        version = %build.version,
        package_version = %build.package_version,
        build_profile = %build.build_profile,
        features = %build.build_features,
        target = %build.build_target,
        "pinsvc starting up"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_programmatic_shutdown_releases_waiter() {
        let (waiter, tx, mut rx) = graceful_shutdown_blocker();
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(rx.has_changed().unwrap());
    }
}
