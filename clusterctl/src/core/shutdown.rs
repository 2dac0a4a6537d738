use tokio::sync::watch;
use tracing::info;

/// Resolves once `true` has been sent on the channel. If the sender is gone
/// without ever signalling, it never resolves and callers run unbounded.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// A shutdown channel flipped by Ctrl-C.
pub fn ctrl_c_shutdown() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping at the next poll");
            let _ = tx.send(true);
        }
        // keep the channel open so receivers do not observe a dropped sender
        tx.closed().await;
    });
    rx
}
