//! Process-wide shutdown state.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{Receiver, Sender, bounded};

/// Ctrl+C received.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// Install the Ctrl+C handler. Call once at program start.
///
/// The returned receiver fires once when shutdown is requested; the dev
/// coordinator selects on it to close the render pool.
pub fn setup_shutdown_handler() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    let _ = SHUTDOWN_TX.set(tx);
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
        if let Some(tx) = SHUTDOWN_TX.get() {
            let _ = tx.try_send(());
        }
    })?;
    Ok(rx)
}

pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}
