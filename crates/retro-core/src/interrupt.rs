//! Ctrl+C handling for in-flight requests.
//!
//! The handler only flips a flag and wakes waiters. Whoever is waiting on a
//! request decides what to cancel and what to print.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C handler. Call once per process.
pub fn init() -> Result<()> {
    ctrlc::set_handler(trigger).context("Error setting Ctrl+C handler")
}

fn notify_waiters() {
    INTERRUPT_NOTIFY.get_or_init(Notify::new).notify_waiters();
}

/// Records an interrupt. A second one while the first is still pending
/// exits the process.
pub fn trigger() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        std::process::exit(130);
    }
    notify_waiters();
}

/// Checks if an interrupt has been requested.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until an interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        let notify = INTERRUPT_NOTIFY.get_or_init(Notify::new);
        let notified = notify.notified();
        if is_interrupted() {
            return;
        }
        notified.await;
    }
}

/// Resets the interrupt flag.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Returns a token that is cancelled on the next interrupt.
///
/// The watcher task ends when either side fires, so dropping interest in a
/// request means cancelling the token.
pub fn cancellation_token() -> CancellationToken {
    let token = CancellationToken::new();
    let watched = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = wait_for_interrupt() => watched.cancel(),
            () = watched.cancelled() => {}
        }
    });
    token
}
