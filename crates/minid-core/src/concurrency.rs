//! Process-wide interrupt flag for long batch runs.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install a Ctrl-C handler that requests a clean stop; a second Ctrl-C
/// exits immediately.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if INTERRUPTED.load(Ordering::SeqCst) {
            std::process::exit(1);
        }
        INTERRUPTED.store(true, Ordering::SeqCst);
        eprintln!("\ninterrupt requested, finishing current entry...");
    });
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub fn request_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

pub fn reset_interrupt() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
