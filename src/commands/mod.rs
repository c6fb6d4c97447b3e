//! Command handlers for the CLI application.
//!
//! - `list`: enumerate bindable devices per backend
//! - `run`: poll configured pads until Ctrl+C
//! - `rumble`: drive one slot's motors for a short time
//! - `config`: print or save the effective configuration

pub mod config;
pub mod list;
pub mod rumble;
pub mod run;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Flag cleared by Ctrl+C
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    if let Err(e) = ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    running
}
