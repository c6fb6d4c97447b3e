//! padbridge: game-controller input mapped onto logical pad slots
//!
//! Backends ([`handler`]) read physical devices and write into shared pad
//! slots owned by [`dispatch::PadDispatch`], which polls every backend from
//! one background thread.

pub mod dispatch;
pub mod handler;

pub use dispatch::{PadDispatch, Providers, SharedPad, TICK_INTERVAL};
pub use handler::{Backend, KeyboardState};
pub use padbridge_pad::{HandlerKind, LogicalPad, PadInfo, PadProfile, PadbridgeConfig, PlayerConfig};
