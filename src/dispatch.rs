//! Pad dispatch
//!
//! [`PadDispatch`] owns the backend handlers on a single named polling
//! thread. Consumers read pad snapshots and request rumble through the
//! shared slots; they never touch a device directly.

use std::io;
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use padbridge_hid::{HidApiProvider, HidProvider};
use padbridge_pad::config::{HandlerKind, PadProfile, PadbridgeConfig};
use padbridge_pad::pad::{pad_info, port_status, LogicalPad, PadInfo, MAX_PORTS};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use crate::handler::{Backend, KeyboardState, NullHandler, XInputSource};

/// Delay between two loop iterations
pub const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// One logical pad slot shared between the dispatch thread and consumers
///
/// The pad record is written only by the dispatch thread. Motor requests go
/// the other way through atomics and are latched on the next tick.
#[derive(Debug, Default)]
pub struct SharedPad {
    pad: RwLock<LogicalPad>,
    large_motor: AtomicU8,
    small_motor: AtomicU8,
}

impl SharedPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, LogicalPad> {
        self.pad.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, LogicalPad> {
        self.pad.write()
    }

    pub fn snapshot(&self) -> LogicalPad {
        self.pad.read().clone()
    }

    /// Requested motor speeds as [large, small]
    pub fn motors(&self) -> [u8; 2] {
        [
            self.large_motor.load(Ordering::Relaxed),
            self.small_motor.load(Ordering::Relaxed),
        ]
    }

    pub fn set_motors(&self, large: u8, small: u8) {
        self.large_motor.store(large, Ordering::Relaxed);
        self.small_motor.store(small, Ordering::Relaxed);
    }
}

/// OS capability providers handed to the dispatch thread
///
/// Built on the dispatch thread itself through the factory passed to
/// [`PadDispatch::start`], so providers need not be `Send`.
pub struct Providers {
    pub hid: Option<Box<dyn HidProvider>>,
    pub xinput: Option<Box<dyn XInputSource>>,
    pub keyboard: KeyboardState,
}

impl Providers {
    /// Providers backed by the host OS
    pub fn system(keyboard: KeyboardState) -> Self {
        let hid = match HidApiProvider::new() {
            Ok(provider) => Some(Box::new(provider) as Box<dyn HidProvider>),
            Err(e) => {
                error!("HID API unavailable, DS4 pads disabled: {}", e);
                None
            }
        };
        Self {
            hid,
            xinput: crate::handler::xinput::system_source(),
            keyboard,
        }
    }
}

struct DispatchShared {
    pads: [Arc<SharedPad>; MAX_PORTS],
    shutdown: AtomicBool,
    enabled: AtomicBool,
    intercepted: AtomicBool,
    reset_requested: AtomicBool,
}

/// Handle to the running polling thread
pub struct PadDispatch {
    shared: Arc<DispatchShared>,
    thread: Option<JoinHandle<()>>,
}

impl PadDispatch {
    /// Spawn the polling thread and bind every configured slot
    pub fn start<F>(config: PadbridgeConfig, make_providers: F) -> io::Result<Self>
    where
        F: FnOnce() -> Providers + Send + 'static,
    {
        let shared = Arc::new(DispatchShared {
            pads: std::array::from_fn(|_| Arc::new(SharedPad::new())),
            shutdown: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            intercepted: AtomicBool::new(false),
            reset_requested: AtomicBool::new(false),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("pad-dispatch".into())
            .spawn(move || {
                let providers = make_providers();
                run_dispatch_loop(&thread_shared, &config, providers);
            })?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Shared slot handles, in port order
    pub fn slots(&self) -> &[Arc<SharedPad>; MAX_PORTS] {
        &self.shared.pads
    }

    /// Copy of every slot
    ///
    /// While intercepted the pads read as neutral.
    pub fn get_pads(&self) -> Vec<LogicalPad> {
        let intercepted = self.shared.intercepted.load(Ordering::SeqCst);
        self.shared
            .pads
            .iter()
            .map(|slot| {
                let mut pad = slot.snapshot();
                if intercepted {
                    pad.clear_input();
                }
                pad
            })
            .collect()
    }

    /// Port summary; reading it acknowledges pending assignment changes
    pub fn get_info(&self) -> PadInfo {
        let mut info = PadInfo {
            max_connect: MAX_PORTS as u32,
            ..PadInfo::default()
        };
        if self.shared.intercepted.load(Ordering::SeqCst) {
            info.system_info |= pad_info::INTERCEPTED;
        }
        for (i, slot) in self.shared.pads.iter().enumerate() {
            let mut pad = slot.write();
            info.port_status[i] = pad.port_status;
            info.port_setting[i] = pad.port_setting;
            info.device_capability[i] = pad.device_capability;
            info.device_type[i] = pad.device_type;
            if pad.is_connected() {
                info.now_connect += 1;
            }
            pad.port_status &= !port_status::ASSIGN_CHANGES;
        }
        info
    }

    /// Request motor speeds for a slot; applied on the next tick
    pub fn set_rumble(&self, slot: usize, large: u8, small: bool) {
        match self.shared.pads.get(slot) {
            Some(pad) => pad.set_motors(large, if small { 255 } else { 0 }),
            None => warn!("Rumble request for invalid pad slot {}", slot),
        }
    }

    /// Tear down and rebind every slot from the configuration
    pub fn reset(&self) {
        self.shared.reset_requested.store(true, Ordering::SeqCst);
    }

    /// Pause or resume polling
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// Withhold pad input from consumers without closing any device
    pub fn set_intercepted(&self, intercepted: bool) {
        self.shared.intercepted.store(intercepted, Ordering::SeqCst);
    }

    /// Stop the polling thread and wait for handlers to shut down
    pub fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if let Err(payload) = thread.join() {
                // Protocol invariant violations on the polling thread surface here
                if !std::thread::panicking() {
                    panic::resume_unwind(payload);
                }
            }
        }
    }
}

impl Drop for PadDispatch {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build one handler per backend kind the configuration uses, plus null
fn create_handlers(config: &PadbridgeConfig, mut providers: Providers) -> Vec<Backend> {
    let mut kinds: Vec<HandlerKind> = config.active_players().iter().map(|p| p.handler).collect();
    kinds.sort_by_key(|k| HandlerKind::ALL.iter().position(|a| a == k));
    kinds.dedup();

    let mut handlers = vec![Backend::Null(NullHandler::new())];
    for kind in kinds {
        if kind == HandlerKind::Null {
            continue;
        }
        match Backend::create(kind, &mut providers) {
            Some(backend) => {
                debug!("Created {} handler", kind);
                handlers.push(backend);
            }
            None => error!("{} handler is not available on this system", kind),
        }
    }
    handlers
}

/// Bind every slot to its configured handler, falling back to null
fn bind_all(handlers: &mut [Backend], config: &PadbridgeConfig, pads: &[Arc<SharedPad>]) {
    let players = config.active_players();
    for (slot, pad) in pads.iter().enumerate() {
        let Some(player) = players.get(slot) else {
            bind_null(handlers, pad, "");
            continue;
        };
        let profile = player.effective_profile();
        let bound = handlers
            .iter_mut()
            .find(|h| h.kind() == player.handler)
            .is_some_and(|h| h.bind_pad(pad, &player.device, &profile));
        if bound {
            info!("Pad {} bound to {} device {:?}", slot, player.handler, player.device);
        } else {
            if player.handler != HandlerKind::Null {
                error!(
                    "Failed to bind {} device {:?} to pad {}, using null handler",
                    player.handler, player.device, slot
                );
            }
            bind_null(handlers, pad, &player.device);
        }
    }
}

fn bind_null(handlers: &mut [Backend], pad: &Arc<SharedPad>, device: &str) {
    let profile = PadProfile::for_handler(HandlerKind::Null);
    if let Some(null) = handlers.iter_mut().find(|h| h.kind() == HandlerKind::Null) {
        null.bind_pad(pad, device, &profile);
    }
}

fn shutdown_all(handlers: &mut [Backend], pads: &[Arc<SharedPad>]) {
    for handler in handlers.iter_mut() {
        handler.shutdown();
    }
    for slot in pads {
        let mut pad = slot.write();
        pad.port_status &= !port_status::CONNECTED;
        pad.clear_input();
        slot.set_motors(0, 0);
    }
}

fn run_dispatch_loop(shared: &DispatchShared, config: &PadbridgeConfig, providers: Providers) {
    let mut handlers = create_handlers(config, providers);
    bind_all(&mut handlers, config, &shared.pads);
    info!("Pad dispatch started with {} handlers", handlers.len());

    while !shared.shutdown.load(Ordering::SeqCst) {
        if shared.reset_requested.swap(false, Ordering::SeqCst) {
            info!("Resetting pad bindings");
            shutdown_all(&mut handlers, &shared.pads);
            bind_all(&mut handlers, config, &shared.pads);
        }

        if shared.enabled.load(Ordering::SeqCst) {
            for handler in handlers.iter_mut() {
                handler.tick();
            }
        }

        std::thread::sleep(TICK_INTERVAL);
    }

    shutdown_all(&mut handlers, &shared.pads);
    info!("Pad dispatch stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use padbridge_pad::config::PlayerConfig;
    use std::time::Instant;

    fn no_providers() -> Providers {
        Providers {
            hid: None,
            xinput: None,
            keyboard: KeyboardState::new(),
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_shared_pad_motors() {
        let pad = SharedPad::new();
        assert_eq!(pad.motors(), [0, 0]);
        pad.set_motors(10, 255);
        assert_eq!(pad.motors(), [10, 255]);
    }

    #[test]
    fn test_empty_config_binds_null() {
        let mut dispatch = PadDispatch::start(PadbridgeConfig::default(), no_providers).unwrap();
        assert!(wait_until(|| dispatch.get_pads()[0].buttons.len() == 17));

        let info = dispatch.get_info();
        assert_eq!(info.max_connect, MAX_PORTS as u32);
        assert_eq!(info.now_connect, 0);
        assert!(dispatch.get_pads().iter().all(|p| !p.is_connected()));
        dispatch.stop();
    }

    #[test]
    fn test_missing_provider_falls_back_to_null() {
        let config = PadbridgeConfig {
            players: vec![PlayerConfig::new(HandlerKind::Ds4, "DS4 Pad #1")],
        };
        let mut dispatch = PadDispatch::start(config, no_providers).unwrap();
        assert!(wait_until(|| dispatch.get_pads()[0].buttons.len() == 17));
        assert_eq!(dispatch.get_pads()[0].device_name, "DS4 Pad #1");
        assert!(!dispatch.get_pads()[0].is_connected());
        dispatch.stop();
    }

    #[test]
    fn test_keyboard_pad_connects_and_intercepts() {
        let keys = KeyboardState::new();
        let host_keys = keys.clone();
        let config = PadbridgeConfig {
            players: vec![PlayerConfig::new(HandlerKind::Keyboard, "Keyboard")],
        };
        let dispatch = PadDispatch::start(config, move || Providers {
            hid: None,
            xinput: None,
            keyboard: keys,
        })
        .unwrap();

        assert!(wait_until(|| dispatch.get_pads()[0].is_connected()));
        let info = dispatch.get_info();
        assert_eq!(info.now_connect, 1);
        assert_ne!(info.port_status[0] & port_status::ASSIGN_CHANGES, 0);
        // acknowledged by the first read
        assert_eq!(dispatch.get_info().port_status[0] & port_status::ASSIGN_CHANGES, 0);

        host_keys.press("X");
        assert!(wait_until(|| dispatch.get_pads()[0].buttons.iter().any(|b| b.pressed)));

        dispatch.set_intercepted(true);
        assert_ne!(dispatch.get_info().system_info & pad_info::INTERCEPTED, 0);
        assert!(dispatch.get_pads()[0].buttons.iter().all(|b| !b.pressed));
        dispatch.set_intercepted(false);
        assert!(dispatch.get_pads()[0].buttons.iter().any(|b| b.pressed));
    }

    #[test]
    fn test_set_rumble_invalid_slot_is_ignored() {
        let dispatch = PadDispatch::start(PadbridgeConfig::default(), no_providers).unwrap();
        dispatch.set_rumble(MAX_PORTS, 10, true);
        dispatch.set_rumble(0, 10, true);
        assert_eq!(dispatch.slots()[0].motors(), [10, 255]);
    }

    #[test]
    fn test_stop_disconnects_pads() {
        let keys = KeyboardState::new();
        let config = PadbridgeConfig {
            players: vec![PlayerConfig::new(HandlerKind::Keyboard, "Keyboard")],
        };
        let mut dispatch = PadDispatch::start(config, move || Providers {
            hid: None,
            xinput: None,
            keyboard: keys,
        })
        .unwrap();
        assert!(wait_until(|| dispatch.get_pads()[0].is_connected()));
        dispatch.stop();
        assert!(!dispatch.get_pads()[0].is_connected());
    }
}
