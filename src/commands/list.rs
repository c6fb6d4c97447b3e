//! Device listing

use serde::Serialize;

use padbridge::{Backend, HandlerKind, KeyboardState, Providers};

use super::CommandResult;

#[derive(Serialize)]
struct BackendDevices {
    handler: HandlerKind,
    available: bool,
    devices: Vec<String>,
}

/// List the devices every backend can currently bind
pub fn list(json: bool) -> CommandResult {
    let mut providers = Providers::system(KeyboardState::new());
    let mut listing = Vec::with_capacity(HandlerKind::ALL.len());

    for kind in HandlerKind::ALL {
        let entry = match Backend::create(kind, &mut providers) {
            Some(mut backend) => {
                let devices = backend.list_devices();
                backend.shutdown();
                BackendDevices {
                    handler: kind,
                    available: true,
                    devices,
                }
            }
            None => BackendDevices {
                handler: kind,
                available: false,
                devices: Vec::new(),
            },
        };
        listing.push(entry);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for entry in &listing {
        if !entry.available {
            println!("{}: not available", entry.handler);
            continue;
        }
        println!("{}:", entry.handler);
        if entry.devices.is_empty() {
            println!("  (no devices)");
        }
        for device in &entry.devices {
            println!("  {device}");
        }
    }
    Ok(())
}
