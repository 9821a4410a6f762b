//! Sonos State
//!
//! Device, room and controller state for a Sonos UPnP control client.
//!
//! # Architecture
//!
//! ```text
//! DiscoveryTransport → Controller → Room ← Device ← LastChange notifications
//!                                    │        │
//!                                    └────────┴──→ CommandTransport (SOAP)
//! ```
//!
//! - A [`Device`] decodes notifications into typed deltas and emits an event
//!   for every field that actually changed.
//! - A [`Room`] folds its members' events into one zone state with the same
//!   rule, and fans commands out to every member.
//! - The [`Controller`] turns discovery announcements into devices, groups
//!   them into rooms by friendly name, and routes notifications.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sonos_state::{Controller, ControllerConfig, ControllerEvent};
//! use soap_client::SoapClient;
//!
//! let controller = Controller::new(ControllerConfig::default().with_env_overrides(), Arc::new(SoapClient::new()))
//!     .with_discovery(Box::new(my_discovery));
//!
//! controller.listeners().subscribe(|_, event| {
//!     if let ControllerEvent::RoomFound(room) = event {
//!         room.listeners().subscribe(|room, event| println!("{}: {:?}", room.name(), event));
//!     }
//! });
//!
//! let report = controller.index_rooms()?;
//! controller.room("Kitchen").map(|room| room.play());
//! ```

pub mod command;
pub mod config;
pub mod controller;
pub mod device;
pub mod discovery;
pub mod error;
pub mod listeners;
pub mod logging;
pub mod naming;
pub mod room;
pub mod state;

pub use command::{CommandTransport, ControlCommand, ControlRequest, Service, ServiceInfo};
pub use config::ControllerConfig;
pub use controller::{Controller, ControllerEvent, ControllerEventKind, IndexReport};
pub use device::{Device, DeviceEvent, DeviceEventKind};
pub use discovery::{
    DiscoveryEvent, DiscoverySession, DiscoveryTransport, SearchState, ServiceAnnouncement,
    ServiceId,
};
pub use error::{Result, StateError};
pub use listeners::{EventKind, ListenerId, Listeners};
pub use logging::{init_logging, init_logging_from_env, LoggingMode};
pub use naming::{address_from_descriptor_url, parse_friendly_name, DeviceName};
pub use room::{Room, RoomEvent, RoomEventKind};
pub use state::PlayerState;

// Decoded types that appear in events and state
pub use sonos_parser::{Album, StateDelta, Track, TransportState};
