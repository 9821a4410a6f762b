//! Zones: a named group of devices controlled and observed as one

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use sonos_parser::{StateDelta, Track, TransportState};

use crate::device::{Device, DeviceEvent};
use crate::error::{Result, StateError};
use crate::listeners::{EventKind, Listeners};
use crate::state::PlayerState;

/// Change emitted by a [`Room`]
#[derive(Debug, Clone)]
pub enum RoomEvent {
    DeviceAdded(Arc<Device>),
    TrackUpdated(Track),
    Playing,
    Stopped,
    Transitioning,
    VolumeChanged(u8),
    Muted,
    Unmuted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomEventKind {
    DeviceAdded,
    TrackUpdated,
    Playing,
    Stopped,
    Transitioning,
    VolumeChanged,
    Muted,
    Unmuted,
}

impl RoomEvent {
    fn from_delta(delta: &StateDelta) -> Self {
        match delta {
            StateDelta::TrackChanged(track) => RoomEvent::TrackUpdated(track.clone()),
            StateDelta::TransportChanged(TransportState::Playing) => RoomEvent::Playing,
            StateDelta::TransportChanged(TransportState::Stopped) => RoomEvent::Stopped,
            StateDelta::TransportChanged(TransportState::Transitioning) => RoomEvent::Transitioning,
            StateDelta::VolumeChanged(level) => RoomEvent::VolumeChanged(*level),
            StateDelta::MuteChanged(true) => RoomEvent::Muted,
            StateDelta::MuteChanged(false) => RoomEvent::Unmuted,
        }
    }
}

impl PartialEq for RoomEvent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RoomEvent::DeviceAdded(a), RoomEvent::DeviceAdded(b)) => Arc::ptr_eq(a, b),
            (RoomEvent::TrackUpdated(a), RoomEvent::TrackUpdated(b)) => a == b,
            (RoomEvent::VolumeChanged(a), RoomEvent::VolumeChanged(b)) => a == b,
            _ => self.kind() == other.kind(),
        }
    }
}

impl EventKind for RoomEvent {
    type Kind = RoomEventKind;

    fn kind(&self) -> RoomEventKind {
        match self {
            RoomEvent::DeviceAdded(_) => RoomEventKind::DeviceAdded,
            RoomEvent::TrackUpdated(_) => RoomEventKind::TrackUpdated,
            RoomEvent::Playing => RoomEventKind::Playing,
            RoomEvent::Stopped => RoomEventKind::Stopped,
            RoomEvent::Transitioning => RoomEventKind::Transitioning,
            RoomEvent::VolumeChanged(_) => RoomEventKind::VolumeChanged,
            RoomEvent::Muted => RoomEventKind::Muted,
            RoomEvent::Unmuted => RoomEventKind::Unmuted,
        }
    }
}

/// A zone of one or more devices.
///
/// Member events are folded into a single zone state. A zone event fires only
/// when the value differs from the zone's current one, whichever member
/// reported it, so a stereo pair reporting "playing" twice produces one
/// `Playing`.
pub struct Room {
    name: String,
    this: Weak<Room>,
    members: RwLock<Vec<Arc<Device>>>,
    state: Mutex<PlayerState>,
    emit_order: ReentrantMutex<()>,
    listeners: Listeners<Room, RoomEvent>,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| Room {
            name,
            this: this.clone(),
            members: RwLock::new(Vec::new()),
            state: Mutex::new(PlayerState::default()),
            emit_order: ReentrantMutex::new(()),
            listeners: Listeners::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in join order
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.members.read().clone()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Snapshot of the aggregated zone state
    pub fn state(&self) -> PlayerState {
        self.state.lock().clone()
    }

    pub fn listeners(&self) -> &Listeners<Room, RoomEvent> {
        &self.listeners
    }

    /// Attach a device and start folding its events into the zone state.
    ///
    /// Fails if the device already belongs to a room.
    pub fn add_device(&self, device: Arc<Device>) -> Result<()> {
        device.join_room(&self.name)?;

        let room = self.this.clone();
        device.listeners().subscribe(move |_, event: &DeviceEvent| {
            if let Some(room) = room.upgrade() {
                room.apply_member_event(event);
            }
        });

        self.members.write().push(Arc::clone(&device));
        tracing::debug!(room = %self.name, device = %device.address(), "device joined room");

        self.listeners.emit(self, &RoomEvent::DeviceAdded(device));
        Ok(())
    }

    pub fn play(&self) -> Result<()> {
        self.fan_out("play", |device| device.play())
    }

    pub fn pause(&self) -> Result<()> {
        self.fan_out("pause", |device| device.pause())
    }

    /// Set every member's volume. Levels above 100 are rejected before any
    /// member is contacted.
    pub fn set_volume(&self, level: u8) -> Result<()> {
        if level > 100 {
            return Err(StateError::InvalidVolume(level));
        }
        self.fan_out("set_volume", |device| device.set_volume(level))
    }

    /// Fold one member event into the zone state, emitting the zone event if
    /// the zone value changed. Members may report from different threads;
    /// zone events still go out in the order the zone state moved.
    fn apply_member_event(&self, event: &DeviceEvent) {
        let _order = self.emit_order.lock();
        let delta = event.delta();
        let changed = self.state.lock().apply_in_place(&delta);
        if !changed {
            tracing::debug!(room = %self.name, ?event, "zone already in this state");
            return;
        }
        self.listeners.emit(self, &RoomEvent::from_delta(&delta));
    }

    /// Run `op` on every member in join order. A failing member does not stop
    /// the remaining ones; failures are returned together.
    fn fan_out<F>(&self, command: &str, op: F) -> Result<()>
    where
        F: Fn(&Device) -> Result<()>,
    {
        let members = self.devices();
        let mut failures = Vec::new();

        for device in &members {
            if let Err(e) = op(device.as_ref()) {
                tracing::warn!(room = %self.name, device = %device.address(), command, error = %e, "member command failed");
                failures.push(e);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StateError::FanOut {
                room: self.name.clone(),
                attempted: members.len(),
                failures,
            })
        }
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses: Vec<String> = self
            .devices()
            .iter()
            .map(|d| d.address().to_string())
            .collect();
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("devices", &addresses)
            .field("state", &self.state())
            .finish()
    }
}
