//! A single speaker: last observed state, notifications in, commands out

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use sonos_parser::{decode_last_change_with_base, StateDelta, Track, TransportState};
use url::Url;

use crate::command::{CommandTransport, ControlCommand};
use crate::error::{Result, StateError};
use crate::listeners::{EventKind, Listeners};
use crate::state::PlayerState;

/// Change emitted by a [`Device`] after a notification altered its state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeviceEvent {
    TrackUpdated(Track),
    Playing,
    Stopped,
    Transitioning,
    VolumeChanged(u8),
    Muted,
    Unmuted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEventKind {
    TrackUpdated,
    Playing,
    Stopped,
    Transitioning,
    VolumeChanged,
    Muted,
    Unmuted,
}

impl DeviceEvent {
    pub(crate) fn from_delta(delta: &StateDelta) -> Self {
        match delta {
            StateDelta::TrackChanged(track) => DeviceEvent::TrackUpdated(track.clone()),
            StateDelta::TransportChanged(TransportState::Playing) => DeviceEvent::Playing,
            StateDelta::TransportChanged(TransportState::Stopped) => DeviceEvent::Stopped,
            StateDelta::TransportChanged(TransportState::Transitioning) => {
                DeviceEvent::Transitioning
            }
            StateDelta::VolumeChanged(level) => DeviceEvent::VolumeChanged(*level),
            StateDelta::MuteChanged(true) => DeviceEvent::Muted,
            StateDelta::MuteChanged(false) => DeviceEvent::Unmuted,
        }
    }

    /// The state change this event reports
    pub fn delta(&self) -> StateDelta {
        match self {
            DeviceEvent::TrackUpdated(track) => StateDelta::TrackChanged(track.clone()),
            DeviceEvent::Playing => StateDelta::TransportChanged(TransportState::Playing),
            DeviceEvent::Stopped => StateDelta::TransportChanged(TransportState::Stopped),
            DeviceEvent::Transitioning => {
                StateDelta::TransportChanged(TransportState::Transitioning)
            }
            DeviceEvent::VolumeChanged(level) => StateDelta::VolumeChanged(*level),
            DeviceEvent::Muted => StateDelta::MuteChanged(true),
            DeviceEvent::Unmuted => StateDelta::MuteChanged(false),
        }
    }
}

impl EventKind for DeviceEvent {
    type Kind = DeviceEventKind;

    fn kind(&self) -> DeviceEventKind {
        match self {
            DeviceEvent::TrackUpdated(_) => DeviceEventKind::TrackUpdated,
            DeviceEvent::Playing => DeviceEventKind::Playing,
            DeviceEvent::Stopped => DeviceEventKind::Stopped,
            DeviceEvent::Transitioning => DeviceEventKind::Transitioning,
            DeviceEvent::VolumeChanged(_) => DeviceEventKind::VolumeChanged,
            DeviceEvent::Muted => DeviceEventKind::Muted,
            DeviceEvent::Unmuted => DeviceEventKind::Unmuted,
        }
    }
}

/// One speaker, identified by its network address.
///
/// State only moves when a notification reports a value different from the
/// one stored; commands never touch it, since the speaker reports the outcome
/// through a later notification.
pub struct Device {
    address: String,
    role: String,
    base_url: Option<Url>,
    transport: Arc<dyn CommandTransport>,
    state: Mutex<PlayerState>,
    /// Held across apply and emit so listeners see changes in state order
    emit_order: ReentrantMutex<()>,
    room: Mutex<Option<String>>,
    listeners: Listeners<Device, DeviceEvent>,
}

impl Device {
    /// Create a device reachable on the default control port
    pub fn new(
        address: impl Into<String>,
        role: impl Into<String>,
        transport: Arc<dyn CommandTransport>,
    ) -> Self {
        let address = address.into();
        let base_url = base_url(&address, soap_client::DEFAULT_CONTROL_PORT);
        Self {
            address,
            role: role.into(),
            base_url,
            transport,
            state: Mutex::new(PlayerState::default()),
            emit_order: ReentrantMutex::new(()),
            room: Mutex::new(None),
            listeners: Listeners::new(),
        }
    }

    /// Use a different port for the base URL relative track URIs resolve against
    pub fn with_control_port(mut self, port: u16) -> Self {
        self.base_url = base_url(&self.address, port);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Role segment of the friendly name, usually the model
    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Snapshot of the last observed state
    pub fn state(&self) -> PlayerState {
        self.state.lock().clone()
    }

    /// Name of the room this device joined, if any
    pub fn room_name(&self) -> Option<String> {
        self.room.lock().clone()
    }

    pub fn listeners(&self) -> &Listeners<Device, DeviceEvent> {
        &self.listeners
    }

    /// Decode a LastChange payload and apply it.
    ///
    /// Returns the events that fired. A payload that fails to decode leaves
    /// the state untouched.
    pub fn apply_notification(&self, payload: &str) -> Result<Vec<DeviceEvent>> {
        let deltas = decode_last_change_with_base(payload, self.base_url.as_ref()).map_err(|e| {
            tracing::warn!(device = %self.address, error = %e, "failed to decode notification");
            StateError::Decode(e)
        })?;
        Ok(self.apply_deltas(&deltas))
    }

    /// Apply already decoded deltas, emitting an event for each field that
    /// actually changed.
    pub fn apply_deltas(&self, deltas: &[StateDelta]) -> Vec<DeviceEvent> {
        let _order = self.emit_order.lock();
        let events: Vec<DeviceEvent> = {
            let mut state = self.state.lock();
            deltas
                .iter()
                .filter(|delta| {
                    let changed = state.apply_in_place(delta);
                    if !changed {
                        tracing::debug!(device = %self.address, ?delta, "suppressing repeated value");
                    }
                    changed
                })
                .map(DeviceEvent::from_delta)
                .collect()
        };

        for event in &events {
            self.listeners.emit(self, event);
        }
        events
    }

    pub fn play(&self) -> Result<()> {
        self.send(ControlCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(ControlCommand::Pause)
    }

    /// Set the master volume. Levels above 100 are rejected without a request.
    pub fn set_volume(&self, level: u8) -> Result<()> {
        if level > 100 {
            return Err(StateError::InvalidVolume(level));
        }
        self.send(ControlCommand::SetVolume(level))
    }

    /// Send a command to this device
    pub fn send(&self, command: ControlCommand) -> Result<()> {
        let request = command.request();
        tracing::debug!(device = %self.address, action = request.action, "sending command");

        self.transport
            .send(&self.address, &request)
            .map_err(|source| StateError::Transport {
                device: self.address.clone(),
                source,
            })
    }

    /// Record membership in `room`; a device joins at most one room.
    pub(crate) fn join_room(&self, room: &str) -> Result<()> {
        let mut current = self.room.lock();
        if let Some(existing) = current.as_ref() {
            return Err(StateError::AlreadyInRoom {
                device: self.address.clone(),
                room: existing.clone(),
            });
        }
        *current = Some(room.to_string());
        Ok(())
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("address", &self.address)
            .field("role", &self.role)
            .field("room", &self.room_name())
            .field("state", &self.state())
            .finish()
    }
}

fn base_url(address: &str, port: u16) -> Option<Url> {
    Url::parse(&format!("http://{}:{}/", address, port)).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::command::ControlRequest;
    use soap_client::SoapError;

    /// Records every request and fails for addresses listed in `failing`
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<(String, ControlRequest)>>,
        pub failing: Vec<String>,
    }

    impl CommandTransport for RecordingTransport {
        fn send(&self, address: &str, request: &ControlRequest) -> std::result::Result<(), SoapError> {
            self.sent.lock().push((address.to_string(), request.clone()));
            if self.failing.iter().any(|a| a == address) {
                return Err(SoapError::Network("connection refused".into()));
            }
            Ok(())
        }
    }

    fn event(body: &str) -> String {
        format!(r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"><InstanceID val="0">{}</InstanceID></Event>"#, body)
    }

    fn device() -> (Device, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        (Device::new("192.168.1.20", "ZP120", transport.clone()), transport)
    }

    #[test]
    fn test_repeated_transport_state_fires_once() {
        let (device, _) = device();
        let payload = event(r#"<TransportState val="PLAYING"/>"#);

        assert_eq!(device.apply_notification(&payload).unwrap(), vec![DeviceEvent::Playing]);
        assert!(device.apply_notification(&payload).unwrap().is_empty());
        assert!(device.state().is_playing());
    }

    #[test]
    fn test_pause_and_stop_are_the_same_state() {
        let (device, _) = device();
        let stopped = device
            .apply_notification(&event(r#"<TransportState val="STOPPED"/>"#))
            .unwrap();
        let paused = device
            .apply_notification(&event(r#"<TransportState val="PAUSED_PLAYBACK"/>"#))
            .unwrap();

        assert_eq!(stopped, vec![DeviceEvent::Stopped]);
        assert!(paused.is_empty());
    }

    #[test]
    fn test_unknown_transport_code_keeps_prior_state() {
        let (device, _) = device();
        device
            .apply_notification(&event(r#"<TransportState val="PLAYING"/>"#))
            .unwrap();
        let events = device
            .apply_notification(&event(r#"<TransportState val="NO_MEDIA_PRESENT"/>"#))
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(device.state().transport_state, Some(TransportState::Playing));
    }

    #[test]
    fn test_volume_and_mute_events() {
        let (device, _) = device();
        let events = device
            .apply_notification(&event(
                r#"<Volume channel="Master" val="25"/><Mute channel="Master" val="1"/>"#,
            ))
            .unwrap();
        assert_eq!(events, vec![DeviceEvent::VolumeChanged(25), DeviceEvent::Muted]);

        let events = device
            .apply_notification(&event(
                r#"<Volume channel="Master" val="25"/><Mute channel="Master" val="0"/>"#,
            ))
            .unwrap();
        assert_eq!(events, vec![DeviceEvent::Unmuted]);
    }

    #[test]
    fn test_malformed_payload_applies_nothing() {
        let (device, _) = device();
        let payload = r#"<Event><InstanceID val="0"><TransportState val="PLAYING"/><Volume channel="Master" val="x"/></InstanceID></Event>"#;

        assert!(matches!(
            device.apply_notification(payload),
            Err(StateError::Decode(_))
        ));
        assert_eq!(device.state(), PlayerState::default());
    }

    #[test]
    fn test_listeners_receive_events_by_kind() {
        let (device, _) = device();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        device
            .listeners()
            .subscribe_to(DeviceEventKind::VolumeChanged, move |source: &Device, event| {
                sink.lock().push((source.address().to_string(), event.clone()));
            });

        device
            .apply_notification(&event(
                r#"<TransportState val="PLAYING"/><Volume channel="Master" val="40"/>"#,
            ))
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![("192.168.1.20".to_string(), DeviceEvent::VolumeChanged(40))]
        );
    }

    #[test]
    fn test_listener_can_read_state() {
        let (device, _) = device();
        let observed = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&observed);
        device.listeners().subscribe(move |source: &Device, _| {
            *sink.lock() = source.state().volume;
        });

        device
            .apply_notification(&event(r#"<Volume channel="Master" val="12"/>"#))
            .unwrap();
        assert_eq!(*observed.lock(), Some(12));
    }

    #[test]
    fn test_commands_do_not_change_state() {
        let (device, transport) = device();
        device.play().unwrap();
        device.pause().unwrap();
        device.set_volume(30).unwrap();

        let sent = transport.sent.lock();
        let actions: Vec<&str> = sent.iter().map(|(_, r)| r.action).collect();
        assert_eq!(actions, vec!["Play", "Pause", "SetVolume"]);
        assert!(sent.iter().all(|(addr, _)| addr == "192.168.1.20"));
        assert_eq!(device.state(), PlayerState::default());
    }

    #[test]
    fn test_set_volume_out_of_range() {
        let (device, transport) = device();
        assert!(matches!(
            device.set_volume(101),
            Err(StateError::InvalidVolume(101))
        ));
        assert!(transport.sent.lock().is_empty());
    }

    #[test]
    fn test_transport_failure_surfaces() {
        let transport = Arc::new(RecordingTransport {
            failing: vec!["10.0.0.9".into()],
            ..Default::default()
        });
        let device = Device::new("10.0.0.9", "ZP90", transport);

        match device.play() {
            Err(StateError::Transport { device, source }) => {
                assert_eq!(device, "10.0.0.9");
                assert!(source.is_network());
            }
            other => panic!("Expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_relative_album_art_uses_device_base_url() {
        let (device, _) = device();
        let payload = event(concat!(
            r#"<CurrentTrackMetaData val="&lt;DIDL-Lite&gt;&lt;item id=&quot;-1&quot; parentID=&quot;-1&quot;&gt;"#,
            r#"&lt;upnp:albumArtURI&gt;/getaa?s=1&lt;/upnp:albumArtURI&gt;"#,
            r#"&lt;upnp:class&gt;object.item.audioItem.musicTrack&lt;/upnp:class&gt;"#,
            r#"&lt;dc:title&gt;Song&lt;/dc:title&gt;&lt;/item&gt;&lt;/DIDL-Lite&gt;"/>"#
        ));

        let events = device.apply_notification(&payload).unwrap();
        match events.as_slice() {
            [DeviceEvent::TrackUpdated(track)] => assert_eq!(
                track.album.image_url.as_ref().map(Url::as_str),
                Some("http://192.168.1.20:1400/getaa?s=1")
            ),
            other => panic!("Expected one track event, got {:?}", other),
        }
    }

    #[test]
    fn test_device_joins_one_room_only() {
        let (device, _) = device();
        device.join_room("Kitchen").unwrap();
        assert!(matches!(
            device.join_room("Office"),
            Err(StateError::AlreadyInRoom { room, .. }) if room == "Kitchen"
        ));
        assert_eq!(device.room_name().as_deref(), Some("Kitchen"));
    }
}
