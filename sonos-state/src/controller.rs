//! Room indexing: turns discovery events into devices and rooms

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::command::CommandTransport;
use crate::config::ControllerConfig;
use crate::device::Device;
use crate::discovery::{
    DiscoveryEvent, DiscoverySession, DiscoveryTransport, SearchState, ServiceAnnouncement,
    ServiceId,
};
use crate::error::{Result, StateError};
use crate::listeners::{EventKind, Listeners};
use crate::naming::{address_from_descriptor_url, parse_friendly_name};
use crate::room::Room;

/// Change emitted by the [`Controller`]
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    IndexingStarted,
    IndexingEnded,
    /// A room was created for the first device announcing its name
    RoomFound(Arc<Room>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerEventKind {
    IndexingStarted,
    IndexingEnded,
    RoomFound,
}

impl EventKind for ControllerEvent {
    type Kind = ControllerEventKind;

    fn kind(&self) -> ControllerEventKind {
        match self {
            ControllerEvent::IndexingStarted => ControllerEventKind::IndexingStarted,
            ControllerEvent::IndexingEnded => ControllerEventKind::IndexingEnded,
            ControllerEvent::RoomFound(_) => ControllerEventKind::RoomFound,
        }
    }
}

/// Summary of one [`Controller::index_rooms`] run
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Names of rooms created during the run, in discovery order
    pub rooms_found: Vec<String>,
    pub devices_added: usize,
    /// Per-event failures; none of them stopped the run
    pub errors: Vec<StateError>,
}

/// What handling one discovery event amounted to
#[derive(Debug)]
enum Handled {
    Ignored,
    Lifecycle,
    DeviceAdded { room: Arc<Room>, created: bool },
    Notified,
}

/// Consumes discovery events, creates devices and rooms, and routes
/// notifications to the device they belong to.
pub struct Controller {
    config: ControllerConfig,
    commands: Arc<dyn CommandTransport>,
    session: Mutex<Option<DiscoverySession>>,
    search: RwLock<SearchState>,
    indexing: AtomicBool,
    rooms: RwLock<Vec<Arc<Room>>>,
    devices: RwLock<HashMap<String, Arc<Device>>>,
    subscriptions: RwLock<HashSet<ServiceId>>,
    listeners: Listeners<Controller, ControllerEvent>,
}

impl Controller {
    /// Create a controller without a discovery session. Events can still be
    /// fed through [`handle`](Self::handle).
    pub fn new(config: ControllerConfig, commands: Arc<dyn CommandTransport>) -> Self {
        Self {
            config,
            commands,
            session: Mutex::new(None),
            search: RwLock::new(SearchState::Idle),
            indexing: AtomicBool::new(false),
            rooms: RwLock::new(Vec::new()),
            devices: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashSet::new()),
            listeners: Listeners::new(),
        }
    }

    /// Attach the discovery transport used by [`index_rooms`](Self::index_rooms)
    pub fn with_discovery(self, transport: Box<dyn DiscoveryTransport>) -> Self {
        *self.session.lock() = Some(DiscoverySession::new(transport));
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn listeners(&self) -> &Listeners<Controller, ControllerEvent> {
        &self.listeners
    }

    /// Search lifecycle of the discovery session; `Idle` without one
    pub fn search_state(&self) -> SearchState {
        *self.search.read()
    }

    /// Rooms in the order they were found
    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.read().clone()
    }

    pub fn room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.read().iter().find(|r| r.name() == name).cloned()
    }

    pub fn device(&self, address: &str) -> Option<Arc<Device>> {
        self.devices.read().get(address).cloned()
    }

    /// Run one search window.
    ///
    /// Activates discovery, handles events until the configured window
    /// elapses or the transport has nothing more to deliver, deactivates
    /// discovery and handles whatever the transport still reports. Failures
    /// of single events are collected in the report.
    ///
    /// Only one run can be active at a time; listeners are invoked with no
    /// controller lock held, so they may query the controller freely.
    pub fn index_rooms(&self) -> Result<IndexReport> {
        if self.indexing.swap(true, Ordering::AcqRel) {
            return Err(StateError::Discovery("indexing already in progress".into()));
        }

        // The session is checked out for the run and put back afterwards
        let checked_out = self.session.lock().take();
        let Some(mut session) = checked_out else {
            self.indexing.store(false, Ordering::Release);
            return Err(StateError::Discovery("no discovery transport configured".into()));
        };

        let result = self.search_window(&mut session);

        *self.search.write() = session.state();
        *self.session.lock() = Some(session);
        self.indexing.store(false, Ordering::Release);
        result
    }

    fn search_window(&self, session: &mut DiscoverySession) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let deadline = Instant::now() + self.config.search_timeout();

        session.start()?;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match session.next_event(remaining) {
                Some(event) => {
                    *self.search.write() = session.state();
                    self.record(event, &mut report);
                }
                None => break,
            }
        }
        session.stop()?;

        while let Some(event) = session.next_event(Duration::ZERO) {
            *self.search.write() = session.state();
            self.record(event, &mut report);
        }

        tracing::info!(
            rooms = report.rooms_found.len(),
            devices = report.devices_added,
            errors = report.errors.len(),
            "indexing finished"
        );
        Ok(report)
    }

    /// Process a single discovery event
    pub fn handle(&self, event: DiscoveryEvent) -> Result<()> {
        self.dispatch(event).map(|_| ())
    }

    fn record(&self, event: DiscoveryEvent, report: &mut IndexReport) {
        match self.dispatch(event) {
            Ok(Handled::DeviceAdded { room, created }) => {
                report.devices_added += 1;
                if created {
                    report.rooms_found.push(room.name().to_string());
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "discovery event failed");
                report.errors.push(e);
            }
        }
    }

    fn dispatch(&self, event: DiscoveryEvent) -> Result<Handled> {
        match event {
            DiscoveryEvent::SearchStarted => {
                tracing::info!("indexing started");
                self.listeners.emit(self, &ControllerEvent::IndexingStarted);
                Ok(Handled::Lifecycle)
            }
            DiscoveryEvent::SearchEnded => {
                tracing::info!("indexing ended");
                self.listeners.emit(self, &ControllerEvent::IndexingEnded);
                Ok(Handled::Lifecycle)
            }
            DiscoveryEvent::ServiceAdded(announcement) => self.service_added(&announcement),
            DiscoveryEvent::StateVariableChanged {
                service,
                name,
                value,
            } => self.state_variable_changed(&service, &name, &value),
        }
    }

    fn service_added(&self, announcement: &ServiceAnnouncement) -> Result<Handled> {
        if announcement.manufacturer != self.config.manufacturer {
            tracing::debug!(
                manufacturer = %announcement.manufacturer,
                service = %announcement.service_type,
                "ignoring service from other manufacturer"
            );
            return Ok(Handled::Ignored);
        }

        self.subscriptions.write().insert(announcement.id());

        if announcement.service_type != self.config.zone_service_type {
            return Ok(Handled::Ignored);
        }

        let address = address_from_descriptor_url(&announcement.descriptor_url)?;
        if self.devices.read().contains_key(&address) {
            tracing::debug!(%address, "device already known");
            return Ok(Handled::Ignored);
        }

        let name = parse_friendly_name(&announcement.friendly_name)?;

        let device = {
            let mut devices = self.devices.write();
            if devices.contains_key(&address) {
                return Ok(Handled::Ignored);
            }
            let device = Arc::new(
                Device::new(address.clone(), name.role, Arc::clone(&self.commands))
                    .with_control_port(self.config.control_port),
            );
            devices.insert(address, Arc::clone(&device));
            device
        };

        // RoomFound goes out before the first member joins, so subscribers
        // attached from that event also see its DeviceAdded
        let (room, created) = self.room_for(&name.room);
        if created {
            tracing::info!(room = %room.name(), "room found");
            self.listeners
                .emit(self, &ControllerEvent::RoomFound(Arc::clone(&room)));
        }

        self.attach(&room, device)?;

        Ok(Handled::DeviceAdded { room, created })
    }

    fn state_variable_changed(&self, service: &ServiceId, name: &str, value: &str) -> Result<Handled> {
        if !self.subscriptions.read().contains(service) {
            return Ok(Handled::Ignored);
        }
        if name != self.config.state_variable {
            return Ok(Handled::Ignored);
        }

        let address = address_from_descriptor_url(&service.descriptor_url)?;
        let Some(device) = self.device(&address) else {
            tracing::debug!(%address, "notification for unknown device");
            return Ok(Handled::Ignored);
        };

        device.apply_notification(value)?;
        Ok(Handled::Notified)
    }

    /// Add a registered device to `room`, forgetting it again if the room
    /// refuses it so a later announcement can retry.
    fn attach(&self, room: &Room, device: Arc<Device>) -> Result<()> {
        if let Err(e) = room.add_device(Arc::clone(&device)) {
            tracing::warn!(device = %device.address(), room = %room.name(), error = %e, "device not attached");
            self.devices.write().remove(device.address());
            return Err(e);
        }
        Ok(())
    }

    fn room_for(&self, name: &str) -> (Arc<Room>, bool) {
        let mut rooms = self.rooms.write();
        if let Some(room) = rooms.iter().find(|r| r.name() == name) {
            return (Arc::clone(room), false);
        }
        let room = Room::new(name);
        rooms.push(Arc::clone(&room));
        (room, true)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("rooms", &self.rooms.read().len())
            .field("devices", &self.devices.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::RecordingTransport;
    use crate::discovery::tests::ScriptedDiscovery;
    use crate::room::{RoomEvent, RoomEventKind};

    const RENDERING: &str = "urn:schemas-upnp-org:service:RenderingControl:1";
    const AV_TRANSPORT: &str = "urn:schemas-upnp-org:service:AVTransport:1";

    fn announce(ip: &str, service_type: &str, friendly_name: &str) -> ServiceAnnouncement {
        ServiceAnnouncement {
            manufacturer: "Sonos, Inc.".into(),
            service_type: service_type.into(),
            descriptor_url: format!("http://{}:1400/xml/device_description.xml", ip),
            friendly_name: friendly_name.into(),
        }
    }

    fn controller() -> Controller {
        Controller::new(
            ControllerConfig::default(),
            Arc::new(RecordingTransport::default()),
        )
    }

    fn last_change(ip: &str, service_type: &str, body: &str) -> DiscoveryEvent {
        DiscoveryEvent::StateVariableChanged {
            service: ServiceId {
                descriptor_url: format!("http://{}:1400/xml/device_description.xml", ip),
                service_type: service_type.into(),
            },
            name: "LastChange".into(),
            value: format!(r#"<Event><InstanceID val="0">{}</InstanceID></Event>"#, body),
        }
    }

    #[test]
    fn test_zone_service_creates_device_and_room() {
        let controller = controller();
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&found);
        controller
            .listeners()
            .subscribe_to(ControllerEventKind::RoomFound, move |_, event| {
                if let ControllerEvent::RoomFound(room) = event {
                    sink.lock().push(room.name().to_string());
                }
            });

        controller
            .handle(DiscoveryEvent::ServiceAdded(announce(
                "10.0.0.2",
                RENDERING,
                "Kitchen - ZP120 Media Renderer",
            )))
            .unwrap();

        let device = controller.device("10.0.0.2").unwrap();
        assert_eq!(device.role(), "ZP120");
        assert_eq!(device.room_name().as_deref(), Some("Kitchen"));
        assert_eq!(controller.room("Kitchen").unwrap().len(), 1);
        assert_eq!(*found.lock(), vec!["Kitchen".to_string()]);
    }

    #[test]
    fn test_second_device_joins_existing_room() {
        let controller = controller();
        for (ip, role) in [("10.0.0.2", "ZP120"), ("10.0.0.3", "ZP90")] {
            controller
                .handle(DiscoveryEvent::ServiceAdded(announce(
                    ip,
                    RENDERING,
                    &format!("Kitchen - {} Media Renderer", role),
                )))
                .unwrap();
        }

        assert_eq!(controller.rooms().len(), 1);
        let members: Vec<String> = controller
            .room("Kitchen")
            .unwrap()
            .devices()
            .iter()
            .map(|d| d.address().to_string())
            .collect();
        assert_eq!(members, vec!["10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn test_other_manufacturer_is_ignored() {
        let controller = controller();
        let mut announcement = announce("10.0.0.9", RENDERING, "Den - TV Media Renderer");
        announcement.manufacturer = "Acme".into();

        controller
            .handle(DiscoveryEvent::ServiceAdded(announcement))
            .unwrap();
        assert!(controller.rooms().is_empty());
        assert!(controller.device("10.0.0.9").is_none());
    }

    #[test]
    fn test_non_zone_service_creates_no_device() {
        let controller = controller();
        controller
            .handle(DiscoveryEvent::ServiceAdded(announce(
                "10.0.0.2",
                AV_TRANSPORT,
                "Kitchen - ZP120 Media Renderer",
            )))
            .unwrap();
        assert!(controller.device("10.0.0.2").is_none());
    }

    #[test]
    fn test_repeated_announcement_is_ignored() {
        let controller = controller();
        let event = DiscoveryEvent::ServiceAdded(announce(
            "10.0.0.2",
            RENDERING,
            "Kitchen - ZP120 Media Renderer",
        ));
        controller.handle(event.clone()).unwrap();
        controller.handle(event).unwrap();

        assert_eq!(controller.room("Kitchen").unwrap().len(), 1);
    }

    #[test]
    fn test_bad_friendly_name_is_a_per_event_error() {
        let controller = controller();
        let result = controller.handle(DiscoveryEvent::ServiceAdded(announce(
            "10.0.0.2",
            RENDERING,
            "Kitchen",
        )));

        assert!(matches!(result, Err(StateError::NamingConvention { .. })));
        assert!(controller.device("10.0.0.2").is_none());
    }

    #[test]
    fn test_notifications_reach_room_listeners() {
        let controller = controller();
        for service_type in [AV_TRANSPORT, RENDERING] {
            controller
                .handle(DiscoveryEvent::ServiceAdded(announce(
                    "10.0.0.2",
                    service_type,
                    "Kitchen - ZP120 Media Renderer",
                )))
                .unwrap();
        }

        let room = controller.room("Kitchen").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        room.listeners().subscribe(move |_, event| sink.lock().push(event.clone()));

        controller
            .handle(last_change("10.0.0.2", AV_TRANSPORT, r#"<TransportState val="PLAYING"/>"#))
            .unwrap();
        controller
            .handle(last_change("10.0.0.2", RENDERING, r#"<Volume channel="Master" val="18"/>"#))
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![RoomEvent::Playing, RoomEvent::VolumeChanged(18)]
        );
    }

    #[test]
    fn test_notifications_for_unsubscribed_services_are_dropped() {
        let controller = controller();
        controller
            .handle(DiscoveryEvent::ServiceAdded(announce(
                "10.0.0.2",
                RENDERING,
                "Kitchen - ZP120 Media Renderer",
            )))
            .unwrap();

        // AVTransport was never announced, so there is no subscription for it
        controller
            .handle(last_change("10.0.0.2", AV_TRANSPORT, r#"<TransportState val="PLAYING"/>"#))
            .unwrap();
        assert_eq!(controller.device("10.0.0.2").unwrap().state().transport_state, None);
    }

    #[test]
    fn test_malformed_notification_is_a_decode_error() {
        let controller = controller();
        controller
            .handle(DiscoveryEvent::ServiceAdded(announce(
                "10.0.0.2",
                RENDERING,
                "Kitchen - ZP120 Media Renderer",
            )))
            .unwrap();

        let mut event = last_change("10.0.0.2", RENDERING, "");
        if let DiscoveryEvent::StateVariableChanged { value, .. } = &mut event {
            *value = "<Event><InstanceID val=\"0\"></Event>".into();
        }
        assert!(matches!(controller.handle(event), Err(StateError::Decode(_))));
    }

    #[test]
    fn test_index_rooms_without_discovery() {
        assert!(matches!(
            controller().index_rooms(),
            Err(StateError::Discovery(_))
        ));
    }

    #[test]
    fn test_index_rooms_reports_and_continues_past_errors() {
        let transport = ScriptedDiscovery::new(vec![
            DiscoveryEvent::SearchStarted,
            DiscoveryEvent::ServiceAdded(announce("10.0.0.2", RENDERING, "Kitchen - ZP120 Media Renderer")),
            DiscoveryEvent::ServiceAdded(announce("10.0.0.3", RENDERING, "Nameless")),
            DiscoveryEvent::ServiceAdded(announce("10.0.0.4", RENDERING, "Office - ZP90 Media Renderer")),
            DiscoveryEvent::ServiceAdded(announce("10.0.0.5", RENDERING, "Kitchen - SUB Media Renderer")),
        ]);
        let calls = Arc::clone(&transport.calls);

        let controller = controller().with_discovery(Box::new(transport));
        let lifecycle = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lifecycle);
        controller.listeners().subscribe(move |_, event| {
            if !matches!(event, ControllerEvent::RoomFound(_)) {
                sink.lock().push(event.kind());
            }
        });

        let report = controller.index_rooms().unwrap();

        assert_eq!(report.rooms_found, vec!["Kitchen", "Office"]);
        assert_eq!(report.devices_added, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(*calls.lock(), vec![true, false]);
        assert_eq!(
            *lifecycle.lock(),
            vec![ControllerEventKind::IndexingStarted, ControllerEventKind::IndexingEnded]
        );
        assert_eq!(controller.search_state(), SearchState::Idle);
        assert_eq!(controller.room("Kitchen").unwrap().len(), 2);
    }

    #[test]
    fn test_room_found_precedes_first_member() {
        let controller = controller();
        let joined = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&joined);
        controller.listeners().subscribe_to(ControllerEventKind::RoomFound, move |_, event| {
            if let ControllerEvent::RoomFound(room) = event {
                let sink = Arc::clone(&sink);
                room.listeners().subscribe_to(RoomEventKind::DeviceAdded, move |_, event| {
                    if let RoomEvent::DeviceAdded(device) = event {
                        sink.lock().push(device.address().to_string());
                    }
                });
            }
        });

        for (ip, role) in [("10.0.0.2", "ZP120"), ("10.0.0.3", "ZP90")] {
            controller
                .handle(DiscoveryEvent::ServiceAdded(announce(
                    ip,
                    RENDERING,
                    &format!("Kitchen - {} Media Renderer", role),
                )))
                .unwrap();
        }

        assert_eq!(*joined.lock(), vec!["10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn test_listeners_can_query_controller_while_indexing() {
        let transport = ScriptedDiscovery::new(vec![
            DiscoveryEvent::SearchStarted,
            DiscoveryEvent::ServiceAdded(announce("10.0.0.2", RENDERING, "Kitchen - ZP120 Media Renderer")),
        ]);
        let controller = controller().with_discovery(Box::new(transport));

        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        controller.listeners().subscribe(move |controller: &Controller, event| {
            let nested = controller.index_rooms();
            sink.lock().push((
                event.kind(),
                controller.search_state(),
                matches!(nested, Err(StateError::Discovery(_))),
            ));
        });

        controller.index_rooms().unwrap();

        assert_eq!(
            *observed.lock(),
            vec![
                (ControllerEventKind::IndexingStarted, SearchState::Searching, true),
                (ControllerEventKind::RoomFound, SearchState::Searching, true),
                (ControllerEventKind::IndexingEnded, SearchState::Idle, true),
            ]
        );

        // The session is available again once the run is over
        let report = controller.index_rooms().unwrap();
        assert!(report.rooms_found.is_empty());
    }

    #[test]
    fn test_refused_device_is_forgotten() {
        let controller = controller();
        let device = Arc::new(Device::new(
            "10.0.0.2",
            "ZP120",
            Arc::new(RecordingTransport::default()),
        ));
        controller
            .devices
            .write()
            .insert("10.0.0.2".into(), Arc::clone(&device));
        Room::new("Den").add_device(Arc::clone(&device)).unwrap();

        let kitchen = Room::new("Kitchen");
        assert!(matches!(
            controller.attach(&kitchen, device),
            Err(StateError::AlreadyInRoom { .. })
        ));
        assert!(controller.device("10.0.0.2").is_none());

        controller
            .handle(DiscoveryEvent::ServiceAdded(announce(
                "10.0.0.2",
                RENDERING,
                "Kitchen - ZP120 Media Renderer",
            )))
            .unwrap();
        assert_eq!(controller.room("Kitchen").unwrap().len(), 1);
    }
}
