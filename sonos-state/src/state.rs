//! Last-observed player state and its dedup reducer

use serde::Serialize;
use sonos_parser::{StateDelta, Track, TransportState};

/// Last observed state of a device or room. Every field starts unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerState {
    pub track: Option<Track>,
    pub transport_state: Option<TransportState>,
    pub volume: Option<u8>,
    pub muted: Option<bool>,
}

impl PlayerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a delta, returning the next state and whether anything changed.
    ///
    /// A delta carrying the value already stored leaves the state untouched
    /// and reports `false`.
    pub fn apply(&self, delta: &StateDelta) -> (PlayerState, bool) {
        let mut next = self.clone();
        let changed = next.apply_in_place(delta);
        (next, changed)
    }

    /// In-place form of [`apply`](Self::apply) used behind the owner's lock
    pub(crate) fn apply_in_place(&mut self, delta: &StateDelta) -> bool {
        match delta {
            StateDelta::TrackChanged(track) => replace(&mut self.track, track),
            StateDelta::TransportChanged(state) => replace(&mut self.transport_state, state),
            StateDelta::VolumeChanged(level) => replace(&mut self.volume, level),
            StateDelta::MuteChanged(muted) => replace(&mut self.muted, muted),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport_state == Some(TransportState::Playing)
    }
}

fn replace<T: Clone + PartialEq>(slot: &mut Option<T>, value: &T) -> bool {
    if slot.as_ref() == Some(value) {
        return false;
    }
    *slot = Some(value.clone());
    true
}
