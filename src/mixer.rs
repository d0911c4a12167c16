//! Multi-layer mixing.
//!
//! A [`Mixer`] owns an ordered set of [`Layer`]s plus a master volume. Volumes
//! are percentages clamped to `0..=100`. Mute always silences a layer; when any
//! layer is soloed, every layer that is not soloed is silenced as well.

use serde::{Deserialize, Serialize};

use crate::ids::{next_layer_id, LayerId};

pub const MAX_VOLUME: u8 = 100;
pub const DEFAULT_LAYER_VOLUME: u8 = 75;
pub const DEFAULT_MASTER_VOLUME: u8 = 80;

/// Clamp any integer percentage into `0..=100`.
pub fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, MAX_VOLUME as i32) as u8
}

/// One recorded note on a layer's track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
    pub pitch: String,
    pub offset_ms: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub instrument_id: String, // lookup into the catalog only
    volume: u8,
    pub muted: bool,
    pub solo: bool,
    pub track_events: Vec<TrackEvent>,
}

impl Layer {
    pub fn new(instrument_id: impl Into<String>) -> Self {
        Self {
            id: next_layer_id(),
            instrument_id: instrument_id.into(),
            volume: DEFAULT_LAYER_VOLUME,
            muted: false,
            solo: false,
            track_events: Vec::new(),
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: i32) {
        self.volume = clamp_volume(volume);
    }
}

/// Linear gain for a layer on its own, ignoring siblings. Always in `[0, 1]`.
pub fn effective_amplitude(layer: &Layer, master_volume: u8) -> f32 {
    if layer.muted {
        return 0.0;
    }
    let layer_gain = layer.volume.min(MAX_VOLUME) as f32 / 100.0;
    let master_gain = master_volume.min(MAX_VOLUME) as f32 / 100.0;
    layer_gain * master_gain
}

#[derive(Clone, Debug)]
pub struct Mixer {
    layers: Vec<Layer>,
    master_volume: u8,
}

impl Default for Mixer {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            master_volume: DEFAULT_MASTER_VOLUME,
        }
    }
}

impl Mixer {
    pub fn new(master_volume: i32) -> Self {
        Self {
            layers: Vec::new(),
            master_volume: clamp_volume(master_volume),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn add_layer(&mut self, instrument_id: impl Into<String>) -> LayerId {
        let layer = Layer::new(instrument_id);
        let id = layer.id;
        self.layers.push(layer);
        id
    }

    /// Insert a fully formed layer (used when importing a composition).
    pub fn push_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Removing an unknown id is a no-op so a double removal is harmless.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let idx = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(idx))
    }

    pub fn master_volume(&self) -> u8 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: i32) {
        self.master_volume = clamp_volume(volume);
    }

    pub fn set_volume(&mut self, id: LayerId, volume: i32) {
        if let Some(layer) = self.get_mut(id) {
            layer.set_volume(volume);
        }
    }

    pub fn toggle_mute(&mut self, id: LayerId) {
        if let Some(layer) = self.get_mut(id) {
            layer.muted = !layer.muted;
        }
    }

    pub fn toggle_solo(&mut self, id: LayerId) {
        if let Some(layer) = self.get_mut(id) {
            layer.solo = !layer.solo;
        }
    }

    pub fn any_solo(&self) -> bool {
        self.layers.iter().any(|l| l.solo)
    }

    pub fn is_audible(&self, layer: &Layer) -> bool {
        !layer.muted && (layer.solo || !self.any_solo())
    }

    /// Gain a layer plays at right now, taking solo on sibling layers into
    /// account. Unknown layers are silent.
    pub fn audible_amplitude(&self, id: LayerId) -> f32 {
        match self.get(id) {
            Some(layer) if self.is_audible(layer) => {
                effective_amplitude(layer, self.master_volume)
            }
            _ => 0.0,
        }
    }
}
