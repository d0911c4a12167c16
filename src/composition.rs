// Export format for a whole mix. This is what gets handed to storage.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::mixer::{Layer, Mixer, TrackEvent};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    pub instrument_id: String,
    pub volume: u8,
    pub muted: bool,
    pub solo: bool,
    #[serde(default)]
    pub track_events: Vec<TrackEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionDescriptor {
    pub layers: Vec<LayerDescriptor>,
    pub master_volume: u8,
    pub timestamp: u64, // unix millis at export
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub fn export(mixer: &Mixer) -> CompositionDescriptor {
    CompositionDescriptor {
        layers: mixer
            .layers()
            .iter()
            .map(|l| LayerDescriptor {
                instrument_id: l.instrument_id.clone(),
                volume: l.volume(),
                muted: l.muted,
                solo: l.solo,
                track_events: l.track_events.clone(),
            })
            .collect(),
        master_volume: mixer.master_volume(),
        timestamp: now_millis(),
    }
}

/// Rebuild a mixer. Layers get fresh ids; out-of-range volumes are clamped.
/// Instrument ids are kept as-is even if the catalog doesn't know them, since
/// playback already treats unknown instruments as silent.
pub fn import(descriptor: &CompositionDescriptor) -> Mixer {
    let mut mixer = Mixer::new(descriptor.master_volume as i32);
    for d in &descriptor.layers {
        let mut layer = Layer::new(d.instrument_id.clone());
        layer.set_volume(d.volume as i32);
        layer.muted = d.muted;
        layer.solo = d.solo;
        layer.track_events = d.track_events.clone();
        mixer.push_layer(layer);
    }
    mixer
}

impl CompositionDescriptor {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
