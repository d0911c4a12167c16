use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TONE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

/// Handle for one scheduled tone; lets the engine cancel it before it decays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ToneId(pub u64);

// atomic counters so ids stay unique even when tones are scheduled off the ui thread
pub fn next_layer_id() -> LayerId {
    LayerId(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn next_tone_id() -> ToneId {
    ToneId(NEXT_TONE_ID.fetch_add(1, Ordering::Relaxed))
}
