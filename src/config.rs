use serde::{Deserialize, Serialize};

use crate::access::UserType;
use crate::mixer::DEFAULT_MASTER_VOLUME;
use crate::persistence::{load_json, Storage, CONFIG_KEY};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub master_volume: u8,
    pub tone_duration_ms: u32,
    pub beautify: bool,
    pub user_type: UserType,    // starting tier when no session is stored yet
    pub sample_rate_hint: u32,  // used when there's no output device
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master_volume: DEFAULT_MASTER_VOLUME,
            tone_duration_ms: 2000,
            beautify: false,
            user_type: UserType::Free,
            sample_rate_hint: 44_100,
        }
    }
}

impl Config {
    /// Missing or unreadable config falls back to defaults.
    pub fn load(store: &dyn Storage) -> Self {
        match load_json::<Config>(store, CONFIG_KEY) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring config: {e}");
                Self::default()
            }
        }
    }
}
