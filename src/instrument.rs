// The fixed instrument catalog. Entries are loaded once at startup and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, WindError};
use crate::pitch;

const BUILTIN_CATALOG: &str = include_str!("catalog.json");

/// Selects the oscillator shape and envelope a key press is synthesized with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimbreClass {
    Flute,    // sine
    Sax,      // sawtooth
    Trumpet,  // square
    Clarinet, // triangle
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Woodwind,
    Reed,
    Brass,
    Vocal, // recorded from the microphone, eligible for beautify
}

impl Category {
    pub fn needs_microphone(self) -> bool {
        self == Category::Vocal
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Instrument {
    pub id: String,
    pub name: String,
    pub timbre: TimbreClass,
    pub category: Category,
    pub premium: bool,
    pub keys: Vec<String>, // ordered; index = key slot on the keyboard
}

impl Instrument {
    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }
}

#[derive(Clone, Debug)]
pub struct Catalog {
    instruments: Vec<Instrument>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog. Rejects duplicate or empty ids, empty
    /// key lists, and keys the frequency table cannot resolve.
    pub fn from_json(json: &str) -> Result<Self> {
        let instruments: Vec<Instrument> = serde_json::from_str(json)?;
        Self::new(instruments)
    }

    pub fn new(instruments: Vec<Instrument>) -> Result<Self> {
        let mut seen = HashSet::new();
        for inst in &instruments {
            if inst.id.trim().is_empty() || inst.name.trim().is_empty() {
                return Err(WindError::InvalidCatalog(
                    "instrument with empty id or name".into(),
                ));
            }
            if !seen.insert(inst.id.as_str()) {
                return Err(WindError::InvalidCatalog(format!(
                    "duplicate instrument id {:?}",
                    inst.id
                )));
            }
            if inst.keys.is_empty() {
                return Err(WindError::InvalidCatalog(format!(
                    "instrument {:?} has no keys",
                    inst.id
                )));
            }
            if let Some(bad) = inst.keys.iter().find(|k| pitch::lookup(k).is_none()) {
                return Err(WindError::InvalidCatalog(format!(
                    "instrument {:?} references unknown pitch {:?}",
                    inst.id, bad
                )));
            }
        }
        Ok(Self { instruments })
    }

    pub fn get(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
