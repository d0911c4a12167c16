//! WindHarmony: virtual wind instruments, layered mixing and take recording.

pub mod access;
pub mod audio;
pub mod audio_api;
pub mod composition;
pub mod config;
pub mod error;
pub mod ids;
pub mod instrument;
pub mod mixer;
pub mod persistence;
pub mod pitch;
pub mod recorder;
pub mod shared;
pub mod synth;
pub mod tui;
pub mod workspace;

pub use error::{Result, WindError};
