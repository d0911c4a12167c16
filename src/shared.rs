// Types shared by the terminal front end and the workspace.
//
// The TUI never interprets key combinations against engine state itself; it
// turns keys into `InputEvent`s, the workspace applies them, and every frame
// the TUI renders whatever `DisplayState` the workspace hands back.

/// Number of playable key slots on the keyboard row.
pub const NUM_KEYS: usize = 10;

pub const VOLUME_STEP: i32 = 5;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    // play the n-th key of the selected layer's instrument
    PlayKey(u8),

    // layers
    NextLayer,
    AddLayer, // with the highlighted catalog instrument
    CycleInstrument,
    RemoveLayer,
    ToggleMute,
    ToggleSolo,
    LayerVolume(i32), // delta, percent
    MasterVolume(i32),

    // recorder
    RecordToggle, // start, or stop if running
    PauseToggle,
    ClearRecording,
    PlayTake,

    PlayComposition,
    ToggleBeautify,
    Upgrade,
    Export,

    Quit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerView {
    pub instrument_name: String,
    pub volume: u8,
    pub muted: bool,
    pub solo: bool,
    pub audible: bool,
    pub locked: bool, // premium instrument the session can't play
    pub events: usize,
    pub selected: bool,
    pub recording: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayState {
    pub layers: Vec<LayerView>,
    pub keys: Vec<String>, // pitches on the keyboard row for the selected layer
    pub highlighted_instrument: String,
    pub highlighted_locked: bool,
    pub master_volume: u8,
    pub licence: &'static str,
    pub recorder: &'static str,
    pub has_recording: bool,
    pub beautify: bool,
    pub status: String,
}
