use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::shared::{InputEvent, NUM_KEYS, VOLUME_STEP};

// the playable row, left to right
const KEY_ROW: [char; NUM_KEYS] = ['a', 's', 'd', 'f', 'g', 'h', 'j', 'k', 'l', ';'];

// poll for terminal input and resolve it into events for the workspace
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code).into_iter().collect());
    }
    Ok(vec![])
}

pub fn handle_key(code: KeyCode) -> Option<InputEvent> {
    let event = match code {
        KeyCode::Esc => InputEvent::Quit,
        KeyCode::Char(' ') => InputEvent::PlayTake,
        KeyCode::Enter => InputEvent::PlayComposition,
        KeyCode::Tab => InputEvent::NextLayer,

        KeyCode::Char(c) if KEY_ROW.contains(&c) => InputEvent::PlayKey(char_to_key(c)?),

        // layer controls
        KeyCode::Char('+') => InputEvent::AddLayer,
        KeyCode::Char('i') => InputEvent::CycleInstrument,
        KeyCode::Char('x') => InputEvent::RemoveLayer,
        KeyCode::Char('m') => InputEvent::ToggleMute,
        KeyCode::Char('o') => InputEvent::ToggleSolo,
        KeyCode::Char('[') => InputEvent::LayerVolume(-VOLUME_STEP),
        KeyCode::Char(']') => InputEvent::LayerVolume(VOLUME_STEP),
        KeyCode::Char('{') => InputEvent::MasterVolume(-VOLUME_STEP),
        KeyCode::Char('}') => InputEvent::MasterVolume(VOLUME_STEP),

        // recorder
        KeyCode::Char('r') => InputEvent::RecordToggle,
        KeyCode::Char('p') => InputEvent::PauseToggle,
        KeyCode::Char('c') => InputEvent::ClearRecording,

        KeyCode::Char('v') => InputEvent::ToggleBeautify,
        KeyCode::Char('u') => InputEvent::Upgrade,
        KeyCode::Char('e') => InputEvent::Export,

        _ => return None,
    };
    Some(event)
}

// convert a key on the playable row to its slot index
fn char_to_key(c: char) -> Option<u8> {
    KEY_ROW.iter().position(|&k| k == c).map(|i| i as u8)
}
