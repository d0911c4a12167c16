//! Pitch name to frequency lookup.
//!
//! Names are scientific pitch notation: a letter, an optional accidental and an
//! octave, e.g. `"C4"`, `"F#3"`, `"B♭4"`. Both the unicode accidentals (`♯`,
//! `♭`) and their ascii stand-ins (`#`, `b`) are accepted. Frequencies are
//! 12-TET relative to A4 = 440 Hz.

/// Lowest and highest octave the table covers.
pub const MIN_OCTAVE: i32 = 0;
pub const MAX_OCTAVE: i32 = 8;

const A4_HZ: f64 = 440.0;
const A4_MIDI: i32 = 69;

/// Semitone offset of each natural note from C.
fn letter_offset(letter: char) -> Option<i32> {
    let offset = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    Some(offset)
}

/// Resolve a pitch name to its MIDI note number.
pub fn midi_note(name: &str) -> Option<i32> {
    let mut chars = name.trim().chars().peekable();
    let base = letter_offset(chars.next()?.to_ascii_uppercase())?;

    let accidental = match chars.peek() {
        Some('#') | Some('♯') => 1,
        Some('b') | Some('♭') => -1,
        _ => 0,
    };
    if accidental != 0 {
        chars.next();
    }

    let octave_str: String = chars.collect();
    if octave_str.is_empty() {
        return None;
    }
    let octave: i32 = octave_str.parse().ok()?;
    if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
        return None;
    }

    Some((octave + 1) * 12 + base + accidental)
}

/// Frequency in Hz for a pitch name, or `None` if the name does not resolve.
///
/// Callers treat `None` as "play nothing".
pub fn lookup(name: &str) -> Option<f64> {
    let note = midi_note(name)?;
    Some(A4_HZ * 2.0_f64.powf((note - A4_MIDI) as f64 / 12.0))
}
