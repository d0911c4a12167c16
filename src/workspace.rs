//! The session-scoped state object.
//!
//! A [`Workspace`] owns everything one user touches while composing: the
//! catalog, their licence, the mixer, the recorder and the synthesizer. A key
//! press flows gate -> mixer -> synthesizer -> recorder. Every step on the key
//! press path fails silently; only recorder device errors and storage errors
//! come back as `Err`.

use std::time::Instant;

use crate::access::{can_access, LicenseEvent, Session, UserType};
use crate::audio_api::AudioCommand;
use crate::composition::{self, CompositionDescriptor};
use crate::config::Config;
use crate::error::{Result, WindError};
use crate::ids::{LayerId, ToneId};
use crate::instrument::{Catalog, Category, Instrument};
use crate::mixer::{Layer, Mixer, TrackEvent};
use crate::persistence::{load_json, save_json, Storage, COMPOSITION_KEY, SESSION_KEY};
use crate::pitch;
use crate::recorder::{Recorder, RecorderState, Take};
use crate::shared::{DisplayState, InputEvent, LayerView};
use crate::synth::{Synthesizer, ToneRequest};

pub struct Workspace {
    catalog: Catalog,
    session: Session,
    mixer: Mixer,
    recorder: Recorder,
    recording_layer: Option<LayerId>,
    take_layer: Option<LayerId>, // layer the recorder's last take belongs to
    completed_take: Option<Take>,
    synth: Synthesizer,
    config: Config,
    selected: Option<LayerId>,
    highlighted: usize, // catalog index used by AddLayer
    beautify: bool,
    status: String,
}

impl Workspace {
    pub fn new(
        catalog: Catalog,
        session: Session,
        config: Config,
        synth: Synthesizer,
        recorder: Recorder,
    ) -> Self {
        Self {
            catalog,
            session,
            mixer: Mixer::new(config.master_volume as i32),
            recorder,
            recording_layer: None,
            take_layer: None,
            completed_take: None,
            synth,
            beautify: config.beautify,
            config,
            selected: None,
            highlighted: 0,
            status: String::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn selected_layer(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn beautify(&self) -> bool {
        self.beautify
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn instrument_for(&self, layer: &Layer) -> Option<&Instrument> {
        self.catalog.get(&layer.instrument_id)
    }

    pub fn is_locked(&self, instrument: &Instrument) -> bool {
        !can_access(instrument, &self.session)
    }

    // ── key presses ───────────────────────────────────────────────

    /// Play `pitch` on the selected layer.
    pub fn press_key(&mut self, pitch: &str) -> Option<ToneId> {
        let layer = self.selected?;
        self.press_key_on(layer, pitch, Instant::now())
    }

    /// Play the `index`-th key of the selected layer's instrument.
    pub fn press_key_index(&mut self, index: usize) -> Option<ToneId> {
        let layer = self.mixer.get(self.selected?)?;
        let pitch = self.instrument_for(layer)?.key(index)?.to_string();
        self.press_key(&pitch)
    }

    pub fn press_key_on(&mut self, layer_id: LayerId, pitch: &str, now: Instant) -> Option<ToneId> {
        let Some(layer) = self.mixer.get(layer_id) else {
            tracing::debug!(?layer_id, "key press on unknown layer");
            return None;
        };
        let Some(instrument) = self.instrument_for(layer) else {
            tracing::debug!(instrument = %layer.instrument_id, "unknown instrument, ignoring key");
            return None;
        };
        if !can_access(instrument, &self.session) {
            tracing::debug!(instrument = %instrument.id, "premium instrument locked, ignoring key");
            return None;
        }
        let Some(frequency) = pitch::lookup(pitch) else {
            tracing::debug!(pitch, "unknown pitch, ignoring key");
            return None;
        };

        let amplitude = self.mixer.audible_amplitude(layer_id);
        let mut req = ToneRequest::new(
            instrument.timbre,
            frequency,
            amplitude,
            self.config.tone_duration_ms,
        );
        req.vibrato = self.vibrato_for(instrument);
        let tone = self.synth.schedule(req);

        if self.recording_layer == Some(layer_id) {
            self.recorder.record_note(pitch, now);
        }
        tone
    }

    fn vibrato_for(&self, instrument: &Instrument) -> bool {
        self.beautify && instrument.category == Category::Vocal
    }

    // ── layers ────────────────────────────────────────────────────

    /// Add a layer playing the highlighted catalog instrument and select it.
    pub fn add_layer(&mut self) -> Result<LayerId> {
        let id = match self.catalog.instruments().get(self.highlighted) {
            Some(instrument) => instrument.id.clone(),
            None => return Err(WindError::UnknownInstrument(format!("#{}", self.highlighted))),
        };
        self.add_layer_with(&id)
    }

    /// Premium instruments may be added by anyone; they just stay silent for
    /// free sessions.
    pub fn add_layer_with(&mut self, instrument_id: &str) -> Result<LayerId> {
        if self.catalog.get(instrument_id).is_none() {
            return Err(WindError::UnknownInstrument(instrument_id.to_string()));
        }
        let id = self.mixer.add_layer(instrument_id);
        self.selected = Some(id);
        tracing::debug!(?id, instrument_id, "layer added");
        Ok(id)
    }

    pub fn remove_layer(&mut self, id: LayerId) {
        let Some(idx) = self.mixer.layers().iter().position(|l| l.id == id) else {
            return;
        };
        if self.recording_layer == Some(id) {
            self.recorder.clear();
            self.recording_layer = None;
        }
        if self.take_layer == Some(id) {
            self.take_layer = None;
        }
        self.mixer.remove_layer(id);
        if self.selected == Some(id) {
            let layers = self.mixer.layers();
            self.selected = layers.get(idx).or_else(|| layers.last()).map(|l| l.id);
        }
    }

    pub fn select_next_layer(&mut self) {
        let layers = self.mixer.layers();
        if layers.is_empty() {
            self.selected = None;
            return;
        }
        let next = match self.selected.and_then(|s| layers.iter().position(|l| l.id == s)) {
            Some(i) => (i + 1) % layers.len(),
            None => 0,
        };
        self.selected = Some(layers[next].id);
    }

    pub fn cycle_instrument(&mut self) {
        if !self.catalog.is_empty() {
            self.highlighted = (self.highlighted + 1) % self.catalog.len();
        }
    }

    pub fn set_layer_volume(&mut self, id: LayerId, volume: i32) {
        self.mixer.set_volume(id, volume);
    }

    pub fn toggle_mute(&mut self, id: LayerId) {
        self.mixer.toggle_mute(id);
    }

    pub fn toggle_solo(&mut self, id: LayerId) {
        self.mixer.toggle_solo(id);
    }

    pub fn set_master_volume(&mut self, volume: i32) {
        self.mixer.set_master_volume(volume);
    }

    pub fn toggle_beautify(&mut self) {
        self.beautify = !self.beautify;
    }

    // ── recording ─────────────────────────────────────────────────

    /// Start a take on the selected layer. Vocal instruments record from the
    /// microphone as well. Returns whether a take was started: nothing happens
    /// while a take is already running or when the layer's instrument is locked.
    pub fn start_recording(&mut self, now: Instant) -> Result<bool> {
        if self.recorder.state() != RecorderState::Idle {
            return Ok(false);
        }
        let instrument = self
            .selected
            .and_then(|id| self.mixer.get(id))
            .and_then(|l| self.instrument_for(l));
        if let Some(instrument) = instrument {
            if !can_access(instrument, &self.session) {
                tracing::debug!(instrument = %instrument.id, "premium instrument locked, not recording");
                return Ok(false);
            }
        }
        let needs_input = instrument.is_some_and(|i| i.category.needs_microphone());
        self.recorder.start(needs_input, now)?;
        self.recording_layer = self.selected;
        Ok(true)
    }

    pub fn pause_recording(&mut self, now: Instant) {
        self.recorder.pause(now);
    }

    pub fn resume_recording(&mut self, now: Instant) {
        self.recorder.resume(now);
    }

    /// Finish the take and commit its notes to the layer it was recorded on.
    pub fn stop_recording(&mut self) -> Option<Take> {
        let take = self.recorder.stop()?;
        self.take_layer = self.recording_layer.take();
        if let Some(layer) = self.take_layer.and_then(|id| self.mixer.get_mut(id)) {
            layer.track_events = take.events.clone();
        }
        self.completed_take = Some(take.clone());
        Some(take)
    }

    pub fn clear_recording(&mut self) {
        self.recorder.clear();
        self.recording_layer = None;
        self.take_layer = None;
        self.completed_take = None;
    }

    /// The take finished since the last call, if any.
    pub fn poll_completed_take(&mut self) -> Option<Take> {
        self.completed_take.take()
    }

    /// Pull in microphone frames; call once per UI tick.
    pub fn poll(&mut self) {
        self.recorder.poll_input();
    }

    /// Replay the last take on the layer it was recorded on: its notes and any
    /// captured microphone audio, mixed like a key press on that layer. Plays
    /// nothing once that layer is gone. Returns the number of tones scheduled.
    pub fn play_take(&self) -> usize {
        let Some(take) = self.recorder.last_take() else {
            return 0;
        };
        let Some(layer) = self.take_layer.and_then(|id| self.mixer.get(id)) else {
            tracing::debug!("take has no layer to play on");
            return 0;
        };
        let Some((_, amplitude)) = self.playable(layer) else {
            return 0;
        };
        let scheduled = self.schedule_events(layer, &take.events);
        if let Some(audio) = take.audio.as_ref().filter(|a| !a.is_empty()) {
            let sink = self.synth.sink();
            let buffer = audio.resampled(sink.sample_rate());
            sink.send(AudioCommand::PlayBuffer {
                buffer,
                gain: amplitude,
            });
        }
        scheduled
    }

    /// Schedule every layer's recorded track, respecting gate, mute and solo.
    /// Returns the number of tones scheduled.
    pub fn play_composition(&self) -> usize {
        self.mixer
            .layers()
            .iter()
            .map(|layer| self.schedule_events(layer, &layer.track_events))
            .sum()
    }

    // the layer's instrument and mixed amplitude, if anything on it can be heard
    fn playable(&self, layer: &Layer) -> Option<(&Instrument, f32)> {
        let instrument = self.instrument_for(layer)?;
        if !can_access(instrument, &self.session) {
            return None;
        }
        let amplitude = self.mixer.audible_amplitude(layer.id);
        (amplitude > 0.0).then_some((instrument, amplitude))
    }

    fn schedule_events(&self, layer: &Layer, events: &[TrackEvent]) -> usize {
        let Some((instrument, amplitude)) = self.playable(layer) else {
            return 0;
        };
        let mut scheduled = 0;
        for event in events {
            let Some(frequency) = pitch::lookup(&event.pitch) else {
                continue;
            };
            let mut req = ToneRequest::new(
                instrument.timbre,
                frequency,
                amplitude,
                self.config.tone_duration_ms,
            );
            req.vibrato = self.vibrato_for(instrument);
            req.delay_ms = event.offset_ms;
            if self.synth.schedule(req).is_some() {
                scheduled += 1;
            }
        }
        scheduled
    }

    // ── licence ───────────────────────────────────────────────────

    /// Take the next step up the licence ladder.
    pub fn upgrade(&mut self) -> Result<UserType> {
        let event = match self.session.user_type {
            UserType::Free => LicenseEvent::SignupCompleted,
            UserType::Trial => LicenseEvent::PaymentSucceeded,
            UserType::Licensed => {
                return Err(WindError::InvalidTransition {
                    from: UserType::Licensed,
                    to: UserType::Licensed,
                });
            }
        };
        self.session.apply(event)
    }

    // ── persistence ───────────────────────────────────────────────

    pub fn export(&self) -> CompositionDescriptor {
        composition::export(&self.mixer)
    }

    /// Replace the mixer with an imported composition and select its first layer.
    pub fn import(&mut self, descriptor: &CompositionDescriptor) {
        self.recorder.clear();
        self.recording_layer = None;
        self.take_layer = None;
        self.mixer = composition::import(descriptor);
        self.selected = self.mixer.layers().first().map(|l| l.id);
    }

    pub fn save(&self, store: &mut dyn Storage) -> Result<()> {
        save_json(store, COMPOSITION_KEY, &self.export())?;
        save_json(store, SESSION_KEY, &self.session)?;
        Ok(())
    }

    /// Restore the stored composition, if there is one. Returns whether one was found.
    pub fn load(&mut self, store: &dyn Storage) -> Result<bool> {
        match load_json::<CompositionDescriptor>(store, COMPOSITION_KEY)? {
            Some(descriptor) => {
                self.import(&descriptor);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── ui glue ───────────────────────────────────────────────────

    pub fn handle_input(&mut self, event: InputEvent) {
        let now = Instant::now();
        match event {
            InputEvent::PlayKey(n) => {
                self.press_key_index(n as usize);
            }
            InputEvent::NextLayer => self.select_next_layer(),
            InputEvent::AddLayer => {
                if let Err(e) = self.add_layer() {
                    self.status = e.to_string();
                }
            }
            InputEvent::CycleInstrument => self.cycle_instrument(),
            InputEvent::RemoveLayer => {
                if let Some(id) = self.selected {
                    self.remove_layer(id);
                }
            }
            InputEvent::ToggleMute => {
                if let Some(id) = self.selected {
                    self.toggle_mute(id);
                }
            }
            InputEvent::ToggleSolo => {
                if let Some(id) = self.selected {
                    self.toggle_solo(id);
                }
            }
            InputEvent::LayerVolume(delta) => {
                if let Some(layer) = self.selected.and_then(|id| self.mixer.get(id)) {
                    let (id, volume) = (layer.id, layer.volume() as i32);
                    self.set_layer_volume(id, volume + delta);
                }
            }
            InputEvent::MasterVolume(delta) => {
                let volume = self.mixer.master_volume() as i32;
                self.set_master_volume(volume + delta);
            }
            InputEvent::RecordToggle => match self.recorder.state() {
                RecorderState::Idle => match self.start_recording(now) {
                    Ok(true) => self.status = "recording".into(),
                    Ok(false) => self.status = "instrument locked".into(),
                    Err(e) => {
                        tracing::warn!("could not start recording: {e}");
                        self.status = e.to_string();
                    }
                },
                _ => {
                    if let Some(take) = self.stop_recording() {
                        self.status = format!("take saved, {} notes", take.events.len());
                    }
                }
            },
            InputEvent::PauseToggle => match self.recorder.state() {
                RecorderState::Recording => self.pause_recording(now),
                RecorderState::Paused => self.resume_recording(now),
                RecorderState::Idle => {}
            },
            InputEvent::ClearRecording => {
                self.clear_recording();
                self.status = "take cleared".into();
            }
            InputEvent::PlayTake => {
                self.play_take();
            }
            InputEvent::PlayComposition => {
                let n = self.play_composition();
                self.status = format!("playing {n} notes");
            }
            InputEvent::ToggleBeautify => self.toggle_beautify(),
            InputEvent::Upgrade => match self.upgrade() {
                Ok(tier) => self.status = format!("licence is now {}", tier.label()),
                Err(e) => self.status = e.to_string(),
            },
            // export and quit need storage, the caller handles them
            InputEvent::Export | InputEvent::Quit => {}
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn display_state(&self) -> DisplayState {
        let any_solo = self.mixer.any_solo();
        let layers = self
            .mixer
            .layers()
            .iter()
            .map(|l| {
                let instrument = self.instrument_for(l);
                LayerView {
                    instrument_name: instrument
                        .map(|i| i.name.clone())
                        .unwrap_or_else(|| format!("? {}", l.instrument_id)),
                    volume: l.volume(),
                    muted: l.muted,
                    solo: l.solo,
                    audible: !l.muted && (l.solo || !any_solo),
                    locked: instrument.is_none_or(|i| self.is_locked(i)),
                    events: l.track_events.len(),
                    selected: self.selected == Some(l.id),
                    recording: self.recording_layer == Some(l.id),
                }
            })
            .collect();

        let keys = self
            .selected
            .and_then(|id| self.mixer.get(id))
            .and_then(|l| self.instrument_for(l))
            .map(|i| i.keys.clone())
            .unwrap_or_default();

        let highlighted = self.catalog.instruments().get(self.highlighted);

        DisplayState {
            layers,
            keys,
            highlighted_instrument: highlighted.map(|i| i.name.clone()).unwrap_or_default(),
            highlighted_locked: highlighted.is_some_and(|i| self.is_locked(i)),
            master_volume: self.mixer.master_volume(),
            licence: self.session.user_type.label(),
            recorder: self.recorder.state().label(),
            has_recording: self.recorder.has_recording(),
            beautify: self.beautify,
            status: self.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::{SilentSink, ToneSink};
    use crate::instrument::TimbreClass;
    use crate::persistence::MemoryStore;
    use crate::recorder::tests::FakeMic;
    use crate::recorder::SharedMicrophone;
    use crate::synth::tests::RecordingSink;
    use crate::synth::{Waveform, VIBRATO_SECS};
    use std::time::Duration;

    fn workspace(user: UserType) -> (Workspace, RecordingSink) {
        workspace_with_mic(user, None)
    }

    fn workspace_with_mic(
        user: UserType,
        mic: Option<SharedMicrophone>,
    ) -> (Workspace, RecordingSink) {
        let sink = RecordingSink::default();
        let ws = workspace_on(
            Catalog::builtin().unwrap(),
            user,
            mic,
            Box::new(sink.clone()),
        );
        (ws, sink)
    }

    fn workspace_on(
        catalog: Catalog,
        user: UserType,
        mic: Option<SharedMicrophone>,
        sink: Box<dyn ToneSink>,
    ) -> Workspace {
        Workspace::new(
            catalog,
            Session::new(user),
            Config::default(),
            Synthesizer::new(sink),
            Recorder::new(mic),
        )
    }

    // the built-in catalog plus a premium vocal instrument
    fn catalog_with_choir() -> Catalog {
        let mut instruments = Catalog::builtin().unwrap().instruments().to_vec();
        instruments.push(Instrument {
            id: "choir".into(),
            name: "Choir".into(),
            timbre: TimbreClass::Flute,
            category: Category::Vocal,
            premium: true,
            keys: vec!["C4".into(), "E4".into(), "G4".into()],
        });
        Catalog::new(instruments).unwrap()
    }

    fn buffer_gains(sink: &RecordingSink) -> Vec<f32> {
        sink.sent
            .borrow()
            .iter()
            .filter_map(|c| match c {
                AudioCommand::PlayBuffer { gain, .. } => Some(*gain),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn key_press_plays_at_mixed_amplitude() {
        let (mut ws, sink) = workspace(UserType::Free);
        let layer = ws.add_layer_with("flute").unwrap();
        assert!(ws.press_key("C5").is_some());

        let tones = sink.tones();
        assert_eq!(tones.len(), 1);
        // volume 75, master 80, flute gain scale 0.3
        assert!((tones[0].peak - 0.60 * 0.3).abs() < 1e-6);
        assert!((tones[0].frequency - 523.25).abs() < 0.01);
        assert_eq!(ws.selected_layer(), Some(layer));
    }

    #[test]
    fn premium_instrument_is_silent_for_free_users() {
        let (mut ws, sink) = workspace(UserType::Free);
        // selecting it is fine
        let layer = ws.add_layer_with("alto-sax").unwrap();
        assert_eq!(ws.selected_layer(), Some(layer));
        assert!(ws.press_key("C4").is_none());
        assert!(sink.sent.borrow().is_empty());

        ws.upgrade().unwrap();
        assert!(ws.press_key("C4").is_some());
    }

    #[test]
    fn unknown_pitch_and_muted_layer_are_silent() {
        let (mut ws, sink) = workspace(UserType::Licensed);
        let layer = ws.add_layer_with("trumpet").unwrap();
        assert!(ws.press_key("X9").is_none());
        ws.toggle_mute(layer);
        assert!(ws.press_key("C4").is_none());
        assert!(sink.sent.borrow().is_empty());
    }

    #[test]
    fn solo_on_another_layer_silences_this_one() {
        let (mut ws, _sink) = workspace(UserType::Free);
        let a = ws.add_layer_with("flute").unwrap();
        let b = ws.add_layer_with("clarinet").unwrap();
        ws.toggle_solo(b);
        let now = Instant::now();
        assert!(ws.press_key_on(a, "C5", now).is_none());
        assert!(ws.press_key_on(b, "C4", now).is_some());
    }

    #[test]
    fn keys_by_index_follow_instrument() {
        let (mut ws, sink) = workspace(UserType::Free);
        ws.add_layer_with("clarinet").unwrap();
        assert!(ws.press_key_index(5).is_some());
        assert!(ws.press_key_index(42).is_none());
        let expected = pitch::lookup("B♭3").unwrap() as f32;
        assert_eq!(sink.tones()[0].frequency, expected);
    }

    #[test]
    fn no_layer_means_no_sound() {
        let (mut ws, sink) = workspace(UserType::Licensed);
        assert!(ws.press_key("C4").is_none());
        assert!(ws.press_key_index(0).is_none());
        assert!(sink.sent.borrow().is_empty());
    }

    #[test]
    fn unknown_instrument_rejected() {
        let (mut ws, _) = workspace(UserType::Licensed);
        assert!(matches!(
            ws.add_layer_with("kazoo"),
            Err(WindError::UnknownInstrument(_))
        ));
        assert!(ws.mixer().layers().is_empty());
    }

    #[test]
    fn beautify_only_touches_vocal_instruments() {
        let (mut ws, sink) = workspace(UserType::Free);
        ws.toggle_beautify();
        ws.add_layer_with("voice").unwrap();
        ws.press_key("C4");
        ws.add_layer_with("flute").unwrap();
        ws.press_key("C5");
        let tones = sink.tones();
        assert!(tones[0].vibrato);
        assert!(!tones[1].vibrato);
        assert!(tones[0].frequency_at(VIBRATO_SECS + 0.1) == tones[0].frequency);
    }

    #[test]
    fn recording_commits_take_to_layer() {
        let (mut ws, _) = workspace(UserType::Free);
        let layer = ws.add_layer_with("flute").unwrap();
        let t0 = Instant::now();
        ws.start_recording(t0).unwrap();
        ws.press_key_on(layer, "C5", t0 + Duration::from_millis(20));
        ws.press_key_on(layer, "D5", t0 + Duration::from_millis(520));
        let take = ws.stop_recording().unwrap();
        assert_eq!(take.events.len(), 2);

        let events = &ws.mixer().get(layer).unwrap().track_events;
        assert_eq!(events[1].pitch, "D5");
        assert_eq!(events[1].offset_ms, 520);
        assert!(ws.recorder().has_recording());
        assert_eq!(ws.poll_completed_take(), Some(take));
        assert_eq!(ws.poll_completed_take(), None);
    }

    #[test]
    fn denied_keys_are_not_recorded() {
        let (mut ws, _) = workspace(UserType::Free);
        let flute = ws.add_layer_with("flute").unwrap();
        let t0 = Instant::now();
        ws.start_recording(t0).unwrap();
        ws.press_key_on(flute, "H9", t0);
        let take = ws.stop_recording().unwrap();
        assert!(take.events.is_empty());
    }

    #[test]
    fn locked_layers_do_not_record() {
        let mic = SharedMicrophone::new(FakeMic::default());
        let mut ws = workspace_on(
            catalog_with_choir(),
            UserType::Free,
            Some(mic.clone()),
            Box::new(RecordingSink::default()),
        );
        ws.add_layer_with("choir").unwrap();
        assert!(!ws.start_recording(Instant::now()).unwrap());
        assert!(!mic.is_held());
        assert_eq!(ws.recorder().state(), RecorderState::Idle);

        ws.add_layer_with("trumpet").unwrap();
        ws.handle_input(InputEvent::RecordToggle);
        assert_eq!(ws.recorder().state(), RecorderState::Idle);
        assert_eq!(ws.status(), "instrument locked");
    }

    #[test]
    fn take_audio_is_gated_after_downgrade() {
        let fake = FakeMic::default();
        let sink = RecordingSink::default();
        let mut ws = workspace_on(
            catalog_with_choir(),
            UserType::Trial,
            Some(SharedMicrophone::new(fake.clone())),
            Box::new(sink.clone()),
        );
        ws.add_layer_with("choir").unwrap();
        assert!(ws.start_recording(Instant::now()).unwrap());
        fake.push(160);
        ws.poll();
        ws.stop_recording().unwrap();
        ws.play_take();
        assert_eq!(buffer_gains(&sink).len(), 1);

        sink.sent.borrow_mut().clear();
        ws.session = Session::new(UserType::Free);
        assert_eq!(ws.play_take(), 0);
        assert!(buffer_gains(&sink).is_empty());
    }

    #[test]
    fn take_audio_follows_layer_mix() {
        let fake = FakeMic::default();
        let mic = SharedMicrophone::new(fake.clone());
        let (mut ws, sink) = workspace_with_mic(UserType::Free, Some(mic));
        let flute = ws.add_layer_with("flute").unwrap();
        let voice = ws.add_layer_with("voice").unwrap();
        ws.start_recording(Instant::now()).unwrap();
        fake.push(160);
        ws.poll();
        ws.stop_recording().unwrap();

        ws.play_take();
        let gains = buffer_gains(&sink);
        assert_eq!(gains.len(), 1);
        // layer volume 75, master 80
        assert!((gains[0] - 0.6).abs() < 1e-6);

        sink.sent.borrow_mut().clear();
        ws.toggle_mute(voice);
        ws.play_take();
        assert!(buffer_gains(&sink).is_empty());

        ws.toggle_mute(voice);
        ws.toggle_solo(flute);
        ws.play_take();
        assert!(buffer_gains(&sink).is_empty());

        ws.toggle_solo(flute);
        ws.set_layer_volume(voice, 50);
        ws.play_take();
        let gains = buffer_gains(&sink);
        assert_eq!(gains.len(), 1);
        assert!((gains[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn take_replays_on_its_own_layer() {
        let (mut ws, sink) = workspace(UserType::Free);
        let flute = ws.add_layer_with("flute").unwrap();
        let t0 = Instant::now();
        ws.start_recording(t0).unwrap();
        ws.press_key_on(flute, "C5", t0);
        ws.stop_recording().unwrap();
        ws.add_layer_with("clarinet").unwrap();

        sink.sent.borrow_mut().clear();
        assert_eq!(ws.play_take(), 1);
        let waveforms: Vec<_> = sink.tones().iter().map(|t| t.waveform).collect();
        assert_eq!(waveforms, vec![Waveform::Sine]);

        ws.remove_layer(flute);
        assert_eq!(ws.play_take(), 0);
    }

    #[test]
    fn silent_output_accepts_everything() {
        let fake = FakeMic::default();
        let mut ws = workspace_on(
            Catalog::builtin().unwrap(),
            UserType::Free,
            Some(SharedMicrophone::new(fake.clone())),
            Box::new(SilentSink { sample_rate: 44_100 }),
        );
        let voice = ws.add_layer_with("voice").unwrap();
        let t0 = Instant::now();
        ws.start_recording(t0).unwrap();
        assert!(ws.press_key_on(voice, "C4", t0).is_some());
        fake.push(160);
        ws.poll();
        ws.stop_recording().unwrap();

        assert!(ws.press_key("D4").is_some());
        assert_eq!(ws.play_take(), 1);
        assert_eq!(ws.play_composition(), 1);
    }

    #[test]
    fn vocal_layers_record_from_microphone() {
        let fake = FakeMic::default();
        let mic = SharedMicrophone::new(fake.clone());
        let (mut ws, sink) = workspace_with_mic(UserType::Free, Some(mic.clone()));
        ws.add_layer_with("voice").unwrap();
        ws.start_recording(Instant::now()).unwrap();
        assert!(mic.is_held());
        fake.push(160);
        ws.poll();
        let take = ws.stop_recording().unwrap();
        assert!(!mic.is_held());
        assert_eq!(take.audio.as_ref().unwrap().len(), 160);

        ws.play_take();
        let buffers: Vec<_> = sink
            .sent
            .borrow()
            .iter()
            .filter_map(|c| match c {
                AudioCommand::PlayBuffer { buffer, .. } => Some(buffer.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(buffers.len(), 1);
        // 16k capture resampled to the 48k sink
        assert_eq!(buffers[0].sample_rate, 48_000);
        assert_eq!(buffers[0].len(), 480);
    }

    #[test]
    fn busy_microphone_surfaces_in_status() {
        let mic = SharedMicrophone::new(FakeMic::default());
        let _other = mic.acquire().unwrap();
        let (mut ws, _) = workspace_with_mic(UserType::Free, Some(mic));
        ws.add_layer_with("voice").unwrap();
        ws.handle_input(InputEvent::RecordToggle);
        assert_eq!(ws.recorder().state(), RecorderState::Idle);
        assert_eq!(ws.status(), WindError::DeviceBusy.to_string());
    }

    #[test]
    fn composition_playback_honours_mute_solo_and_gate() {
        let (mut ws, sink) = workspace(UserType::Free);
        let t0 = Instant::now();
        for (instrument, pitch) in [("flute", "C5"), ("clarinet", "D4"), ("trumpet", "G4")] {
            let layer = ws.add_layer_with(instrument).unwrap();
            ws.start_recording(t0).unwrap();
            ws.press_key_on(layer, pitch, t0 + Duration::from_millis(100));
            ws.press_key_on(layer, pitch, t0 + Duration::from_millis(300));
            ws.stop_recording();
        }
        // trumpet is premium, its take never recorded anything
        sink.sent.borrow_mut().clear();
        assert_eq!(ws.play_composition(), 4);
        let delays: Vec<f32> = sink.tones().iter().map(|t| t.delay_secs).collect();
        assert_eq!(delays, vec![0.1, 0.3, 0.1, 0.3]);

        let flute = ws.mixer().layers()[0].id;
        ws.toggle_mute(flute);
        assert_eq!(ws.play_composition(), 2);

        let clarinet = ws.mixer().layers()[1].id;
        ws.toggle_mute(flute);
        ws.toggle_solo(flute);
        assert_eq!(ws.play_composition(), 2);
        ws.toggle_solo(clarinet);
        assert_eq!(ws.play_composition(), 4);
    }

    #[test]
    fn removing_layers_moves_selection() {
        let (mut ws, _) = workspace(UserType::Free);
        let a = ws.add_layer_with("flute").unwrap();
        let b = ws.add_layer_with("clarinet").unwrap();
        ws.remove_layer(b);
        assert_eq!(ws.selected_layer(), Some(a));
        ws.remove_layer(b);
        ws.remove_layer(a);
        assert_eq!(ws.selected_layer(), None);
    }

    #[test]
    fn removing_recording_layer_clears_take() {
        let (mut ws, _) = workspace(UserType::Free);
        let a = ws.add_layer_with("flute").unwrap();
        ws.start_recording(Instant::now()).unwrap();
        ws.remove_layer(a);
        assert_eq!(ws.recorder().state(), RecorderState::Idle);
        assert!(ws.stop_recording().is_none());
    }

    #[test]
    fn select_next_wraps() {
        let (mut ws, _) = workspace(UserType::Free);
        let a = ws.add_layer_with("flute").unwrap();
        let b = ws.add_layer_with("clarinet").unwrap();
        assert_eq!(ws.selected_layer(), Some(b));
        ws.select_next_layer();
        assert_eq!(ws.selected_layer(), Some(a));
        ws.select_next_layer();
        assert_eq!(ws.selected_layer(), Some(b));
    }

    #[test]
    fn input_events_drive_mixer() {
        let (mut ws, _) = workspace(UserType::Free);
        ws.handle_input(InputEvent::AddLayer);
        ws.handle_input(InputEvent::LayerVolume(50));
        ws.handle_input(InputEvent::MasterVolume(-200));
        ws.handle_input(InputEvent::ToggleSolo);
        let layer = &ws.mixer().layers()[0];
        assert_eq!(layer.volume(), 100);
        assert!(layer.solo);
        assert_eq!(ws.mixer().master_volume(), 0);

        ws.handle_input(InputEvent::RemoveLayer);
        assert!(ws.mixer().layers().is_empty());
    }

    #[test]
    fn save_and_load_through_storage() {
        let (mut ws, _) = workspace(UserType::Free);
        let layer = ws.add_layer_with("clarinet").unwrap();
        ws.set_layer_volume(layer, 33);
        ws.upgrade().unwrap();
        let mut store = MemoryStore::default();
        ws.save(&mut store).unwrap();

        let (mut fresh, _) = workspace(UserType::Free);
        assert!(fresh.load(&store).unwrap());
        let restored = &fresh.mixer().layers()[0];
        assert_eq!(restored.instrument_id, "clarinet");
        assert_eq!(restored.volume(), 33);
        assert_eq!(fresh.selected_layer(), Some(restored.id));

        let session: Session = load_json(&store, SESSION_KEY).unwrap().unwrap();
        assert_eq!(session.user_type, UserType::Trial);

        let (mut empty, _) = workspace(UserType::Free);
        assert!(!empty.load(&MemoryStore::default()).unwrap());
    }

    #[test]
    fn upgrade_walks_the_ladder() {
        let (mut ws, _) = workspace(UserType::Free);
        assert_eq!(ws.upgrade().unwrap(), UserType::Trial);
        assert_eq!(ws.upgrade().unwrap(), UserType::Licensed);
        assert!(ws.upgrade().is_err());
    }

    #[test]
    fn display_marks_locked_layers() {
        let (mut ws, _) = workspace(UserType::Free);
        ws.add_layer_with("flute").unwrap();
        ws.add_layer_with("tenor-sax").unwrap();
        let ds = ws.display_state();
        assert!(!ds.layers[0].locked);
        assert!(ds.layers[1].locked);
        assert!(ds.layers[1].selected);
        assert_eq!(ds.keys.len(), 10);
        assert_eq!(ds.licence, "FREE");
        assert_eq!(ds.recorder, "IDLE");
    }
}
