use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

use windharmony::access::Session;
use windharmony::audio::{self, CpalMicrophone};
use windharmony::audio_api::{SilentSink, ToneSink};
use windharmony::config::Config;
use windharmony::instrument::Catalog;
use windharmony::persistence::{self, FileStore, Storage, SESSION_KEY};
use windharmony::recorder::{Recorder, SharedMicrophone, Take};
use windharmony::shared::InputEvent;
use windharmony::synth::Synthesizer;
use windharmony::tui;
use windharmony::workspace::Workspace;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// the terminal is in raw mode, so logs go to a file next to the project state
fn init_logging(store: &FileStore) -> anyhow::Result<()> {
    std::fs::create_dir_all(store.dir())?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(store.dir().join("windharmony.log"))
        .context("could not open log file")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let mut store = FileStore::new(&project_dir);
    init_logging(&store)?;

    let config = Config::load(&store);
    let catalog = Catalog::builtin().context("built-in instrument catalog is invalid")?;
    let session = match persistence::load_json::<Session>(&store, SESSION_KEY) {
        Ok(Some(session)) => session,
        Ok(None) => Session::new(config.user_type),
        Err(e) => {
            tracing::warn!("ignoring stored session: {e}");
            Session::new(config.user_type)
        }
    };

    // no output device means silent key presses, not a crash
    let sink: Box<dyn ToneSink> = match audio::start_audio() {
        Ok(handle) => Box::new(handle),
        Err(e) => {
            tracing::warn!("audio output unavailable, continuing silently: {e:#}");
            Box::new(SilentSink {
                sample_rate: config.sample_rate_hint,
            })
        }
    };
    let recorder = Recorder::new(Some(SharedMicrophone::new(CpalMicrophone)));
    let mut workspace = Workspace::new(catalog, session, config, Synthesizer::new(sink), recorder);
    match workspace.load(&store) {
        Ok(true) => tracing::info!("restored composition from {}", project_dir.display()),
        Ok(false) => {}
        Err(e) => tracing::warn!("ignoring stored composition: {e}"),
    }

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let blink_start = Instant::now();

    loop {
        let blink_on = (blink_start.elapsed().as_millis() / 250) % 2 == 0;
        workspace.poll();
        let ds = workspace.display_state();

        term.draw(|frame| {
            let area = frame.area();
            tui::view::render(frame, area, &ds, blink_on);
        })?;

        for event in tui::input::poll_input(tick_rate)? {
            match event {
                InputEvent::Quit => {
                    workspace.stop_recording();
                    if let Some(take) = workspace.poll_completed_take() {
                        save_take(&project_dir, &take);
                    }
                    if let Err(e) = workspace.save(&mut store) {
                        tracing::warn!("could not save project: {e}");
                    }
                    drop(term);
                    return Ok(());
                }
                InputEvent::Export => match export(&project_dir, &mut store, &workspace) {
                    Ok(path) => workspace.set_status(format!("exported {}", path.display())),
                    Err(e) => {
                        tracing::warn!("export failed: {e:#}");
                        workspace.set_status("export failed");
                    }
                },
                other => workspace.handle_input(other),
            }
        }

        // a take just finished; keep any microphone audio next to the project
        if let Some(take) = workspace.poll_completed_take() {
            save_take(&project_dir, &take);
        }
    }
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn save_take(project_dir: &Path, take: &Take) {
    let Some(audio) = take.audio.as_ref().filter(|a| !a.is_empty()) else {
        return;
    };
    let path = project_dir.join(format!("take-{}.wav", timestamp()));
    match audio.write_wav(&path) {
        Ok(()) => tracing::info!("saved take to {}", path.display()),
        Err(e) => tracing::warn!("could not save take: {e}"),
    }
}

// saves into the project store and also writes a standalone copy for sharing
fn export(
    project_dir: &Path,
    store: &mut dyn Storage,
    workspace: &Workspace,
) -> anyhow::Result<PathBuf> {
    workspace.save(store)?;
    let descriptor = workspace.export();
    let path = project_dir.join(format!("composition-{}.json", descriptor.timestamp));
    std::fs::write(&path, descriptor.to_json()?)?;
    Ok(path)
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
