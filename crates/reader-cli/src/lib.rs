use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reader_core::{
    compute_window, AutoNavTick, AutoNavigator, InMemoryCollection, ReadNextCandidates,
    ReadNextCountdown, ReadNextTick, ReaderDriver, ReaderSession, ReaderSettings, RecordingSink,
    SessionConfig,
};
use reader_model::{
    keys, CollectionId, ImageSize, ItemFit, Page, PageId, ReaderPreferences, ReadingDirection,
    Scaling,
};
use reader_storage::Storage;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DATA_DIR_ENV: &str = "READER_DATA_DIR";

#[derive(Debug, Parser)]
#[command(name = "reader-cli")]
#[command(about = "Paged reader windowing tools")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the local window indices for a focus position.
    Window {
        #[arg(long, allow_hyphen_values = true)]
        focus: isize,
        #[arg(long)]
        size: usize,
        #[arg(long, allow_hyphen_values = true)]
        max: isize,
        #[arg(long, default_value_t = 0)]
        start: isize,
    },
    /// Run a reading session against an in-memory collection.
    Simulate {
        #[arg(long, conflicts_with = "collection")]
        pages: Option<u32>,
        /// JSON file with a `pages` array.
        #[arg(long, value_name = "FILE")]
        collection: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        start_page: u32,
        #[arg(long)]
        window: Option<usize>,
        #[arg(long)]
        remote_window: Option<usize>,
        /// Number of single-page focus moves after the session starts.
        #[arg(long, default_value_t = 0)]
        walk: u32,
        #[arg(long)]
        goto: Option<u32>,
        /// Page ids that never return a profile.
        #[arg(long, value_delimiter = ',')]
        broken: Vec<u64>,
        #[arg(long, default_value_t = 0)]
        failing_slices: u32,
        /// `auto` or an image size code; defaults to the stored preference.
        #[arg(long)]
        scaling: Option<String>,
        /// Seconds of auto-navigation and read-next countdown to run.
        #[arg(long, default_value_t = 0)]
        auto_ticks: u32,
        /// Advance pages automatically even if the stored preference is off.
        #[arg(long)]
        auto_navigate: bool,
        /// Collection opened once the countdown at the end expires.
        #[arg(long, value_name = "ID")]
        read_next: Option<u64>,
        /// Read preferences from this directory instead of the defaults.
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },
    /// Inspect or change persisted reader preferences.
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
        #[arg(long, global = true, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum PrefsAction {
    Show,
    Set { key: String, value: String },
    Reset,
}

#[derive(Debug, Deserialize)]
struct CollectionFile {
    pages: Vec<Page>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    page_count: u32,
    final_page: u32,
    window_numbers: Vec<u32>,
    slice_fetches: u32,
    profile_batches: u32,
    failures: u32,
    read_events: u32,
    missing_profiles: Vec<u32>,
    auto_advances: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    read_next: Option<u64>,
}

struct SimulateArgs {
    pages: Option<u32>,
    collection: Option<PathBuf>,
    start_page: u32,
    window: Option<usize>,
    remote_window: Option<usize>,
    walk: u32,
    goto: Option<u32>,
    broken: Vec<u64>,
    failing_slices: u32,
    scaling: Option<String>,
    auto_ticks: u32,
    auto_navigate: bool,
    read_next: Option<u64>,
    data_dir: Option<PathBuf>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Window { focus, size, max, start } => {
            let window = compute_window(focus, size, max, start);
            println!("{}", serde_json::to_string(&window)?);
            Ok(())
        }
        Commands::Simulate {
            pages,
            collection,
            start_page,
            window,
            remote_window,
            walk,
            goto,
            broken,
            failing_slices,
            scaling,
            auto_ticks,
            auto_navigate,
            read_next,
            data_dir,
        } => run_simulate(SimulateArgs {
            pages,
            collection,
            start_page,
            window,
            remote_window,
            walk,
            goto,
            broken,
            failing_slices,
            scaling,
            auto_ticks,
            auto_navigate,
            read_next,
            data_dir,
        }),
        Commands::Prefs { action, data_dir } => run_prefs(action, data_dir.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_simulate(args: SimulateArgs) -> Result<()> {
    let collection = match (args.pages, args.collection.as_deref()) {
        (Some(count), _) => InMemoryCollection::new(count),
        (None, Some(path)) => load_collection(path)?,
        (None, None) => anyhow::bail!("either --pages or --collection is required"),
    };
    let collection = collection
        .with_broken(args.broken.into_iter().map(PageId))
        .with_failing_slices(args.failing_slices);

    let preferences = match args.data_dir.as_deref() {
        Some(dir) => {
            Storage::with_root(dir).load_preferences().context("failed to load preferences")?
        }
        None => ReaderPreferences::default(),
    };

    let mut config = SessionConfig::from_env()
        .context("invalid reader configuration in environment")?
        .with_start_page(args.start_page)
        .with_scaling(preferences.scaling);
    config.collection_id = CollectionId(1);
    if let Some(size) = args.window {
        config = config.with_window_size(size);
    }
    if let Some(size) = args.remote_window {
        config = config.with_remote_window_size(size);
    }
    if let Some(raw) = args.scaling.as_deref() {
        config = config.with_scaling(parse_scaling(raw)?);
    }

    let session = ReaderSession::new(config).context("invalid session configuration")?;
    let sink = RecordingSink::new();
    let mut driver = ReaderDriver::new(session, &collection, &collection, &sink);

    driver.start();
    for _ in 0..args.walk {
        let next = driver.session().focus() + 1;
        driver.focus_child(next);
    }
    if let Some(number) = args.goto {
        driver.go_to_page(number);
    }

    let mut navigator = AutoNavigator::new(preferences.auto_navigate_interval);
    navigator.set_enabled(preferences.auto_navigate || args.auto_navigate);
    let candidates =
        ReadNextCandidates { chapter: args.read_next.map(CollectionId), ..Default::default() };
    let mut countdown = ReadNextCountdown::new(preferences.auto_read_next_countdown, candidates);

    let mut auto_advances = 0;
    let mut read_next = None;
    for _ in 0..args.auto_ticks {
        if let AutoNavTick::Advance(_) = driver.auto_navigate(&mut navigator, false) {
            auto_advances += 1;
        }
        if let ReadNextTick::Navigate(_, collection_id) = driver.read_next(&mut countdown) {
            read_next = Some(collection_id.0);
            break;
        }
    }

    let stats = driver.stats();
    let session = driver.session();
    let report = SimulationReport {
        page_count: session.page_count(),
        final_page: session.page_number(),
        window_numbers: session.rendered_pages().map(|page| page.number).collect(),
        slice_fetches: stats.slice_fetches,
        profile_batches: stats.profile_batches,
        failures: stats.failures(),
        read_events: stats.read_events,
        missing_profiles: session
            .rendered_pages()
            .filter(|page| !page.has_profile())
            .map(|page| page.number)
            .collect(),
        auto_advances,
        read_next,
    };

    info!(read_events = sink.events().len(), "simulation finished");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load_collection(path: &Path) -> Result<InMemoryCollection> {
    if !path.is_file() {
        anyhow::bail!("collection file does not exist: {}", path.display());
    }

    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file: CollectionFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("invalid collection file {}", path.display()))?;

    debug!(pages = file.pages.len(), "loaded collection file");
    Ok(InMemoryCollection::from_pages(file.pages))
}

fn run_prefs(action: PrefsAction, data_dir: Option<&Path>) -> Result<()> {
    let storage = resolve_storage(data_dir)?;
    let settings = storage.settings().context("failed to open reader state")?;

    match action {
        PrefsAction::Show => {}
        PrefsAction::Set { key, value } => apply_preference(&settings, &key, &value)?,
        PrefsAction::Reset => settings.apply(&ReaderPreferences::default()),
    }

    println!("{}", serde_json::to_string_pretty(&settings.snapshot())?);
    Ok(())
}

fn resolve_storage(data_dir: Option<&Path>) -> Result<Storage> {
    if let Some(dir) = data_dir {
        return Ok(Storage::with_root(dir));
    }

    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(Storage::with_root(dir));
    }

    Storage::from_default_project().context("failed to resolve data directory")
}

fn apply_preference(settings: &ReaderSettings, key: &str, value: &str) -> Result<()> {
    match key {
        keys::FIT => settings.fit.set(value.parse::<ItemFit>().map_err(anyhow::Error::msg)?),
        keys::SCALING => settings.scaling.set(parse_scaling(value)?),
        keys::NAVIGATE_INTERVAL => settings.auto_navigate_interval.set(parse_number(key, value)?),
        keys::READ_NEXT_COUNTDOWN => {
            settings.auto_read_next_countdown.set(parse_number(key, value)?)
        }
        keys::AUTO_NAVIGATE => settings.auto_navigate.set(parse_flag(key, value)?),
        keys::STRETCH_FIT => settings.stretch_fit.set(parse_flag(key, value)?),
        keys::WHEEL_ZOOM => settings.wheel_zoom.set(parse_flag(key, value)?),
        keys::DIRECTION => {
            settings.direction.set(value.parse::<ReadingDirection>().map_err(anyhow::Error::msg)?)
        }
        other => anyhow::bail!(
            "unknown preference `{other}`, expected one of: {}",
            keys::ALL.join(", ")
        ),
    }
    Ok(())
}

fn parse_scaling(raw: &str) -> Result<Scaling> {
    if raw.eq_ignore_ascii_case("auto") {
        return Ok(Scaling::Auto);
    }

    let code: u8 = raw.parse().with_context(|| format!("invalid scaling `{raw}`"))?;
    ImageSize::from_code(code)
        .map(Scaling::Fixed)
        .with_context(|| format!("unknown image size code {code}"))
}

fn parse_number(key: &str, raw: &str) -> Result<u32> {
    raw.parse().with_context(|| format!("{key} expects a whole number of seconds"))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    raw.parse().with_context(|| format!("{key} expects true or false"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_accepts_auto_and_size_codes() {
        assert_eq!(parse_scaling("auto").expect("auto"), Scaling::Auto);
        assert_eq!(parse_scaling("13").expect("code"), Scaling::Fixed(ImageSize::X960));
        assert!(parse_scaling("99").is_err());
        assert!(parse_scaling("large").is_err());
    }

    #[test]
    fn unknown_preference_key_is_rejected() {
        use reader_core::{KeyValueStore, MemoryStore};
        use std::rc::Rc;

        let store: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
        let settings = ReaderSettings::load(store);

        let error = apply_preference(&settings, "reader_speed", "3").expect_err("should fail");
        assert!(error.to_string().contains("reader_fit"));

        apply_preference(&settings, keys::WHEEL_ZOOM, "true").expect("valid flag");
        assert!(settings.wheel_zoom.get());
    }
}
