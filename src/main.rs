use std::{
    fs::File,
    io::{self, stdin},
    path::{Path, PathBuf},
    rc::Rc,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use lyrictype::{
    app::{App, BackendFactory},
    app_dirs::AppDirs,
    catalog::{BundledCatalog, FileCatalog, HttpCatalog, SongCatalog},
    config::{CatalogSource, Config, ConfigStore, FileConfigStore},
    loader::Loader,
    logging,
    notice::Notice,
    playback::{AudioBackend, SilentBackend},
    runtime::{AppEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker, TICK_RATE_MS},
    store::{ProgressDb, ProgressStore},
};

/// type along to song lyrics in your terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing game: type song lyrics line by line while the preview plays, with live speed and accuracy, timed sessions and saved progress."
)]
pub struct Cli {
    /// id of the song to start typing right away
    #[clap(long, conflicts_with_all = ["query", "random"])]
    song: Option<String>,

    /// search the catalog on startup
    #[clap(short = 'q', long, conflicts_with = "random")]
    query: Option<String>,

    /// start with a random bundled song
    #[clap(long)]
    random: bool,

    /// name to save progress under
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// number of seconds to run a timed session
    #[clap(short = 's', long, value_parser = clap::value_parser!(u32).range(1..))]
    countdown: Option<u32>,

    /// where songs come from
    #[clap(long, value_enum)]
    catalog: Option<CatalogSource>,

    /// JSON file of tracks for the file catalog
    #[clap(long)]
    catalog_path: Option<PathBuf>,

    /// base URL of the remote song service
    #[clap(long)]
    catalog_url: Option<String>,

    /// never play song previews
    #[clap(long)]
    no_audio: bool,

    /// store the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,

    /// write the user's completed sessions to a CSV file and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,
}

impl Cli {
    /// Layer command line flags over the stored configuration
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(user) = &self.user {
            cfg.user = Some(user.clone());
        }
        if let Some(secs) = self.countdown {
            cfg.countdown_secs = Some(secs);
        }
        if let Some(catalog) = self.catalog {
            cfg.catalog = catalog;
        }
        if let Some(path) = &self.catalog_path {
            cfg.catalog_path = Some(path.clone());
            if self.catalog.is_none() {
                cfg.catalog = CatalogSource::File;
            }
        }
        if let Some(url) = &self.catalog_url {
            cfg.catalog_url = Some(url.clone());
            if self.catalog.is_none() && self.catalog_path.is_none() {
                cfg.catalog = CatalogSource::Http;
            }
        }
        if self.no_audio {
            cfg.audio = false;
        }
        cfg
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = AppDirs::log_path() {
        logging::init_file_logging(&path);
    }

    let config_store = FileConfigStore::new();
    let cfg = cli.apply(config_store.load());
    if cli.save_config {
        config_store
            .save(&cfg)
            .with_context(|| format!("saving config to {}", config_store.path().display()))?;
    }

    if let Some(path) = &cli.export_csv {
        return export_csv(&cfg, path);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut notices = Vec::new();
    let catalog = build_catalog(&cfg, &mut notices)?;
    let store = open_store(&mut notices)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let event_source = CrosstermEventSource::new();
    let fetch_previews = cfg.audio && cfg!(feature = "audio");
    let loader = Loader::new(catalog, event_source.sender(), fetch_previews);
    let mut app = App::new(
        loader,
        store,
        cfg.user.clone(),
        cfg.countdown_secs,
        backend_factory(cfg.audio),
    );
    app.notices.extend(notices);
    open_start_screen(&cli, &cfg, &mut app);

    tracing::info!(catalog = %cfg.catalog, user = ?cfg.user, "starting");
    let runner = Runner::new(
        event_source,
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = run_app(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: Backend, E: AppEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<()> {
    let mut last = Instant::now();
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        let event = runner.step();
        let now = Instant::now();
        app.advance(now.duration_since(last));
        last = now;

        app.handle_event(event);
        if app.should_quit() {
            return Ok(());
        }
    }
}

fn build_catalog(cfg: &Config, notices: &mut Vec<Notice>) -> Result<Arc<dyn SongCatalog>> {
    let fallback_reason = match cfg.catalog {
        CatalogSource::Bundled => None,
        CatalogSource::File => match &cfg.catalog_path {
            Some(path) => match FileCatalog::open(path) {
                Ok(catalog) => return Ok(Arc::new(catalog)),
                Err(err) => Some(format!("Could not read {}: {err}", path.display())),
            },
            None => Some("No catalog file configured".to_string()),
        },
        CatalogSource::Http => match &cfg.catalog_url {
            Some(url) => return Ok(Arc::new(HttpCatalog::new(url.clone()))),
            None => Some("No catalog URL configured".to_string()),
        },
    };

    if let Some(reason) = fallback_reason {
        tracing::warn!("{reason}, falling back to bundled songs");
        notices.push(Notice::warning(format!("{reason}, using bundled songs")));
    }
    Ok(Arc::new(
        BundledCatalog::new().context("loading bundled songs")?,
    ))
}

/// The progress database, or an in-memory one when it cannot be opened
fn open_store(notices: &mut Vec<Notice>) -> Result<Rc<dyn ProgressStore>> {
    let db = match ProgressDb::open_default() {
        Ok(db) => db,
        Err(err) => {
            tracing::error!("opening progress database failed: {err}");
            notices.push(Notice::error(format!(
                "Progress database unavailable ({err}), nothing is kept after this run"
            )));
            ProgressDb::open_in_memory().context("opening in-memory progress database")?
        }
    };
    Ok(Rc::new(db))
}

#[cfg(feature = "audio")]
fn device_backend() -> Box<dyn AudioBackend> {
    match lyrictype::playback::RodioBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            tracing::warn!("audio device unavailable: {err}");
            Box::new(SilentBackend)
        }
    }
}

#[cfg(not(feature = "audio"))]
fn device_backend() -> Box<dyn AudioBackend> {
    tracing::debug!("built without audio support");
    Box::new(SilentBackend)
}

fn backend_factory(audio: bool) -> BackendFactory {
    if audio {
        Box::new(device_backend)
    } else {
        Box::new(|| Box::new(SilentBackend) as Box<dyn AudioBackend>)
    }
}

fn open_start_screen(cli: &Cli, cfg: &Config, app: &mut App) {
    if let Some(song) = &cli.song {
        app.open_song(song);
    } else if cli.random {
        if cfg.catalog != CatalogSource::Bundled {
            app.notices
                .push(Notice::warning("--random only picks from the bundled songs"));
            return;
        }
        match BundledCatalog::new() {
            Ok(bundled) => {
                if let Some(track) = bundled.random() {
                    app.open_song(&track.spotify_id);
                }
            }
            Err(err) => app
                .notices
                .push(Notice::error(format!("Could not load bundled songs: {err}"))),
        }
    } else if let Some(query) = &cli.query {
        app.start_search(query);
    }
}

fn export_csv(cfg: &Config, path: &Path) -> Result<()> {
    let Some(user) = cfg.user.as_deref() else {
        bail!("--export-csv needs a user, pass --user or set one in the config");
    };
    let db = ProgressDb::open_default().context("opening progress database")?;
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let rows = db.export_csv(user, file)?;
    println!("exported {rows} sessions for {user} to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["lyrictype"]);

        assert_eq!(cli.song, None);
        assert_eq!(cli.query, None);
        assert!(!cli.random);
        assert_eq!(cli.countdown, None);
        assert!(!cli.no_audio);
        assert!(!cli.save_config);
        assert_eq!(cli.export_csv, None);
    }

    #[test]
    fn test_cli_countdown() {
        let cli = Cli::parse_from(["lyrictype", "-s", "60"]);
        assert_eq!(cli.countdown, Some(60));

        let cli = Cli::parse_from(["lyrictype", "--countdown", "120"]);
        assert_eq!(cli.countdown, Some(120));

        assert!(Cli::try_parse_from(["lyrictype", "--countdown", "0"]).is_err());
    }

    #[test]
    fn test_cli_song_conflicts_with_query() {
        assert!(Cli::try_parse_from(["lyrictype", "--song", "x", "--query", "y"]).is_err());
        assert!(Cli::try_parse_from(["lyrictype", "--song", "x", "--random"]).is_err());
    }

    #[test]
    fn test_cli_catalog_value_enum() {
        let cli = Cli::parse_from(["lyrictype", "--catalog", "http"]);
        assert_eq!(cli.catalog, Some(CatalogSource::Http));
        assert!(Cli::try_parse_from(["lyrictype", "--catalog", "ftp"]).is_err());
    }

    #[test]
    fn test_apply_overrides_config() {
        let stored = Config {
            user: Some("stored".into()),
            countdown_secs: Some(30),
            ..Config::default()
        };
        let cli = Cli::parse_from(["lyrictype", "-u", "ada", "--no-audio"]);
        let cfg = cli.apply(stored);

        assert_eq!(cfg.user.as_deref(), Some("ada"));
        assert_eq!(cfg.countdown_secs, Some(30));
        assert!(!cfg.audio);
        assert_eq!(cfg.catalog, CatalogSource::Bundled);
    }

    #[test]
    fn test_apply_catalog_path_implies_file_catalog() {
        let cli = Cli::parse_from(["lyrictype", "--catalog-path", "songs.json"]);
        let cfg = cli.apply(Config::default());
        assert_eq!(cfg.catalog, CatalogSource::File);
        assert_eq!(cfg.catalog_path, Some(PathBuf::from("songs.json")));

        let cli = Cli::parse_from(["lyrictype", "--catalog-url", "https://songs.example"]);
        let cfg = cli.apply(Config::default());
        assert_eq!(cfg.catalog, CatalogSource::Http);

        let cli = Cli::parse_from([
            "lyrictype",
            "--catalog",
            "bundled",
            "--catalog-url",
            "https://songs.example",
        ]);
        assert_eq!(cli.apply(Config::default()).catalog, CatalogSource::Bundled);
    }

    #[test]
    fn test_build_catalog_falls_back_to_bundled() {
        let mut notices = Vec::new();
        let cfg = Config {
            catalog: CatalogSource::File,
            catalog_path: Some(PathBuf::from("/definitely/not/here.json")),
            ..Config::default()
        };
        let catalog = build_catalog(&cfg, &mut notices).unwrap();
        assert_eq!(notices.len(), 1);
        assert!(!catalog.search("grace").unwrap().is_empty());

        let mut notices = Vec::new();
        build_catalog(&Config::default(), &mut notices).unwrap();
        assert!(notices.is_empty());
    }
}
