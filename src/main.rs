pub mod ui;

use crate::ui::{charting::format_hms, ui};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use learnclock::{
    app_dirs::AppDirs,
    clock::{Epoch, SystemClock},
    config::{BoundaryMode, Config, ConfigStore, FileConfigStore, StoreBackend},
    countdown::StartOutcome,
    history::Ledger,
    report::{export_csv, summarize, ReportWriter},
    runtime::{AppEvent, AppEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker},
    store::{JsonFileStore, KeyValueStore, SqliteStore},
    Confirmation, Tracker, TrackerError, TrackerEvent,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, File, OpenOptions},
    io::{self, stdin, Write},
    path::{Path, PathBuf},
    process,
    sync::Mutex,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const BANNER_SECS: f64 = 5.0;
const INVALID_DURATION: &str = "Please enter a valid number for duration in hours.";

/// track daily learning time with goal countdowns
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal learning-hours tracker: a session clock that rolls over at midnight into a per-day history, plus named countdown timers toward daily goals."
)]
pub struct Cli {
    /// roll the day over every --interval-secs instead of at midnight
    #[clap(long)]
    test_mode: bool,

    /// length of a test-mode cycle in seconds
    #[clap(long)]
    interval_secs: Option<u64>,

    /// where records are kept
    #[clap(long, value_enum)]
    backend: Option<StoreBackend>,

    /// directory holding db/, reports/, the log and config.json
    #[clap(long)]
    data_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// print the learning history with a summary
    History,
    /// list countdown timers
    Goals,
    /// add a countdown timer
    AddGoal {
        name: String,
        /// goal duration in hours
        hours: String,
    },
    /// write every ledger to a CSV file
    Export { path: PathBuf },
}

impl Cli {
    /// Applies command line overrides on top of the stored config.
    fn apply(&self, mut config: Config) -> Config {
        if self.test_mode {
            config.boundary = BoundaryMode::Interval;
        }
        if let Some(secs) = self.interval_secs {
            config.interval_secs = secs;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        config
    }

    fn dirs(&self) -> Option<AppDirs> {
        match &self.data_dir {
            Some(dir) => Some(AppDirs::at(dir)),
            None => AppDirs::resolve(),
        }
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.data_dir {
            Some(dir) => FileConfigStore::with_path(dir.join("config.json")),
            None => FileConfigStore::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Tracking,
    History,
    AddGoal,
    ConfirmDelete(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Name,
    Hours,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalForm {
    pub name: String,
    pub hours: String,
    pub focus: FormField,
    pub error: Option<String>,
}

impl GoalForm {
    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Name => &mut self.name,
            FormField::Hours => &mut self.hours,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FormField::Name => FormField::Hours,
            FormField::Hours => FormField::Name,
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub text: String,
    pub until: Epoch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    pub tracker: Tracker,
    pub state: AppState,
    pub selected: usize,
    pub form: GoalForm,
    pub banner: Option<Banner>,
}

impl App {
    pub fn new(tracker: Tracker) -> Self {
        let mut app = Self {
            tracker,
            state: AppState::Tracking,
            selected: 0,
            form: GoalForm::default(),
            banner: None,
        };
        // a day finalized while opening
        app.absorb_events();
        app
    }

    /// Runs due timer jobs and turns their events into a banner.
    pub fn on_tick(&mut self) {
        self.tracker.wake();
        self.absorb_events();
        if self
            .banner
            .as_ref()
            .is_some_and(|b| self.tracker.now() > b.until)
        {
            self.banner = None;
        }
    }

    fn absorb_events(&mut self) {
        for event in self.tracker.drain_events() {
            let text = match event {
                TrackerEvent::GoalReached { name } => {
                    format!("{name} countdown has finished and goal achieved!")
                }
                TrackerEvent::DayFinalized { label, seconds, .. } => {
                    format!("{label} finalized: {:.2} learning hours", seconds / 3600.0)
                }
                TrackerEvent::PersistenceFailed { entity } => {
                    format!("Could not save {entity}; changes are kept in memory")
                }
            };
            self.notify(text);
        }
    }

    fn notify(&mut self, text: String) {
        self.banner = Some(Banner {
            text,
            until: self.tracker.now() + BANNER_SECS,
        });
    }

    pub fn selected_name(&self) -> Option<String> {
        self.tracker
            .countdowns()
            .get(self.selected)
            .map(|c| c.name().to_string())
    }

    fn clamp_selection(&mut self) {
        self.selected = self
            .selected
            .min(self.tracker.countdowns().len().saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        let flow = match self.state.clone() {
            AppState::Tracking => self.on_tracking_key(key),
            AppState::History => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('b') => {
                        self.state = AppState::Tracking
                    }
                    KeyCode::Char('q') => return Flow::Quit,
                    _ => {}
                }
                Flow::Continue
            }
            AppState::AddGoal => {
                self.on_form_key(key);
                Flow::Continue
            }
            AppState::ConfirmDelete(name) => {
                self.on_confirm_key(&name, key);
                Flow::Continue
            }
        };
        self.absorb_events();
        flow
    }

    fn on_tracking_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Char('s') => {
                self.tracker.start_session();
            }
            KeyCode::Char('p') => {
                self.tracker.pause_session();
            }
            KeyCode::Char('l') => {
                self.tracker.lap();
            }
            KeyCode::Char('r') => self.tracker.reset_session(),
            KeyCode::Char('h') => self.state = AppState::History,
            KeyCode::Char('a') => {
                self.form = GoalForm::default();
                self.state = AppState::AddGoal;
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                self.selected += 1;
                self.clamp_selection();
            }
            KeyCode::Enter => {
                if let Some(name) = self.selected_name() {
                    let running = self
                        .tracker
                        .countdown(&name)
                        .is_some_and(|c| c.is_running());
                    let result = if running {
                        self.tracker.pause_countdown(&name).map(|_| ())
                    } else {
                        self.tracker.start_countdown(&name).map(|outcome| {
                            if outcome == StartOutcome::Ignored {
                                info!(%name, "start ignored");
                            }
                        })
                    };
                    if let Err(e) = result {
                        self.notify(e.to_string());
                    }
                }
            }
            KeyCode::Char('x') => {
                if let Some(name) = self.selected_name() {
                    if let Err(e) = self.tracker.reset_countdown(&name) {
                        self.notify(e.to_string());
                    }
                }
            }
            KeyCode::Char('d') => {
                if let Some(name) = self.selected_name() {
                    self.state = AppState::ConfirmDelete(name);
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.form = GoalForm::default();
                self.state = AppState::Tracking;
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.form.toggle_focus()
            }
            KeyCode::Backspace => {
                self.form.focused_mut().pop();
            }
            KeyCode::Char(c) => self.form.focused_mut().push(c),
            KeyCode::Enter => {
                match self.tracker.add_countdown(&self.form.name, &self.form.hours) {
                    Ok(()) => {
                        self.selected = self.tracker.countdowns().len().saturating_sub(1);
                        self.form = GoalForm::default();
                        self.state = AppState::Tracking;
                    }
                    Err(TrackerError::InvalidGoalDuration(_)) => {
                        self.form.error = Some(INVALID_DURATION.to_string());
                        self.form.focus = FormField::Hours;
                    }
                    Err(e) => self.form.error = Some(e.to_string()),
                }
            }
            _ => {}
        }
    }

    fn on_confirm_key(&mut self, name: &str, key: KeyEvent) {
        let confirmation = match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Confirmation::Confirmed,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Confirmation::Declined,
            _ => return,
        };
        if let Err(e) = self.tracker.delete_countdown(name, confirmation) {
            self.notify(e.to_string());
        }
        self.state = AppState::Tracking;
        self.clamp_selection();
    }
}

fn open_tracker(config: Config, dirs: &AppDirs) -> Result<Tracker, Box<dyn Error>> {
    let store: Box<dyn KeyValueStore> = match config.backend {
        StoreBackend::Json => Box::new(JsonFileStore::new(dirs.db_dir())),
        StoreBackend::Sqlite => Box::new(SqliteStore::open(dirs.sqlite_path())?),
    };
    let reporter = ReportWriter::new(dirs.report_dir(), config.reports_to_keep);
    Ok(Tracker::open(config, Box::new(SystemClock), store, reporter))
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// The TUI owns the terminal, so logs go to a file.
fn init_file_tracing(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("learnclock=info"))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn init_stderr_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("learnclock=warn"))
        .with_writer(io::stderr)
        .init();
}

fn print_history<W: Write>(ledger: &Ledger, out: &mut W) -> io::Result<()> {
    if ledger.is_empty() {
        return writeln!(out, "No finished days yet");
    }
    for (label, seconds) in ledger.iter() {
        writeln!(out, "{label:<20} {:>7.2} h  {:>8.0} s", seconds / 3600.0, seconds)?;
    }
    let summary = summarize(ledger);
    if let (Some(mean), Some(sd)) = (summary.mean_hours, summary.std_dev_hours) {
        writeln!(
            out,
            "{} days, {:.2} h total, {:.2} h mean, {:.2} sd",
            summary.days, summary.total_hours, mean, sd
        )?;
    }
    Ok(())
}

fn print_goals<W: Write>(tracker: &Tracker, out: &mut W) -> io::Result<()> {
    if tracker.countdowns().is_empty() {
        return writeln!(out, "No countdown timers");
    }
    let now = tracker.now();
    for c in tracker.countdowns() {
        let mode = if c.test_mode() { "  (test mode)" } else { "" };
        writeln!(
            out,
            "{:<20} goal {:>6.2} h  remaining {}  today {}{mode}",
            c.name(),
            c.goal_seconds() / 3600.0,
            format_hms(c.current_remaining(now)),
            format_hms(c.daily_max_progress()),
        )?;
    }
    Ok(())
}

fn run_command(command: &Command, config: Config, dirs: &AppDirs) -> Result<(), Box<dyn Error>> {
    let mut tracker = open_tracker(config, dirs)?;
    let mut out = io::stdout().lock();

    match command {
        Command::History => print_history(tracker.history(), &mut out)?,
        Command::Goals => print_goals(&tracker, &mut out)?,
        Command::AddGoal { name, hours } => {
            tracker.add_countdown(name, hours)?;
            writeln!(out, "Added countdown {name}")?;
        }
        Command::Export { path } => {
            let ledgers: Vec<(&str, &Ledger)> = tracker
                .countdowns()
                .iter()
                .map(|c| (c.name(), c.history()))
                .collect();
            export_csv(File::create(path)?, tracker.history(), &ledgers)?;
            writeln!(out, "Wrote {}", path.display())?;
        }
    }

    for event in tracker.drain_events() {
        if let TrackerEvent::PersistenceFailed { entity } = event {
            return Err(format!("could not save {entity}").into());
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_store = cli.config_store();
    let stored = config_store.load();
    let config = cli.apply(stored.clone());
    let dirs = cli.dirs().ok_or("could not resolve a data directory")?;

    if let Some(command) = &cli.command {
        init_stderr_tracing();
        if let Err(e) = run_command(command, config, &dirs) {
            eprintln!("error: {e}");
            process::exit(1);
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    fs::create_dir_all(dirs.data_dir())?;
    init_file_tracing(&dirs.log_path())?;
    if !config_store.path().exists() {
        if let Err(e) = config_store.save(&stored) {
            warn!(error = %e, "could not write default config");
        }
    }

    let mut app = App::new(open_tracker(config.clone(), &dirs)?);
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(config.refresh_interval()),
    );

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);
    app.tracker.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: AppEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;

        let flow = match runner.step_within(app.tracker.until_next_job()) {
            AppEvent::Key(key) => app.handle_key(key),
            AppEvent::Resize | AppEvent::Tick => Flow::Continue,
        };
        if flow == Flow::Quit {
            break;
        }
        // keys can arrive faster than the next deadline
        app.on_tick();
    }
    Ok(())
}
