use anyhow::{Context, Result, bail};
use clap::Parser;
use pursuit_core::{
    EngineConfig, Position, Pursuer, TurnEngine,
    engine::EpisodeStatus,
    episode::{Episode, StepRecord},
    experiment::{ExperimentConfig, GridPreset, run_experiment},
    policy::PolicyKind,
    world::load_world_from_string,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Two pursuers chase an evasive target on a grid", long_about = None)]
struct Args {
    /// Map file to load ('.' free, '#' obstacle); overrides --preset
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// Built-in grid layout
    #[arg(long, default_value = "small")]
    preset: GridPreset,

    /// Policy used by both pursuers (random, greedy, search)
    #[arg(short, long, default_value = "search")]
    policy: PolicyKind,

    /// Round limit; defaults to the preset's limit, or 100 for map files
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Seed for reproducible runs
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of episodes to run in headless mode
    #[arg(short, long, default_value_t = 100)]
    episodes: u32,

    /// Run a batch without the terminal view and print a summary
    #[arg(long)]
    headless: bool,

    /// Print the headless summary as JSON
    #[arg(long, requires = "headless")]
    json: bool,

    /// Milliseconds between moves in the live view
    #[arg(long, default_value_t = 200)]
    tick_ms: u64,

    /// Log filter for headless mode, used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.map {
            Some(path) => {
                let map_string = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read map file {}", path.display()))?;
                let world = load_world_from_string(&map_string)
                    .with_context(|| format!("Failed to load map {}", path.display()))?;
                EngineConfig {
                    height: world.height(),
                    width: world.width(),
                    obstacles: world.obstacles(),
                    ..EngineConfig::default()
                }
            }
            None => self.preset.config(),
        };
        if let Some(max_rounds) = self.max_rounds {
            config.max_rounds = max_rounds;
        }
        Ok(config)
    }
}

struct App {
    episode: Episode,
    /// Flag to control the main loop.
    should_quit: bool,
    episodes_played: u32,
    captures: u32,
}

impl App {
    fn new(config: &EngineConfig, policy: PolicyKind, seed: Option<u64>) -> Result<Self> {
        let engine = TurnEngine::from_config(config, seed).context("Failed to build engine")?;
        let policy_seed = seed.unwrap_or_else(clock_seed);
        let mut episode = Episode::new(
            engine,
            policy.build(policy_seed.wrapping_add(1)),
            policy.build(policy_seed.wrapping_add(2)),
        );
        episode.start(seed);
        Ok(App {
            episode,
            should_quit: false,
            episodes_played: 0,
            captures: 0,
        })
    }

    /// Plays one pursuer move, if the episode is still running.
    fn tick(&mut self) -> Result<()> {
        if self.episode.is_finished() {
            return Ok(());
        }
        let record = self.episode.advance()?.copied();
        if let Some(status) = record.and_then(|r| r.status) {
            self.episodes_played += 1;
            if status == EpisodeStatus::Captured {
                self.captures += 1;
            }
        }
        Ok(())
    }

    /// Starts a new episode; the engine's generator continues its stream.
    fn restart(&mut self) {
        self.episode.start(None);
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }

    fn last_record(&self) -> Option<&StepRecord> {
        self.episode.log().last()
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.tick_ms == 0 {
        bail!("--tick-ms must be positive");
    }
    let config = args.engine_config()?;

    if args.headless {
        return run_headless(&args, config);
    }

    let mut app = App::new(&config, args.policy, args.seed)?;

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
    restore_terminal(&mut terminal)?;
    result
}

fn run_headless(args: &Args, engine: EngineConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let seed = args.seed.unwrap_or_else(clock_seed);
    info!(seed, preset = %args.preset, map = ?args.map, "headless run");
    let config = ExperimentConfig {
        engine,
        policy: args.policy,
        episodes: args.episodes,
        seed,
    };
    let result = run_experiment(&config).context("Experiment failed")?;
    let summary = result.summary;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Policy:          {}", config.policy);
        println!("Episodes:        {}", summary.episodes);
        println!("Captures:        {}", summary.captures);
        println!("Capture rate:    {:.1}%", summary.capture_rate * 100.0);
        println!("Average rounds:  {:.2}", summary.avg_rounds);
        println!("Avg reward (A):  {:.2}", summary.avg_reward_a);
        println!("Avg reward (B):  {:.2}", summary.avg_reward_b);
    }
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char('r') => app.restart(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick()?;
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Map
            Constraint::Length(7), // Status
            Constraint::Length(2), // Help
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], app);
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new("Press 'r' to restart, 'q' or 'Esc' to quit.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let engine = app.episode.engine();
    let (reward_a, reward_b) = app.episode.total_rewards();
    let (policy_a, policy_b) = app.episode.policy_names();

    let turn_line = match engine.status() {
        Some(EpisodeStatus::Captured) => {
            Line::styled("Target captured!", Style::default().fg(Color::Green).bold())
        }
        Some(EpisodeStatus::Truncated) => Line::styled(
            "Round limit reached, target escaped",
            Style::default().fg(Color::Yellow).bold(),
        ),
        None => Line::from(format!("Turn: {}", engine.turn())),
    };

    let last_action = match app.last_record() {
        Some(StepRecord {
            acting: Some(who),
            action: Some(action),
            reward,
            ..
        }) => format!("Last move: {} {:?} ({reward:+})", pursuer_label(*who), action),
        _ => "Last move: -".to_string(),
    };

    let lines = vec![
        turn_line,
        Line::from(format!(
            "Round: {}/{}",
            engine.round(),
            engine.max_rounds()
        )),
        Line::from(format!(
            "Reward A ({policy_a}): {reward_a}   Reward B ({policy_b}): {reward_b}"
        )),
        Line::from(last_action),
        Line::from(format!(
            "Episodes finished: {}   Captures: {}",
            app.episodes_played, app.captures
        )),
    ];

    let status = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}

fn pursuer_label(who: Pursuer) -> &'static str {
    match who {
        Pursuer::A => "Pursuer A",
        Pursuer::B => "Pursuer B",
    }
}

/// Renders the grid with both pursuers and the target.
fn render_map(frame: &mut Frame, area: Rect, app: &App) {
    let engine = app.episode.engine();
    let world = engine.world();
    let state = engine.state();

    let mut lines: Vec<Line> = Vec::with_capacity(world.height());
    for row in 0..world.height() {
        let mut spans: Vec<Span> = Vec::with_capacity(world.width() * 2);
        for col in 0..world.width() {
            let pos = Position::new(row, col);
            let cell = match state {
                Some(s) if s.pursuer_a == pos && s.pursuer_b == pos => {
                    Span::styled("X", Style::default().fg(Color::Magenta).bold())
                }
                Some(s) if s.pursuer_a == pos => {
                    Span::styled("1", Style::default().fg(Color::Cyan).bold())
                }
                Some(s) if s.pursuer_b == pos => {
                    Span::styled("2", Style::default().fg(Color::Blue).bold())
                }
                Some(s) if s.target == pos => {
                    Span::styled("C", Style::default().fg(Color::Red).bold())
                }
                _ if world.is_obstacle(pos) => {
                    Span::styled("#", Style::default().fg(Color::DarkGray))
                }
                _ => Span::styled(".", Style::default().fg(Color::Gray)),
            };
            spans.push(cell);
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Pursuit").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}
