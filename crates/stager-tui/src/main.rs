mod app;
mod ui;

use std::{
    fs::File,
    io::{self, Stdout},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use env_logger::{Env, Target};
use log::info;
use ratatui::{prelude::CrosstermBackend, Terminal};
use stager_lib::{config::Config, MetadataIndex, Session};

#[derive(Parser)]
#[command(
    name = "stager-tui",
    version,
    about = "Browse precomputed sleep segment charts and assign stages"
)]
struct Cli {
    /// Session config (defaults to ./stager.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Metadata index JSON produced by the figure pipeline
    #[arg(long)]
    metadata: Option<PathBuf>,
    #[arg(long)]
    figures_dir: Option<PathBuf>,
    /// Default path offered by the import/export prompts
    #[arg(long)]
    annotations: Option<PathBuf>,
    /// Write logs here; the terminal is owned by the UI
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(path) = &cli.log_file {
        let file = File::create(path)
            .with_context(|| format!("creating log file {}", path.display()))?;
        env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level))
            .target(Target::Pipe(Box::new(file)))
            .init();
    }

    let config = Config::discover(cli.config.as_deref())?.with_overrides(
        cli.metadata,
        cli.figures_dir,
        cli.annotations,
    );
    // An unusable index ends the program before the terminal is taken over.
    let index = MetadataIndex::load(&config.metadata)
        .with_context(|| format!("loading metadata index {}", config.metadata.display()))?
        .with_figures_dir(config.resolve_figures_dir());
    info!(
        "starting session over {} files ({} segments)",
        index.files().len(),
        index.total_segments()
    );

    let mut app = App::new(Session::new(index), config.annotations.clone());
    app.autoload(config.autoload);

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &mut app);
    restore_terminal()?;
    result
}

fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(150);
    while !app.should_quit {
        terminal.draw(|f| ui::draw(f, app))?;
        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("initializing terminal")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
