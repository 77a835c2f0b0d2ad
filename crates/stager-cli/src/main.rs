use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use serde::Serialize;
use stager_lib::{
    chart::{load_segment_charts, ChartKind},
    config::Config,
    label::Label,
    summary::summary_rows,
    transcode, Event, MetadataIndex, Session,
};
use std::{
    io,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "stager",
    version,
    about = "stager: sleep-stage segment annotation tools"
)]
struct Cli {
    /// Session config (defaults to ./stager.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Metadata index JSON produced by the figure pipeline
    #[arg(long, global = true)]
    metadata: Option<PathBuf>,

    /// Directory holding the chart files (defaults to the metadata directory)
    #[arg(long, global = true)]
    figures_dir: Option<PathBuf>,

    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the files and segment counts listed in the metadata index
    Index,
    /// Print classified/total/remaining counts for an annotations CSV
    Progress {
        #[arg(long)]
        annotations: Option<PathBuf>,
    },
    /// Print every segment with its classification or "Undefined"
    Summary {
        #[arg(long)]
        annotations: Option<PathBuf>,
        /// Emit JSON rows instead of CSV
        #[arg(long)]
        json: bool,
    },
    /// Assign a sleep stage (W, N, R, A) to one segment and write the CSV back
    Label {
        #[arg(long)]
        file: String,
        /// 1-based segment number
        #[arg(long)]
        segment: usize,
        #[arg(long)]
        stage: String,
        #[arg(long)]
        annotations: Option<PathBuf>,
        /// Where to write the result (defaults to --annotations)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge rows from another annotations CSV; rejected as a whole on any bad row
    Import {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        annotations: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the chart files for one segment and whether each can be loaded
    Charts {
        #[arg(long)]
        file: String,
        /// 1-based segment number
        #[arg(long)]
        segment: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let config = Config::discover(cli.config.as_deref())?.with_overrides(
        cli.metadata,
        cli.figures_dir,
        None,
    );
    let index = load_index(&config)?;

    match cli.command {
        Commands::Index => cmd_index(&index)?,
        Commands::Progress { annotations } => {
            let session = session_with_annotations(index, &config, annotations.as_deref())?;
            print_json(&session.progress())?;
        }
        Commands::Summary { annotations, json } => {
            let session = session_with_annotations(index, &config, annotations.as_deref())?;
            cmd_summary(&session, json)?;
        }
        Commands::Label {
            file,
            segment,
            stage,
            annotations,
            out,
        } => cmd_label(
            index,
            &config,
            &file,
            segment,
            &stage,
            annotations.as_deref(),
            out,
        )?,
        Commands::Import {
            input,
            annotations,
            out,
        } => cmd_import(index, &config, &input, annotations.as_deref(), out)?,
        Commands::Charts { file, segment } => cmd_charts(&index, &file, segment)?,
    }
    Ok(())
}

fn load_index(config: &Config) -> Result<MetadataIndex> {
    let index = MetadataIndex::load(&config.metadata)
        .with_context(|| format!("loading metadata index {}", config.metadata.display()))?;
    Ok(index.with_figures_dir(config.resolve_figures_dir()))
}

/// Start a session from `explicit`, or from the configured CSV when it exists.
fn session_with_annotations(
    index: MetadataIndex,
    config: &Config,
    explicit: Option<&Path>,
) -> Result<Session> {
    let mut session = Session::new(index);
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None if config.annotations.is_file() => Some(config.annotations.clone()),
        None => None,
    };
    if let Some(path) = path {
        session
            .apply(Event::ImportCsv(path.clone()))
            .with_context(|| format!("loading annotations {}", path.display()))?;
    }
    Ok(session)
}

/// Like `session_with_annotations`, but a missing file is an empty start.
fn editable_session(
    index: MetadataIndex,
    config: &Config,
    annotations: Option<&Path>,
) -> Result<(Session, PathBuf)> {
    let path = annotations
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.annotations.clone());
    let existing = path.is_file().then_some(path.as_path());
    let session = match existing {
        Some(existing) => session_with_annotations(index, config, Some(existing))?,
        None => Session::new(index),
    };
    Ok((session, path))
}

#[derive(Serialize)]
struct IndexFile<'a> {
    file: &'a str,
    segments: usize,
}

#[derive(Serialize)]
struct IndexSummary<'a> {
    files: Vec<IndexFile<'a>>,
    total: usize,
}

fn cmd_index(index: &MetadataIndex) -> Result<()> {
    let files = index
        .files()
        .iter()
        .map(|entry| IndexFile {
            file: &entry.id,
            segments: entry.segments.len(),
        })
        .collect();
    print_json(&IndexSummary {
        files,
        total: index.total_segments(),
    })
}

fn cmd_summary(session: &Session, json: bool) -> Result<()> {
    let rows = summary_rows(session.index(), session.store());
    if json {
        return print_json(&rows);
    }
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["File", "Segment", "Classification"])?;
    for row in &rows {
        let segment = row.segment.to_string();
        writer.write_record([row.file.as_str(), segment.as_str(), row.classification_text()])?;
    }
    writer.flush()?;
    Ok(())
}

fn cmd_label(
    index: MetadataIndex,
    config: &Config,
    file: &str,
    segment: usize,
    stage: &str,
    annotations: Option<&Path>,
    out: Option<PathBuf>,
) -> Result<()> {
    let label: Label = stage.parse()?;
    if segment == 0 {
        bail!("segment numbers start at 1");
    }
    let (mut session, path) = editable_session(index, config, annotations)?;
    session.apply(Event::SelectFile(file.to_string()))?;
    session.apply(Event::SelectSegment(segment - 1))?;
    let outcome = session.apply(Event::SetLabel(label))?;
    info!("{}", outcome.message());
    let out = out.unwrap_or(path);
    session.apply(Event::ExportCsv(out))?;
    print_json(&session.progress())
}

fn cmd_import(
    index: MetadataIndex,
    config: &Config,
    input: &Path,
    annotations: Option<&Path>,
    out: Option<PathBuf>,
) -> Result<()> {
    let (mut session, path) = editable_session(index, config, annotations)?;
    let outcome = session
        .apply(Event::ImportCsv(input.to_path_buf()))
        .with_context(|| format!("importing {}", input.display()))?;
    let report = match outcome {
        stager_lib::Outcome::Imported(report) => report,
        other => return Err(anyhow!("unexpected import outcome {:?}", other)),
    };
    for key in &report.unknown {
        eprintln!("warning: {} is not in the metadata index", key);
    }
    let out = out.unwrap_or(path);
    transcode::write_csv_file(&out, session.index(), session.store())?;
    print_json(&report)
}

#[derive(Serialize)]
struct ChartStatus {
    reference: String,
    kind: ChartKind,
    path: PathBuf,
    loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn cmd_charts(index: &MetadataIndex, file: &str, segment: usize) -> Result<()> {
    let count = index
        .segment_count(file)
        .ok_or_else(|| anyhow!("file {:?} is not in the metadata index", file))?;
    let segment_ref = segment
        .checked_sub(1)
        .and_then(|idx| index.segment(file, idx))
        .ok_or_else(|| anyhow!("segment {} is out of range 1..={} for {}", segment, count, file))?;
    let statuses: Vec<ChartStatus> = load_segment_charts(index, segment_ref)
        .into_iter()
        .map(|slot| ChartStatus {
            loaded: slot.is_loaded(),
            error: slot.chart.err(),
            reference: slot.reference,
            kind: slot.kind,
            path: slot.path,
        })
        .collect();
    print_json(&statuses)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
