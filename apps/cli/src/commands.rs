//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use newsroom_core::{
    ArtifactRecorder, Newsroom, ProgressReporter, RunOutcome, StageKind, render_stored,
};
use newsroom_shared::{
    AppConfig, ArtifactKind, PipelineConfig, init_config, load_config, load_config_from,
};
use newsroom_storage::ArtifactStore;

use crate::wiring;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Newsroom: idea in, reviewed article out.
#[derive(Parser)]
#[command(
    name = "newsroom",
    version,
    about = "Plan, research, draft, polish, illustrate and approve articles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.newsroom/newsroom.toml).
    #[arg(long, global = true, env = "NEWSROOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Artifact database path.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory for rendered artifact files.
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Only write to the database, no rendered files.
    #[arg(long, global = true)]
    pub no_files: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run every stage for an idea, redrafting on rejection.
    Run {
        /// The raw story idea.
        idea: String,

        /// Override the configured redraft limit.
        #[arg(long)]
        max_redrafts: Option<u32>,

        /// Override the configured research turn budget.
        #[arg(long)]
        max_turns: Option<u32>,
    },

    /// Plan an assignment from an idea.
    Assign {
        idea: String,
    },

    /// Research a planned assignment.
    Research {
        slug: String,
    },

    /// Draft and refine from stored research.
    Draft {
        slug: String,

        /// Editorial feedback to address in the draft.
        #[arg(long, conflicts_with = "from_rejection")]
        feedback: Option<String>,

        /// Use the notes of the stored rejection as feedback.
        #[arg(long)]
        from_rejection: bool,
    },

    /// Copy-edit the stored draft into a final article.
    Polish {
        slug: String,
    },

    /// Generate the hero image for the stored article.
    Illustrate {
        slug: String,
    },

    /// Run the approval gate over the stored article.
    Approve {
        slug: String,
    },

    /// Print stored artifacts for a slug.
    Show {
        slug: String,

        /// Artifact kind (e.g. assignment, evidence, draft, final_artifact).
        #[arg(long)]
        kind: Option<String>,
    },

    /// List recent pipeline runs.
    List {
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newsroom=info",
        1 => "newsroom=debug",
        _ => "newsroom=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    match &cli.command {
        Command::Run {
            idea,
            max_redrafts,
            max_turns,
        } => cmd_run(&cli, &config, idea, *max_redrafts, *max_turns).await,
        Command::Assign { idea } => {
            let room = newsroom(&cli, &config, pipeline_config(&cli, &config)).await?;
            let a = room.assign(idea).await?;
            println!();
            println!("  Assignment planned");
            println!("  Slug:     {}", a.slug);
            println!("  Topic:    {}", a.topic);
            println!("  Category: {}", a.category);
            println!("  Length:   {}", a.length_class.label());
            println!();
            println!("  Next: newsroom research {}", a.slug);
            Ok(())
        }
        Command::Research { slug } => {
            let room = newsroom(&cli, &config, pipeline_config(&cli, &config)).await?;
            let outcome = room.research(slug).await?;
            println!();
            println!("  Research complete");
            println!("  Turns:   {}", outcome.turns);
            println!("  Stop:    {:?}", outcome.stop);
            println!("  Items:   {}", outcome.evidence.len());
            println!("  Sources: {}", outcome.evidence.distinct_sources());
            println!();
            Ok(())
        }
        Command::Draft {
            slug,
            feedback,
            from_rejection,
        } => {
            let room = newsroom(&cli, &config, pipeline_config(&cli, &config)).await?;
            let outcome = if *from_rejection {
                room.draft_from_rejection(slug).await?
            } else {
                room.draft(slug, feedback.clone()).await?
            };
            println!();
            println!("  Draft complete");
            println!("  Fact issues:  {}", outcome.fact_review.issues.len());
            println!("  Style issues: {}", outcome.style_review.issues.len());
            println!();
            Ok(())
        }
        Command::Polish { slug } => {
            let room = newsroom(&cli, &config, pipeline_config(&cli, &config)).await?;
            let article = room.polish(slug).await?;
            println!();
            println!("  Headline: {}", article.headline);
            if let Some(sub) = &article.subheading {
                println!("  Sub:      {sub}");
            }
            println!();
            Ok(())
        }
        Command::Illustrate { slug } => {
            let room = newsroom(&cli, &config, pipeline_config(&cli, &config)).await?;
            let hero = room.illustrate(slug).await?;
            println!();
            println!("  Prompt: {}", hero.prompt);
            match &hero.path {
                Some(path) => println!("  Image:  {path}"),
                None => println!("  Image:  (not generated)"),
            }
            println!();
            Ok(())
        }
        Command::Approve { slug } => {
            let room = newsroom(&cli, &config, pipeline_config(&cli, &config)).await?;
            let decision = room.approve(slug).await?;
            println!();
            println!(
                "  Decision: {}",
                if decision.approved { "APPROVED" } else { "REJECTED" }
            );
            for note in &decision.notes {
                println!("  - {note}");
            }
            println!();
            Ok(())
        }
        Command::Show { slug, kind } => cmd_show(&cli, &config, slug, kind.as_deref()).await,
        Command::List { limit } => cmd_list(&cli, &config, *limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    Ok(match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Runtime config with CLI flags applied over the file.
fn pipeline_config(cli: &Cli, config: &AppConfig) -> PipelineConfig {
    let mut pipeline = PipelineConfig::from(config);
    if let Some(dir) = &cli.output {
        pipeline.output_dir = Some(dir.clone());
    }
    if cli.no_files {
        pipeline.output_dir = None;
    }
    pipeline
}

async fn newsroom(cli: &Cli, config: &AppConfig, pipeline: PipelineConfig) -> Result<Newsroom> {
    let collab = wiring::collaborators(config)?;
    let store = wiring::open_store(&wiring::database_path(config, cli.db.as_ref())).await?;
    let recorder = ArtifactRecorder::new(store, pipeline.output_dir.clone());
    Ok(Newsroom::new(
        pipeline,
        collab,
        recorder,
        Arc::new(CliProgress::new()),
    ))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    cli: &Cli,
    config: &AppConfig,
    idea: &str,
    max_redrafts: Option<u32>,
    max_turns: Option<u32>,
) -> Result<()> {
    let mut pipeline = pipeline_config(cli, config);
    if let Some(n) = max_redrafts {
        pipeline.max_redrafts = n;
    }
    if let Some(n) = max_turns {
        pipeline.research.max_turns = n;
    }
    let output_dir = pipeline.output_dir.clone();

    info!(idea, "starting run");
    let room = newsroom(cli, config, pipeline).await?;
    let outcome = room.run(idea).await?;

    println!();
    match &outcome {
        RunOutcome::Approved {
            slug,
            article,
            hero,
            attempts,
        } => {
            println!("  Article approved!");
            println!("  Slug:     {slug}");
            println!("  Headline: {}", article.headline);
            println!("  Attempts: {attempts}");
            if let Some(path) = &hero.path {
                println!("  Image:    {path}");
            }
        }
        RunOutcome::Rejected {
            slug,
            notes,
            attempts,
        } => {
            println!("  Article rejected after {attempts} attempt(s); not published.");
            println!("  Slug:     {slug}");
            for note in notes {
                println!("  - {note}");
            }
        }
    }
    if let Some(dir) = output_dir {
        println!("  Files:    {}", dir.join(outcome.slug()).display());
    }
    println!();
    Ok(())
}

async fn cmd_show(cli: &Cli, config: &AppConfig, slug: &str, kind: Option<&str>) -> Result<()> {
    let store = wiring::open_store_readonly(&wiring::database_path(config, cli.db.as_ref())).await?;

    match kind {
        Some(kind) => {
            let kind: ArtifactKind = kind.parse()?;
            let json = store.load(kind, slug).await?;
            print!("{}", render_stored(kind, &json)?);
        }
        None => {
            let kinds = store.kinds(slug).await?;
            if kinds.is_empty() {
                return Err(eyre!("no artifacts stored for '{slug}'"));
            }
            println!("Artifacts for {slug}:");
            for kind in kinds {
                println!("  {kind}");
            }
        }
    }
    Ok(())
}

async fn cmd_list(cli: &Cli, config: &AppConfig, limit: u32) -> Result<()> {
    let store = wiring::open_store_readonly(&wiring::database_path(config, cli.db.as_ref())).await?;
    let runs = store.list_runs(limit).await?;
    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<9} {:>2}x  {:<28} {}",
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.outcome,
            run.attempts,
            run.slug.as_deref().unwrap_or("-"),
            run.idea
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: StageKind) {
        self.spinner.set_message(format!("{stage}..."));
    }

    fn stage_finished(&self, stage: StageKind) {
        self.spinner.println(format!("  ✓ {stage}"));
        if stage == StageKind::Approval {
            self.spinner.set_message(String::new());
        }
    }

    fn research_turn(&self, turn: u32, max_turns: u32, items: usize) {
        self.spinner
            .set_message(format!("Research turn [{turn}/{max_turns}] ({items} items so far)"));
    }

    fn drafting_step(&self, step: &str) {
        self.spinner.set_message(format!("Drafting: {step}"));
    }

    fn redraft(&self, attempt: u32, max_redrafts: u32) {
        self.spinner
            .println(format!("  ↺ rejected, redraft {attempt}/{max_redrafts}"));
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}
