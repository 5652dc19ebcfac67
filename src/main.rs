// Tue Jan 13 2026 - Alex

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use kernel_discovery::{
    config::Config,
    engine::{Collaborators, DiscoverySession},
    memory::Address,
    orchestrator::{PipelineEvent, PipelineStage},
    plugin::PluginRegistry,
    profile::Architecture,
    utils::logging,
    JobAction, JobPayload,
};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Locates the kernel profile and directory table base in a raw memory image", long_about = None)]
struct Args {
    /// Raw physical memory image
    #[arg(short, long)]
    image: PathBuf,

    /// Directory holding one `<guid_age>` profile directory per kernel build
    #[arg(short, long)]
    profile_cache: Option<PathBuf>,

    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "discovery.json")]
    output: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(long)]
    no_progress: bool,

    /// Ignore and do not write the per-image discovery cache
    #[arg(long)]
    no_cache: bool,

    /// Plugin to run once discovery stops
    #[arg(long)]
    plugin: Option<String>,

    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DiscoverySummary {
    image: PathBuf,
    stage: PipelineStage,
    guid_ages: Vec<String>,
    profile: Option<String>,
    architecture: Option<Architecture>,
    idle_process: Option<Address>,
    dtb: Option<u64>,
    shared_data: Option<u64>,
    failure: Option<String>,
    plugin_output: Vec<String>,
}

impl DiscoverySummary {
    fn collect(session: &DiscoverySession, image: PathBuf, failure: Option<String>, plugin_output: Vec<String>) -> Self {
        let discovered = &session.context().discovered;
        let profile = discovered.profile();

        Self {
            image,
            stage: session.progress().stage,
            guid_ages: discovered.guid_ages(),
            profile: profile.as_ref().map(|p| p.guid_age().to_string()),
            architecture: profile.as_ref().map(|p| p.architecture()),
            idle_process: discovered.idle_process(),
            dtb: discovered.dtb(),
            shared_data: discovered.shared_data_va(),
            failure,
            plugin_output,
        }
    }
}

fn main() {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "[!]".red(), e);
            std::process::exit(1);
        }
    };

    let level = logging::level_from_verbosity(config.log_verbosity(args.verbose));
    if std::env::var_os("RUST_LOG").is_some() {
        logging::init_from_env();
    } else if let Some(path) = &args.log_file {
        if let Err(e) = logging::init_logger_with_file(level, path) {
            eprintln!("{} Failed to open log file {}: {}", "[!]".red(), path.display(), e);
            std::process::exit(1);
        }
    } else {
        logging::init_logger(level);
    }

    if let Err(e) = run(&args, config) {
        eprintln!("{} {:#}", "[!]".red(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args, config: Config) -> Result<()> {
    println!("{}", "Kernel Discovery".cyan().bold());
    println!("{}", "=".repeat(50).cyan());
    println!();

    let start_time = Instant::now();

    let collaborators = Collaborators::from_config(&config)
        .with_plugins(PluginRegistry::with_builtins().with_enabled(&config.enabled_plugins));
    let (mut session, events) = DiscoverySession::start(config, collaborators)?;

    println!("{} Image: {}", "[*]".blue(), args.image.display());
    session
        .open_image(&args.image)
        .with_context(|| format!("Failed to open {}", args.image.display()))?;

    let spinner = if args.no_progress { None } else { Some(spinner()?) };
    let failure = watch_pipeline(&session, &events, spinner.as_ref());

    let plugin_output = match &args.plugin {
        Some(name) => run_plugin(&session, &events, spinner.as_ref(), name)?,
        None => Vec::new(),
    };

    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }

    let summary = DiscoverySummary::collect(&session, args.image.clone(), failure, plugin_output);
    session.stop();

    print_summary(&summary);
    save_summary(&summary, &args.output)?;
    println!("{} Summary saved to: {}", "[+]".green(), args.output.display());
    println!("{} Finished in {:.2}s", "[*]".blue(), start_time.elapsed().as_secs_f64());

    if summary.failure.is_some() {
        std::process::exit(2);
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(dir) = &args.profile_cache {
        config = config.with_profile_cache_dir(dir.clone());
    }
    if args.no_cache {
        config = config.with_cache_enabled(false);
    }
    Ok(config)
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Starting...");
    Ok(pb)
}

fn say(spinner: Option<&ProgressBar>, line: String) {
    match spinner {
        Some(pb) => pb.println(line),
        None => println!("{}", line),
    }
}

/// Prints events until the pipeline finishes or fails. Returns the failure message, if any.
fn watch_pipeline(
    session: &DiscoverySession,
    events: &Receiver<PipelineEvent>,
    spinner: Option<&ProgressBar>,
) -> Option<String> {
    loop {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                print_event(spinner, &event);
                if event.is_terminal() {
                    return match event {
                        PipelineEvent::StageFailed { action, message } => Some(format!("{}: {}", action, message)),
                        _ => None,
                    };
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(pb) = spinner {
                    let progress = session.progress();
                    pb.set_message(format!("{} ({} in flight)", progress.label, progress.in_flight));
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Some("The pipeline stopped unexpectedly".to_string()),
        }
    }
}

fn run_plugin(
    session: &DiscoverySession,
    events: &Receiver<PipelineEvent>,
    spinner: Option<&ProgressBar>,
    name: &str,
) -> Result<Vec<String>> {
    session.load_plugin(name)?;
    session.run_plugin()?;

    loop {
        match events.recv_timeout(Duration::from_secs(60)) {
            Ok(PipelineEvent::StageCompleted { action: JobAction::RunPlugin, payload }) => {
                let JobPayload::PluginOutput { lines, .. } = payload else {
                    return Ok(Vec::new());
                };
                for line in &lines {
                    say(spinner, format!("    {}", line));
                }
                return Ok(lines);
            }
            Ok(event @ PipelineEvent::StageFailed { .. }) => {
                print_event(spinner, &event);
                return Ok(Vec::new());
            }
            Ok(event) => print_event(spinner, &event),
            Err(_) => anyhow::bail!("Plugin {} did not report back", name),
        }
    }
}

fn print_event(spinner: Option<&ProgressBar>, event: &PipelineEvent) {
    let line = match event {
        PipelineEvent::StageStarted { label, .. } => {
            if let Some(pb) = spinner {
                pb.set_message(label.clone());
            }
            format!("{} {}...", "[*]".blue(), label)
        }
        PipelineEvent::StageCompleted { action, payload } => {
            let lines = payload.to_lines();
            if lines.is_empty() {
                format!("{} {}", "[+]".green(), action)
            } else {
                format!("{} {}: {}", "[+]".green(), action, lines.join(", "))
            }
        }
        PipelineEvent::Advisory(message) => format!("{} {}", "[?]".yellow(), message.yellow()),
        PipelineEvent::StageFailed { action, message } => {
            format!("{} {} failed: {}", "[!]".red(), action, message.red())
        }
        PipelineEvent::Finished => format!("{} {}", "[+]".green(), "Discovery complete".green().bold()),
    };
    say(spinner, line);
}

fn print_summary(summary: &DiscoverySummary) {
    println!();
    println!("{}", "Summary".cyan().bold());
    println!("{}", "-".repeat(50).cyan());
    println!("  Stage:        {}", summary.stage);

    match (&summary.profile, summary.architecture) {
        (Some(profile), Some(arch)) => println!("  Profile:      {} ({})", profile.green(), arch),
        _ => println!("  Profile:      {}", "not loaded".yellow()),
    }
    if summary.guid_ages.len() > 1 {
        println!("  Candidates:   {}", summary.guid_ages.join(", "));
    }

    match (summary.idle_process, summary.dtb) {
        (Some(idle), Some(dtb)) => {
            println!("  Idle process: {}", idle);
            println!("  Kernel DTB:   {}", format!("0x{:x}", dtb).green());
        }
        _ => println!("  Kernel DTB:   {}", "not found".yellow()),
    }
    if let Some(va) = summary.shared_data {
        println!("  Shared data:  0x{:x}", va);
    }
    if let Some(failure) = &summary.failure {
        println!("  Failure:      {}", failure.red());
    }
    println!();
}

fn save_summary(summary: &DiscoverySummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    let mut file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())?;
    Ok(())
}
