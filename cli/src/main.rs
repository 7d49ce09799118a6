//! Arbor CLI - binary entry point.
//!
//! ```text
//! main() -> settings (flags > env > ~/.arbor/config.toml)
//!        -> ModelRegistry::build(name) -> ModelClient --Progress--> render task
//!        -> solve | thoughts | evaluate
//! ```
//!
//! Streamed text is echoed to stdout as it arrives; token counters and retry
//! notices go to stderr. Tracing output goes to `~/.arbor/logs/arbor.log`.

mod args;
mod render;
mod settings;

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use arbor_config::ArborConfig;
use arbor_engine::{ReasoningProcess, StateEvaluator, ThoughtGenerator};
use arbor_providers::{ModelClient, ModelRegistry};
use arbor_types::{RejectedSolutions, State};

use args::{Cli, Command};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout carries answers, so logs fall back to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => warnings.push(format!(
                "Failed to open log file {}: {e}",
                candidate.display()
            )),
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(config_path) = arbor_config::config_path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("arbor.log"));
    }
    candidates.push(PathBuf::from(".arbor").join("logs").join("arbor.log"));

    candidates
}

fn state_from_steps(steps: Vec<String>) -> State {
    steps
        .into_iter()
        .fold(State::root(), |state, step| state.extend(step))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = settings::load_config(&cli.model)?;
    let api = settings::api_config(&config, &cli.model, |name| std::env::var(name).ok())?;
    let name = settings::model_name(&config, &cli.model);
    tracing::info!(model = name, id = %api.model(), base_url = api.base_url(), "Using model");

    let (tx, rx) = mpsc::unbounded_channel();
    let client: ModelClient = ModelRegistry::default()
        .build(name, &api)
        .with_context(|| format!("building model `{name}`"))?
        .with_progress(tx);
    let renderer = tokio::spawn(render::render_progress(rx, cli.model.quiet));

    let result = run(cli.command, &config, client).await;

    // The client owned the only sender; the renderer drains and exits.
    if let Err(e) = renderer.await {
        tracing::warn!(%e, "Progress renderer failed");
    }
    result
}

async fn run(command: Command, config: &ArborConfig, client: ModelClient) -> Result<()> {
    let mut stdout = io::stdout();

    match command {
        Command::Solve { task, search, json } => {
            let options = settings::process_options(&config.search, &search)?;
            let params = settings::search_params(&config.search, &search);
            let process = ReasoningProcess::with_options(client, options);

            let outcome = process.solve(&task, &params).await?;
            tracing::info!(
                cache_hits = process.cache().hits(),
                cache_misses = process.cache().misses(),
                tokens = process.model().usage().session_total(),
                "Search finished"
            );
            drop(process);

            if json {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&outcome)?)?;
            } else {
                render::print_outcome(&mut stdout, &outcome)?;
            }
        }
        Command::Thoughts {
            task,
            k,
            steps,
            rejected,
            no_react,
        } => {
            let state = state_from_steps(steps);
            let mut ledger = RejectedSolutions::new();
            ledger.extend(rejected.into_iter().map(State::from));

            let generator = ThoughtGenerator::new(client).with_react(!no_react);
            let thoughts = generator
                .generate_thoughts(&state, &task, k, &ledger)
                .await?;
            drop(generator);

            render::print_thoughts(&mut stdout, &thoughts)?;
        }
        Command::Evaluate {
            task,
            states,
            strategy,
        } => {
            let strategy = settings::strategy(&config.search, strategy.as_deref())?;
            let states: Vec<State> = states.into_iter().map(State::from).collect();

            let evaluator = StateEvaluator::new(client);
            let scores = evaluator
                .evaluate_states(&states, &task, strategy)
                .await?;
            drop(evaluator);

            render::print_scores(&mut stdout, &scores)?;
        }
    }

    stdout.flush()?;
    Ok(())
}
