use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "arbor", version)]
#[command(about = "Tree-of-thoughts reasoning against an OpenAI-style chat endpoint")]
pub(crate) struct Cli {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Default, Args)]
pub(crate) struct ModelArgs {
    /// Config file (default: ~/.arbor/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Registered model implementation
    #[arg(long, global = true)]
    pub provider: Option<String>,
    /// Model identifier sent to the endpoint
    #[arg(long, global = true)]
    pub model: Option<String>,
    /// Endpoint base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Use blocking requests for everything
    #[arg(long, global = true)]
    pub no_stream: bool,
    /// Seconds to sleep before retrying a failed request
    #[arg(long, global = true)]
    pub retry_sleep: Option<f64>,
    /// Give up after this many attempts (0 retries forever)
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,
    /// Do not echo streamed text or token counts
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run the beam search and print a final answer
    Solve {
        /// Task to solve
        task: String,
        #[command(flatten)]
        search: SearchArgs,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sample candidate next steps for one state
    Thoughts {
        /// Task being solved
        task: String,
        /// Number of thoughts to sample
        #[arg(short, long, default_value_t = 3)]
        k: usize,
        /// Existing reasoning step (repeatable, in order)
        #[arg(long = "step")]
        steps: Vec<String>,
        /// Previously rejected solution (repeatable)
        #[arg(long = "rejected")]
        rejected: Vec<String>,
        /// Leave out the Observation/Thoughts format instruction
        #[arg(long)]
        no_react: bool,
    },
    /// Score the given states
    Evaluate {
        /// Task the states work toward
        task: String,
        /// States to score
        #[arg(required = true)]
        states: Vec<String>,
        /// `value` or `vote`
        #[arg(long)]
        strategy: Option<String>,
    },
}

#[derive(Debug, Default, Args)]
pub(crate) struct SearchArgs {
    /// `value` or `vote`
    #[arg(long)]
    pub strategy: Option<String>,
    #[arg(long)]
    pub max_steps: Option<usize>,
    /// Thoughts sampled per state
    #[arg(long)]
    pub breadth: Option<usize>,
    /// States kept per step
    #[arg(long)]
    pub beam_width: Option<usize>,
    #[arg(long)]
    pub pruning_threshold: Option<f64>,
    #[arg(long)]
    pub value_threshold: Option<f64>,
    /// Concurrent model calls
    #[arg(long)]
    pub workers: Option<usize>,
    /// Re-score states even when seen before
    #[arg(long)]
    pub no_cache: bool,
    #[arg(long)]
    pub no_react: bool,
}
