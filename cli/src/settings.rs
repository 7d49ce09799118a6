//! Command-line flags layered over the config file and environment.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use arbor_config::{ArborConfig, SearchSection};
use arbor_engine::{ProcessOptions, SearchParams};
use arbor_providers::ApiConfig;
use arbor_types::{EvaluationStrategy, ModelName};

use crate::args::{ModelArgs, SearchArgs};

pub(crate) fn load_config(args: &ModelArgs) -> Result<ArborConfig> {
    match &args.config {
        Some(path) => ArborConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ArborConfig::load()
            .context("loading ~/.arbor/config.toml")?
            .unwrap_or_default()),
    }
}

pub(crate) fn model_name<'a>(config: &'a ArborConfig, args: &'a ModelArgs) -> &'a str {
    args.provider.as_deref().unwrap_or_else(|| config.model_name())
}

pub(crate) fn api_config(
    config: &ArborConfig,
    args: &ModelArgs,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ApiConfig> {
    let mut api = config
        .api_config(env)
        .context("resolving API configuration")?;

    if let Some(url) = &args.base_url {
        api = api.with_base_url(url.as_str())?;
    }
    if let Some(model) = &args.model {
        api = api.with_model(ModelName::new(model.as_str())?);
    }
    if args.no_stream {
        api = api.with_streaming(false);
    }

    let mut retry = api.retry().clone();
    if let Some(secs) = args.retry_sleep {
        if !secs.is_finite() || secs < 0.0 {
            bail!("--retry-sleep must be a non-negative number of seconds, got {secs}");
        }
        retry = retry.with_sleep(Duration::from_secs_f64(secs));
    }
    if let Some(max_attempts) = args.max_attempts {
        retry = retry.with_max_attempts(max_attempts);
    }

    Ok(api.with_retry(retry))
}

pub(crate) fn strategy(
    section: &SearchSection,
    flag: Option<&str>,
) -> Result<EvaluationStrategy> {
    if let Some(raw) = flag {
        return Ok(EvaluationStrategy::parse(raw)?);
    }
    Ok(section.strategy()?.unwrap_or_default())
}

pub(crate) fn process_options(section: &SearchSection, args: &SearchArgs) -> Result<ProcessOptions> {
    let defaults = ProcessOptions::default();
    Ok(ProcessOptions {
        strategy: strategy(section, args.strategy.as_deref())?,
        max_workers: args
            .workers
            .or(section.max_workers)
            .unwrap_or(defaults.max_workers),
        cache_enabled: !args.no_cache && section.cache.unwrap_or(defaults.cache_enabled),
        react: !args.no_react,
    })
}

pub(crate) fn search_params(section: &SearchSection, args: &SearchArgs) -> SearchParams {
    let defaults = SearchParams::default();
    SearchParams {
        max_steps: args
            .max_steps
            .or(section.max_steps)
            .unwrap_or(defaults.max_steps),
        breadth: args.breadth.or(section.breadth).unwrap_or(defaults.breadth),
        beam_width: args
            .beam_width
            .or(section.beam_width)
            .unwrap_or(defaults.beam_width),
        pruning_threshold: args
            .pruning_threshold
            .or(section.pruning_threshold)
            .unwrap_or(defaults.pruning_threshold),
        value_threshold: args
            .value_threshold
            .or(section.value_threshold)
            .unwrap_or(defaults.value_threshold),
    }
}
