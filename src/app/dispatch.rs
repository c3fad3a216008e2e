use crate::agent::{ExchangeOutcome, LoopSettings, Orchestrator, RetryPolicy, drive_with_retries};
use crate::cli::{Cli, Commands};
use crate::config::{Config, validate_max_iterations};
use crate::error::{ConfigError, Result};
use crate::llm::{GeminiClient, RequestOptions, build_http_client_with_timeout};
use crate::scenario;
use crate::tools::{ToolRegistry, build_registry};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Where the prompt of one run comes from.
struct PreparedRun {
    prompt: String,
    options: RequestOptions,
    declared_tools: Vec<String>,
}

fn prepare_run(
    config: &Config,
    prompt: Option<String>,
    filter: Option<&str>,
    defaults: &RequestOptions,
) -> Result<PreparedRun> {
    if let Some(prompt) = prompt {
        return Ok(PreparedRun {
            prompt,
            options: defaults.clone(),
            declared_tools: Vec::new(),
        });
    }

    let mut rng = rand::rng();
    let dir = Path::new(&config.scenarios.dir);
    let path = scenario::select_scenario(dir, filter, &mut rng)?;
    info!(path = %path.display(), "Selected scenario payload");
    let scenario = scenario::load_scenario(&path, &mut rng)?;
    Ok(PreparedRun {
        options: scenario.request_options(defaults),
        prompt: scenario.prompt,
        declared_tools: scenario.declared_tools,
    })
}

fn warn_unregistered(registry: &ToolRegistry, declared: &[String]) {
    for name in declared.iter().filter(|name| !registry.contains(name)) {
        tracing::warn!(tool = name.as_str(), "Scenario declares a tool that is not registered");
    }
}

fn gemini_client(config: &Config, model: String) -> std::result::Result<GeminiClient, ConfigError> {
    let api_key = config.resolve_api_key()?;
    Ok(GeminiClient::new(api_key, model)
        .with_base_url(config.base_url.clone())
        .with_http_client(build_http_client_with_timeout(
            config.exchange.request_timeout_secs,
        )))
}

fn print_outcome(prompt: &str, outcome: &ExchangeOutcome) {
    println!();
    println!("Initial prompt: {prompt}");
    for call in &outcome.tool_calls {
        let status = if call.result.ok { "ok" } else { "failed" };
        println!(
            "  [{}] {}({}) -> {status}: {}",
            call.iteration,
            call.tool_name,
            serde_json::Value::Object(call.args.clone()),
            call.result.value
        );
    }
    if outcome.final_text.is_empty() {
        println!("Final response: (no text)");
    } else {
        println!("Final response: {}", outcome.final_text);
    }
}

/// Cancel `token` on Ctrl-C so a running exchange stops at its next step.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling exchange");
            token.cancel();
        }
    });
}

async fn run_exchange(
    config: &Config,
    prompt: Option<String>,
    filter: Option<String>,
    model: Option<String>,
    max_iterations: Option<u32>,
    sequential: bool,
) -> Result<()> {
    let mut settings = LoopSettings::from_config(config);
    if let Some(limit) = max_iterations {
        validate_max_iterations(limit, "--max-iterations")?;
        settings.max_iterations = limit;
    }
    if sequential {
        settings.parallel_tool_calls = false;
    }

    let run = prepare_run(config, prompt, filter.as_deref(), &settings.options)?;
    settings.options = run.options;

    let registry = build_registry(&config.tools)?;
    warn_unregistered(&registry, &run.declared_tools);

    let model = model.unwrap_or_else(|| config.model.clone());
    let client = gemini_client(config, model)?;
    let orchestrator = Orchestrator::new(Arc::new(client), Arc::new(registry), settings);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let mut exchange = orchestrator.start(run.prompt.clone());
    let outcome = drive_with_retries(
        &mut exchange,
        &cancel,
        RetryPolicy::from_config(&config.reliability),
    )
    .await?;

    print_outcome(&run.prompt, &outcome);
    info!(
        exchange = %outcome.exchange_id,
        iterations = outcome.iterations,
        tokens_used = outcome.tokens_used,
        "exchange complete"
    );
    Ok(())
}

async fn list_models(config: &Config, all: bool) -> Result<()> {
    let client = gemini_client(config, config.model.clone())?;
    let models = client.list_models().await?;
    for model in models.iter().filter(|m| all || m.supports_generate_content) {
        match &model.display_name {
            Some(display) => println!("{} ({display})", model.name),
            None => println!("{}", model.name),
        }
    }
    Ok(())
}

fn list_tools(config: &Config) -> Result<()> {
    let registry = build_registry(&config.tools)?;
    for descriptor in registry.catalogue() {
        println!("{}: {}", descriptor.name, descriptor.description);
        for (name, spec) in &descriptor.parameters.properties {
            let required = if spec.required { ", required" } else { "" };
            println!("    {name} ({}{required}): {}", spec.kind, spec.description);
        }
    }
    Ok(())
}

/// Run one CLI command. Failures keep their subsystem so callers can tell
/// a bad config from a failed exchange.
pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<()> {
    config.validate()?;

    match cli.command {
        Commands::Run {
            prompt,
            filter,
            model,
            max_iterations,
            sequential,
        } => run_exchange(&config, prompt, filter, model, max_iterations, sequential).await,
        Commands::Models { all } => list_models(&config, all).await,
        Commands::Tools => list_tools(&config),
    }
}
