//! `wayfarer run` / `wayfarer stream`: run an agent from the terminal.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wayfarer_agent::{AgentProfile, RunEvent, RunStream, ToolCallAgent};
use wayfarer_config::AppConfig;
use wayfarer_core::AgentState;

/// Providers that run without an API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm"];

pub async fn run(prompt: String, profile: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let (profile, executor) = build_agent(&config, profile.as_deref())?;
    let mut engine = profile.engine(executor, None);

    eprint!("  Thinking...");
    let report = engine.run(&prompt).await?;
    eprint!("\r              \r");

    println!("{report}");

    if report.state == AgentState::Error {
        return Err(format!("{} ended in error", profile.name).into());
    }
    Ok(())
}

pub async fn stream(
    prompt: String,
    profile: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let (profile, executor) = build_agent(&config, profile.as_deref())?;

    let mut engine = profile.engine(executor, None);
    if let Some(secs) = timeout_secs {
        engine = engine.with_stream_timeout(Duration::from_secs(secs));
    }

    let (rx, task) = engine.spawn_stream(prompt);
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    if !follow(rx, task, ctrl_c).await {
        return Err(format!("{} did not finish", profile.name).into());
    }
    Ok(())
}

/// Print events until the run ends or `cancel` resolves.
///
/// Returns once the run's task has completed, cleanup included. Returns
/// false if the run ended in `error` or `timeout`.
async fn follow(
    mut rx: RunStream,
    task: JoinHandle<()>,
    cancel: impl Future<Output = ()>,
) -> bool {
    tokio::pin!(cancel);

    let mut failed = false;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    failed |= matches!(event, RunEvent::Error { .. } | RunEvent::Timeout { .. });
                    if let Some(line) = render(&event) {
                        println!("{line}");
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            _ = &mut cancel => {
                eprintln!("  Cancelled");
                break;
            }
        }
    }

    // Dropping the receiver cancels a run still in progress.
    drop(rx);
    if let Err(e) = task.await {
        warn!(error = %e, "Run task ended abnormally");
    }
    !failed
}

/// Profile and executor for a terminal run.
fn build_agent(
    config: &AppConfig,
    profile: Option<&str>,
) -> Result<(AgentProfile, ToolCallAgent), Box<dyn std::error::Error>> {
    require_api_key(config)?;

    let mut agent_config = config.agent.clone();
    if let Some(name) = profile {
        agent_config.profile = name.to_string();
    }
    let profile = AgentProfile::from_config(&agent_config)?;

    let router = wayfarer_providers::build_from_config(config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;
    let tools = Arc::new(wayfarer_tools::default_registry(&config.tools.output_dir));

    info!(
        agent = %profile.name,
        provider = %config.default_provider,
        model = %config.default_model,
        max_steps = profile.max_steps,
        "Agent ready"
    );

    let executor = ToolCallAgent::from_config(&profile.name, config, provider, tools)?;
    Ok((profile, executor))
}

fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() || KEYLESS_PROVIDERS.contains(&config.default_provider.as_str()) {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    WAYFARER_API_KEY   = 'sk-...'   (generic)");
    eprintln!("    DASHSCOPE_API_KEY  = 'sk-...'   (for DashScope)");
    eprintln!("    OPENAI_API_KEY     = 'sk-...'   (for OpenAI direct)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// Terminal line for one streamed event.
fn render(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::Done { state, steps } => Some(format!("  Done: {state} after {steps} step(s)")),
        other => other.report_line(),
    }
}
