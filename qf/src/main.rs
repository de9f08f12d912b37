//! questfarm - unattended quest automation
//!
//! CLI entry point: run a scripted session, talk to running instances,
//! inspect their status and try the classifier.

use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use patternstore::PatternStore;
use questfarm::cli::{Cli, Command};
use questfarm::config::Config;
use questfarm::ipc::ChannelClient;
use questfarm::logging::{LogQueue, QueueMakeWriter};
use questfarm::scenario::{Scenario, ScenarioSummary, run_scenario};
use questfarm::session::FarmSession;
use questfarm::status::StatusSnapshot;
use questfarm::QuestClassifier;

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, writer: QueueMakeWriter) {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = parse_level(cli_log_level.or(config_log_level));

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(account) = &cli.account {
        config.account.id = account.clone();
    }

    let log_path = match cli.command {
        Command::Run { .. } => config.log_file(),
        _ => config.log.dir.join("qf-cli.log"),
    };
    let log_queue = LogQueue::start(&log_path, config.log.tail_lines).context("Failed to setup logging")?;
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), log_queue.make_writer());

    debug!(command = ?cli.command, "main: dispatching command");
    let result = match cli.command {
        Command::Run { scenario, realtime } => {
            debug!(?scenario, realtime, "main: matched Run command");
            cmd_run(&config, &scenario, realtime, &log_queue).await
        }
        Command::Send { token } => {
            debug!(?token, "main: matched Send command");
            cmd_send(&config, &token.join(" ")).await
        }
        Command::Status => {
            debug!("main: matched Status command");
            cmd_status(&config)
        }
        Command::Classify { text } => {
            debug!(?text, "main: matched Classify command");
            cmd_classify(&config, &text.join(" "))
        }
    };

    log_queue.shutdown(config.log.shutdown_timeout());
    result
}

async fn cmd_run(config: &Config, scenario_path: &PathBuf, realtime: bool, log_queue: &LogQueue) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let mut session = FarmSession::from_config(config, Some(log_queue.tail()))?;

    let summary = run_scenario(&mut session, &scenario, realtime).await;
    session.shutdown();

    print_summary(&config.account.id, &summary);
    Ok(())
}

fn print_summary(account: &str, summary: &ScenarioSummary) {
    println!("{} {}", "Account:".bold(), account.cyan());
    println!(
        "{} {} ticks, {:.1}s simulated",
        "Ran:".bold(),
        summary.ticks,
        summary.session_secs
    );
    println!("{}", "Transitions:".bold());
    for t in &summary.transitions {
        println!("  {} -> {}  {}", t.from, t.to.to_string().green(), t.reason.to_string().dimmed());
    }
    if !summary.activations.is_empty() {
        println!("{}", "Activations:".bold());
        for (role, count) in &summary.activations {
            println!("  {:<14} {}", role, count);
        }
    }
    for (token, response) in &summary.commands {
        println!("{} {}", "Command:".bold(), token.yellow());
        for line in response.lines() {
            println!("  {}", line);
        }
    }
    println!("{} {}", "Final state:".bold(), summary.final_state);
    println!("{} {}", "Quests completed:".bold(), summary.quests_completed.to_string().green());
    if summary.actions_not_performed > 0 {
        println!(
            "{} {}",
            "Actions not performed:".bold(),
            summary.actions_not_performed.to_string().yellow()
        );
    }
}

async fn cmd_send(config: &Config, token: &str) -> Result<()> {
    let client = ChannelClient::new(config.account_channel_dir())
        .with_timeout(config.channel.response_timeout())
        .with_poll_interval(config.channel.poll_interval());

    let response = client
        .send(token)
        .await
        .context(format!("Account '{}' did not answer '{}'", config.account.id, token))?;
    println!("{}", response.trim_end());
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let path = config.status_path();
    match StatusSnapshot::load(&path) {
        Ok(snapshot) => {
            let now_ms = chrono::Utc::now().timestamp_millis();
            let rendered = snapshot.render(now_ms, config.status.freshness());
            if snapshot.is_stale(now_ms, config.status.freshness()) {
                println!("{}", rendered.red());
            } else {
                println!("{}", rendered);
            }
        }
        Err(e) => {
            debug!(error = %e, "cmd_status: no readable snapshot");
            println!("account: {}\nstatus: {}", config.account.id, "offline (no status published)".red());
        }
    }
    Ok(())
}

fn cmd_classify(config: &Config, text: &str) -> Result<()> {
    let store = if config.patterns.path.exists() {
        PatternStore::load(&config.patterns.path)?
    } else {
        PatternStore::new()
    };
    let classifier = QuestClassifier::new(store);
    let info = classifier.classify(text);

    println!("{} {}", "Type:".bold(), info.quest_type.to_string().green());
    println!("{} {}", "Action:".bold(), info.action);
    println!("{} {:.2} ({})", "Confidence:".bold(), info.confidence, info.source);
    if !info.matched_keyword.is_empty() {
        println!("{} {}", "Keyword:".bold(), info.matched_keyword);
    }
    if !info.target.is_empty() {
        println!("{} {}", "Target:".bold(), info.target);
    }
    if info.has_progress() {
        println!("{} {}/{}", "Progress:".bold(), info.current_count, info.required_count);
    }
    Ok(())
}
