use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use patternstore::PatternStore;
use patternstore::cli::{Cli, Command};
use patternstore::config::Config;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path.clone());

    info!("patternstore opening {}", store_path.display());
    let mut store = PatternStore::open(&store_path)?;

    match cli.command {
        Command::List { established } => {
            let mut patterns: Vec<_> = store
                .patterns()
                .filter(|p| !established || p.is_established())
                .collect();
            patterns.sort_by(|a, b| {
                b.success_rate
                    .total_cmp(&a.success_rate)
                    .then_with(|| b.seen_count.cmp(&a.seen_count))
            });
            if patterns.is_empty() {
                println!("No patterns found");
            }
            for p in patterns {
                let rate = format!("{:>5.1}%", p.success_rate * 100.0);
                let rate = if p.is_established() { rate.green() } else { rate.dimmed() };
                println!("{} {:>4}x {:<10} {}", rate, p.seen_count, p.inferred_type.cyan(), p.keyword);
            }
        }
        Command::Show { keyword } => match store.get(&keyword) {
            Some(p) => {
                println!("Keyword: {}", p.keyword.cyan());
                println!("  Type: {}", p.inferred_type);
                println!("  Success rate: {:.3}", p.success_rate);
                println!("  Seen: {}", p.seen_count);
                println!("  Established: {}", p.is_established());
                println!("  Actions: {}", p.actions.join(", "));
                println!("  Dominant action: {}", p.dominant_action().unwrap_or("none"));
            }
            None => println!("{} No pattern for '{}'", "✗".red(), keyword),
        },
        Command::Stats => {
            let stats = store.stats();
            println!("Store: {}", store_path.display().to_string().cyan());
            println!("  Sessions: {}", store.total_sessions());
            println!("  Patterns: {}", stats.pattern_count);
            println!("  Established: {}", stats.established_count);
            println!("  Observations: {}", stats.total_observations);
            println!("  Mean success rate: {:.3}", stats.mean_success_rate);
        }
        Command::Forget { keyword } => {
            if store.remove(&keyword).is_some() {
                store.save()?;
                println!("{} Forgot: {}", "✓".green(), keyword);
            } else {
                println!("{} No pattern for '{}'", "✗".red(), keyword);
            }
        }
        Command::Prune { min_rate } => {
            let min_rate = min_rate.unwrap_or(config.prune_min_rate);
            let removed = store.prune(min_rate);
            if removed > 0 {
                store.save()?;
            }
            println!("{} Pruned {} pattern(s)", "✓".green(), removed);
        }
    }

    Ok(())
}
