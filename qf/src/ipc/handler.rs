//! Builds responses for consumed commands
//!
//! Responses are plain `key: value` lines so a controller can show them
//! verbatim or grep them.

use std::fmt::Write as _;

use tracing::info;

use super::messages::{COMMAND_VOCABULARY, ChannelCommand};
use crate::classifier::QuestClassifier;
use crate::domain::{BotState, MAX_SPEED};
use crate::farm::FarmStateMachine;
use crate::logging::LogTail;

/// Lines returned by `log`
pub const LOG_RESPONSE_LINES: usize = 20;

/// Read-only views the handler may report on
pub struct HandlerContext<'a> {
    pub machine: &'a FarmStateMachine,
    pub classifier: &'a QuestClassifier,
    pub log_tail: Option<&'a LogTail>,
}

/// Execute a command and return its response text
pub fn handle_command(command: &ChannelCommand, bot: &mut BotState, ctx: &HandlerContext<'_>) -> String {
    match command {
        ChannelCommand::Ping => format!("pong\naccount: {}", bot.account_id),
        ChannelCommand::Status => status_response(bot, ctx),
        ChannelCommand::Quest => quest_response(bot, ctx),
        ChannelCommand::Map => {
            let (x, y) = bot.location.rounded();
            format!(
                "scene: {}\nmap: {}\nposition: {}, {}",
                or_none(&bot.location.scene),
                or_none(&bot.location.map_name),
                x,
                y
            )
        }
        ChannelCommand::Boss => match &bot.last_boss {
            Some(boss) => format!("boss: {}\nmap: {}", boss.text, or_none(&boss.map_name)),
            None => "boss: none sighted".to_string(),
        },
        ChannelCommand::ToggleAuto => {
            let enabled = bot.toggle_auto();
            info!(enabled, "handle_command: automation toggled");
            format!("auto: {}", on_off(enabled))
        }
        ChannelCommand::ToggleAttack => {
            let enabled = bot.toggle_attack();
            info!(enabled, "handle_command: attack toggled");
            format!("attack: {}", on_off(enabled))
        }
        ChannelCommand::Log => log_response(ctx),
        ChannelCommand::Speed(requested) => {
            let speed = match requested {
                Some(n) => bot.set_speed(*n).unwrap_or(bot.speed),
                None => bot.cycle_speed(),
            };
            info!(speed, "handle_command: speed changed");
            format!("speed: {}x", speed)
        }
        ChannelCommand::InvalidSpeed(arg) => format!(
            "invalid speed: {}\nusage: speed [n] with 0 < n <= {}\nspeed: {}x",
            arg, MAX_SPEED, bot.speed
        ),
        ChannelCommand::Unknown(token) => {
            format!("unknown command: {}\ncommands: {}", token, COMMAND_VOCABULARY.join(", "))
        }
    }
}

fn status_response(bot: &BotState, ctx: &HandlerContext<'_>) -> String {
    let counters = ctx.machine.counters();
    let mut out = String::new();
    let _ = writeln!(out, "account: {}", bot.account_id);
    let _ = writeln!(out, "auto: {}", on_off(bot.flags.auto_enabled));
    let _ = writeln!(out, "attack: {}", on_off(bot.flags.attack_enabled));
    let _ = writeln!(out, "headless: {}", on_off(bot.flags.headless_enabled));
    let _ = writeln!(out, "speed: {}x", bot.speed);
    let _ = writeln!(out, "state: {}", ctx.machine.state());
    let _ = writeln!(out, "quests completed: {}", counters.quests_completed);
    let _ = writeln!(out, "session: {:.0}s", counters.session_secs);
    let _ = write!(out, "quest: {}", or_none(&bot.quest_text));
    out
}

fn quest_response(bot: &BotState, ctx: &HandlerContext<'_>) -> String {
    let info = ctx.classifier.current();
    if info.is_empty() {
        return "quest: none".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "quest: {}", info.quest_text);
    let _ = writeln!(out, "type: {}", info.quest_type);
    let _ = writeln!(out, "action: {}", info.action);
    let _ = writeln!(out, "target: {}", or_none(&info.target));
    if info.has_progress() {
        let _ = writeln!(out, "progress: {}/{}", info.current_count, info.required_count);
    }
    let _ = writeln!(out, "confidence: {:.2} ({})", info.confidence, info.source);
    if !bot.quest_hint.is_empty() {
        let _ = writeln!(out, "hint: {}", bot.quest_hint);
    }
    let _ = write!(out, "collect active: {}", on_off(bot.collect_active));
    out
}

fn log_response(ctx: &HandlerContext<'_>) -> String {
    let lines = ctx
        .log_tail
        .map(|tail| tail.recent(LOG_RESPONSE_LINES))
        .unwrap_or_default();
    if lines.is_empty() {
        "log: empty".to_string()
    } else {
        lines.join("\n")
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn or_none(value: &str) -> &str {
    if value.is_empty() { "none" } else { value }
}
