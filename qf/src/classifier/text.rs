//! Quest text cleanup and extraction helpers

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::QuestType;

/// Rich-text tags: `<color=#fff>`, `</b>`, `[color=red]`, `[/color]`
static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<[^<>]*>|\[/?(?:color|b|i|u|s|size|sup|sub|url)(?:=[^\]]*)?\]").expect("markup regex")
});

/// `(current/total)` with optional tags or spaces around either number
static PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?:\s|<[^<>]*>)*(\d+)(?:\s|<[^<>]*>)*/(?:\s|<[^<>]*>)*(\d+)(?:\s|<[^<>]*>)*\)")
        .expect("progress regex")
});

static PLAIN_PROGRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s*\d+\s*/\s*\d+\s*\)").expect("plain progress regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Words that end an addressee name in talk quests
const LINKING_WORDS: [&str; 2] = [" to ", " for "];

/// Words kept for a kill target
const KILL_TARGET_WORDS: usize = 3;

/// Words in a learned-pattern signature
const SIGNATURE_WORDS: usize = 3;

/// Remove rich-text markup and collapse whitespace
pub fn strip_markup(text: &str) -> String {
    let stripped = MARKUP.replace_all(text, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Parse the first `(current/total)` counter
pub fn extract_progress(text: &str) -> Option<(u32, u32)> {
    let caps = PROGRESS.captures(text)?;
    let current = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

/// Comparison key for a quest: no markup, no counters, lowercase
///
/// Two texts with the same key describe the same quest even if the kill
/// counter moved.
pub fn quest_key(text: &str) -> String {
    let stripped = strip_markup(text);
    let without_counts = PLAIN_PROGRESS.replace_all(&stripped, " ");
    WHITESPACE
        .replace_all(without_counts.trim(), " ")
        .to_lowercase()
}

/// First few words of the quest key, used to learn quests no rule knows
pub fn signature(text: &str) -> Option<String> {
    let key = quest_key(text);
    let words: Vec<&str> = key.split(' ').filter(|w| !w.is_empty()).take(SIGNATURE_WORDS).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Byte span of `needle` in `haystack`, ignoring case
///
/// With `whole_word` the match must not sit inside a longer word. Offsets are
/// in `haystack`'s own bytes, so slicing with them is always on a char
/// boundary.
fn find_ci(haystack: &str, needle: &str, whole_word: bool) -> Option<(usize, usize)> {
    let escaped = regex::escape(needle);
    let pattern = if whole_word {
        format!(r"(?i)\b{}\b", escaped)
    } else {
        format!("(?i){}", escaped)
    };
    let re = Regex::new(&pattern).ok()?;
    re.find(haystack).map(|m| (m.start(), m.end()))
}

fn trim_target(s: &str) -> String {
    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '.' | '!' | '-' | '"' | '\''))
        .to_string()
}

/// Best-effort name of the NPC or mob a quest is about
///
/// `clean` must already be stripped of markup.
pub fn extract_target(clean: &str, keyword: &str, quest_type: QuestType) -> String {
    let Some((_, end)) = find_ci(clean, keyword, true) else {
        return String::new();
    };
    let rest = &clean[end..];
    let rest = match rest.find('(') {
        Some(paren) => &rest[..paren],
        None => rest,
    };

    match quest_type {
        QuestType::Talk => {
            let padded = format!(" {} ", rest.trim());
            let end = LINKING_WORDS
                .iter()
                .filter_map(|w| find_ci(&padded, w, false).map(|(start, _)| start))
                .min()
                .unwrap_or(padded.len());
            trim_target(&padded[..end])
        }
        QuestType::Kill => {
            let words: Vec<&str> = rest
                .split_whitespace()
                .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
                .take(KILL_TARGET_WORDS)
                .collect();
            trim_target(&words.join(" "))
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<color=#ffcc00>Talk to</color>  Elder Wu"), "Talk to Elder Wu");
        assert_eq!(strip_markup("[b]Defeat[/b] [color=red]wolves[/color]"), "Defeat wolves");
        assert_eq!(strip_markup("  plain  text "), "plain text");
    }

    #[test]
    fn test_strip_markup_keeps_progress() {
        assert_eq!(strip_markup("Kill wolves (3/10)"), "Kill wolves (3/10)");
    }

    #[test]
    fn test_extract_progress_plain() {
        assert_eq!(extract_progress("Kill wolves (3/10)"), Some((3, 10)));
        assert_eq!(extract_progress("Kill wolves ( 3 / 10 )"), Some((3, 10)));
    }

    #[test]
    fn test_extract_progress_with_markup() {
        assert_eq!(extract_progress("Kill wolves (<color=#ff0000>3</color>/10)"), Some((3, 10)));
        assert_eq!(
            extract_progress("Kill wolves (<color=red>3</color>/<b>10</b>)"),
            Some((3, 10))
        );
    }

    #[test]
    fn test_extract_progress_absent() {
        assert_eq!(extract_progress("Talk to Elder Wu"), None);
        assert_eq!(extract_progress("Kill wolves (a/b)"), None);
    }

    #[test]
    fn test_quest_key_ignores_counts_and_markup() {
        assert_eq!(
            quest_key("Kill <b>wolves</b> (3/10)"),
            quest_key("kill wolves (<color=red>4</color>/10)")
        );
        assert_eq!(quest_key("Kill wolves (3/10)"), "kill wolves");
    }

    #[test]
    fn test_signature() {
        assert_eq!(
            signature("Recover the Ancient Relic (0/3)").as_deref(),
            Some("recover the ancient")
        );
        assert_eq!(signature("   ").as_deref(), None);
    }

    #[test]
    fn test_talk_target_stops_at_linking_word() {
        assert_eq!(extract_target("Talk to Elder Wu for your reward", "talk to", QuestType::Talk), "Elder Wu");
        assert_eq!(
            extract_target("Report to the Captain to receive orders", "report to", QuestType::Talk),
            "the Captain"
        );
        assert_eq!(extract_target("Talk to Elder Wu.", "talk to", QuestType::Talk), "Elder Wu");
    }

    #[test]
    fn test_kill_target_takes_first_words() {
        assert_eq!(
            extract_target("Defeat 10 Forest Wolves (3/10)", "defeat", QuestType::Kill),
            "Forest Wolves"
        );
        assert_eq!(
            extract_target("Kill the Giant Cave Spider Queen", "kill", QuestType::Kill),
            "the Giant Cave"
        );
    }

    #[test]
    fn test_target_with_non_ascii_text() {
        // Lowercasing changes the byte length of these letters
        assert_eq!(
            extract_target("ẞẞẞẞẞKill wolves ȺȺȺȺȺ", "kill", QuestType::Kill),
            ""
        );
        assert_eq!(
            extract_target("ẞẞẞẞẞ Kill wolves ȺȺȺȺȺ", "kill", QuestType::Kill),
            "wolves ȺȺȺȺȺ"
        );
        assert_eq!(extract_target("ẞ Kill wolves Ⱥ", "kill", QuestType::Kill), "wolves Ⱥ");
        assert_eq!(
            extract_target("Talk to Ärztin Öztürk for your reward", "talk to", QuestType::Talk),
            "Ärztin Öztürk"
        );
        assert_eq!(
            extract_target("ȺȺ talk to Großmutter Ⱥ FOR tea", "talk to", QuestType::Talk),
            "Großmutter Ⱥ"
        );
    }

    #[test]
    fn test_target_keyword_must_be_a_word() {
        assert_eq!(
            extract_target("Learn a skill then kill two boars", "kill", QuestType::Kill),
            "two boars"
        );
    }

    #[test]
    fn test_target_missing_keyword() {
        assert_eq!(extract_target("Wander around", "talk to", QuestType::Talk), "");
        assert_eq!(extract_target("Collect herbs", "collect", QuestType::Collect), "");
    }
}
