//! Slack markup cleanup for display.

use once_cell::sync::Lazy;
use regex::Regex;

static SUBTEAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!subteam\^[^>]+>").unwrap());
static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@\w+(?:\|[^>]*)?>").unwrap());
static LABELED_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(?:https?|mailto):[^|>]+\|([^>]+)>").unwrap());
static BARE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<((?:https?|mailto):[^>]+)>").unwrap());

/// Strip Slack's angle-bracket markup from `text`.
///
/// - `<!subteam^S123>` and `<!subteam^S123|@handle>` become `group_label`
/// - `<@U123>` user mentions are removed
/// - `<https://x|label>` becomes `label`, `<https://x>` becomes `https://x`
pub fn clean_text(text: &str, group_label: &str) -> String {
    let text = SUBTEAM.replace_all(text, regex::NoExpand(group_label));
    let text = USER_MENTION.replace_all(&text, "");
    let text = LABELED_LINK.replace_all(&text, "$1");
    let text = BARE_LINK.replace_all(&text, "$1");
    text.trim().to_string()
}

/// Case-insensitive substring test used as the keyword trigger.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    text.to_lowercase().contains(&keyword.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_group_and_user_mentions() {
        let raw = "<!subteam^S06TG9U38ET|@ai_acq> can someone help <@U12345> with this?";
        assert_eq!(
            clean_text(raw, "@AI_Acquisition"),
            "@AI_Acquisition can someone help  with this?"
        );
    }

    #[test]
    fn test_clean_links() {
        assert_eq!(
            clean_text("see <https://example.com/doc|the doc>", "@g"),
            "see the doc"
        );
        assert_eq!(
            clean_text("see <https://example.com/doc>", "@g"),
            "see https://example.com/doc"
        );
    }

    #[test]
    fn test_group_label_is_literal() {
        assert_eq!(clean_text("<!subteam^S1>", "$1 team"), "$1 team");
    }

    #[test]
    fn test_contains_keyword_ignores_case() {
        assert!(contains_keyword("Ping @AI_ACQ please", "ai_acq"));
        assert!(!contains_keyword("unrelated", "ai_acq"));
    }

    #[test]
    fn test_keyword_matches_raw_group_mention() {
        let raw = "<!subteam^S0123ABC> can someone look at this?";
        assert!(!contains_keyword(raw, "ai_acq"));
        assert!(contains_keyword(raw, "<!subteam^S0123ABC"));
        assert!(contains_keyword("<!subteam^S0123ABC|@ai_acq> ping", "<!subteam^s0123abc"));
    }
}
