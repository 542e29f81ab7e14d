//! Pull the addressee and the code snippet out of a message body.

use once_cell::sync::Lazy;
use regex::Regex;

static REPLY_TO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@([^>]+)>:").expect("regex"));

/// User id from a leading `<@id>:` mention. Mentions anywhere but the very start don't count.
pub fn reply_to_id(text: &str) -> Option<&str> {
    REPLY_TO
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Snippet addressed to `reply_to_id`: drop the mention prefix, require a backtick fence at
/// both ends, strip every leading/trailing backtick and decode HTML entities (Slack escapes
/// `<`, `>` and `&`). `None` when there is no fenced body.
///
/// Fence lengths are not matched: "`x```" is accepted the same as "```x```".
pub fn extract_snippet(text: &str, reply_to_id: &str) -> Option<String> {
    let prefix = format!("<@{}>:", reply_to_id);
    let body = text.strip_prefix(prefix.as_str()).unwrap_or(text).trim();
    if !body.starts_with('`') || !body.ends_with('`') {
        return None;
    }
    let code = body.trim_matches('`');
    if code.trim().is_empty() {
        return None;
    }
    Some(html_escape::decode_html_entities(code).into_owned())
}
