use regex::Regex;
use std::sync::LazyLock;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://\S+").expect("Invalid regex"));

/// Finds the candidate source link in a chat message.
pub struct LinkDetector;

impl LinkDetector {
    /// Returns the first `https://` link in the content, if any.
    ///
    /// Only one link per message is ever considered.
    #[must_use]
    pub fn first_link(content: &str) -> Option<&str> {
        if !content.contains("https://") {
            return None;
        }
        LINK_RE.find(content).map(|m| m.as_str())
    }
}
