//! Renders a link preview as reply text.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::entities::Embed;

static BARE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("Invalid regex"));

/// Formats an embed as `**title** description`.
///
/// The title falls back to the author name, then the provider name. Only the
/// first line of the description is kept, and URLs in it are wrapped in angle
/// brackets so the chat client does not preview them again.
#[must_use]
pub fn format_embed(embed: &Embed) -> String {
    let title = [&embed.title, &embed.author_name, &embed.provider_name]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty());

    let description = embed
        .description
        .as_deref()
        .and_then(|d| d.lines().next())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| BARE_URL_RE.replace_all(d, "<$0>").into_owned());

    match (title, description) {
        (Some(title), Some(description)) => format!("**{title}** {description}"),
        (Some(title), None) => format!("**{title}**"),
        (None, Some(description)) => description,
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_first_line() {
        let embed = Embed::titled("Cat video").with_description("first line\nsecond line");
        assert_eq!(format_embed(&embed), "**Cat video** first line");
    }

    #[test]
    fn test_title_fallbacks() {
        let by_author = Embed::default().with_author_name("someone (@someone)");
        assert_eq!(format_embed(&by_author), "**someone (@someone)**");

        let by_provider = Embed::default().with_provider_name("TikTok");
        assert_eq!(format_embed(&by_provider), "**TikTok**");
    }

    #[test]
    fn test_urls_are_wrapped() {
        let embed = Embed::default().with_description("see https://t.co/abc now");
        assert_eq!(format_embed(&embed), "see <https://t.co/abc> now");
    }

    #[test]
    fn test_empty_embed() {
        assert_eq!(format_embed(&Embed::default()), "");
        assert_eq!(format_embed(&Embed::titled("  ")), "");
    }
}
