//! Text clean-up shared by every source adapter.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid url regex"));
static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "[",
        r"\x{1F600}-\x{1F64F}", // emoticons
        r"\x{1F300}-\x{1F5FF}", // symbols & pictographs
        r"\x{1F680}-\x{1F6FF}", // transport & map
        r"\x{1F1E0}-\x{1F1FF}", // flags
        "]+"
    ))
    .expect("valid emoji regex")
});
static RT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RT @[^:]+: ").expect("valid retweet regex"));
static BLOCK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</p>").expect("valid block tag regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid tag regex"));
static MULTISPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Remove HTML markup and decode the handful of entities Mastodon emits.
#[must_use]
pub fn strip_html(text: &str) -> String {
    let spaced = BLOCK_TAG_RE.replace_all(text, " ");
    let bare = TAG_RE.replace_all(&spaced, "");
    bare.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Compose to NFC, strip markup, URLs, emoji and a leading retweet marker,
/// then collapse whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let text = strip_html(&composed);
    let text = URL_RE.replace_all(&text, "");
    let text = EMOJI_RE.replace_all(&text, "");
    let text = RT_PREFIX_RE.replace(&text, "");
    MULTISPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Keep at most `max_tokens` whitespace-separated words.
#[must_use]
pub fn truncate_tokens(text: &str, max_tokens: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_tokens {
        return text.to_string();
    }
    words[..max_tokens].join(" ")
}

/// Guess the language of `text` as an ISO 639-1 code, or the 639-3 code for
/// languages without a two-letter form. `None` for blank or undetectable
/// text.
#[must_use]
pub fn detect_language(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let code = whatlang::detect(text)?.lang().code();
    let short = isolang::Language::from_639_3(code).and_then(|lang| lang.to_639_1());
    Some(short.unwrap_or(code).to_string())
}

/// The provider's language tag when it names one, otherwise a detected guess.
/// Twitter's `und` (undetermined) counts as no tag.
#[must_use]
pub fn resolve_language(provider: Option<String>, text: &str) -> Option<String> {
    provider
        .filter(|tag| !tag.trim().is_empty() && tag != "und")
        .or_else(|| detect_language(text))
}

/// [`normalize_text`] followed by [`truncate_tokens`].
#[must_use]
pub fn clean_text(text: &str, max_tokens: usize) -> String {
    truncate_tokens(&normalize_text(text), max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_removes_urls_emoji_and_whitespace() {
        let text = "Bitcoin 🚀🚀 hits new high!   https://t.co/abc  \n\n details";
        assert_eq!(normalize_text(text), "Bitcoin hits new high! details");
    }

    #[test]
    fn normalize_strips_retweet_prefix() {
        assert_eq!(
            normalize_text("RT @whale_alert: 1,000 BTC moved"),
            "1,000 BTC moved"
        );
        assert_eq!(
            normalize_text("not a RT @x: prefix"),
            "not a RT @x: prefix"
        );
    }

    #[test]
    fn normalize_strips_html_and_decodes_entities() {
        let html = "<p>ETH &amp; SOL rally</p><p>Fed&#39;s move<br/>next</p>";
        assert_eq!(normalize_text(html), "ETH & SOL rally Fed's move next");
    }

    #[test]
    fn comparison_operators_are_not_mistaken_for_tags() {
        assert_eq!(normalize_text("BTC < 50k and ETH > 3k"), "BTC < 50k and ETH > 3k");
    }

    #[test]
    fn decomposed_text_is_composed() {
        let decomposed = "cafe\u{301} crypto";
        assert_eq!(normalize_text(decomposed), "caf\u{e9} crypto");
        assert_eq!(normalize_text(decomposed), normalize_text("caf\u{e9} crypto"));
    }

    const ENGLISH: &str = "The central bank said on Wednesday that it would keep interest \
        rates unchanged while inflation remains well above its target for the rest of the year.";

    #[test]
    fn detects_english_as_two_letter_code() {
        assert_eq!(detect_language(ENGLISH).as_deref(), Some("en"));
        assert_eq!(detect_language("   "), None);
    }

    #[test]
    fn provider_language_wins_unless_undetermined() {
        assert_eq!(resolve_language(Some("es".to_string()), ENGLISH).as_deref(), Some("es"));
        assert_eq!(resolve_language(Some("und".to_string()), ENGLISH).as_deref(), Some("en"));
        assert_eq!(resolve_language(None, ENGLISH).as_deref(), Some("en"));
        assert_eq!(resolve_language(None, ""), None);
    }

    #[test]
    fn truncate_keeps_first_tokens() {
        assert_eq!(truncate_tokens("one two three four", 2), "one two");
        assert_eq!(truncate_tokens("one two", 5), "one two");
        assert_eq!(truncate_tokens("", 3), "");
    }

    #[test]
    fn clean_text_combines_both_steps() {
        assert_eq!(clean_text("a  b https://x.io c d", 3), "a b c");
    }
}
