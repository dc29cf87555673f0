//! URL and mention extraction from message text.
//!
//! Best-effort and infallible: text without matches yields empty lists.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

/// Characters dropped from the end of a URL token.
const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"', ')', ']', '}', '>'];

/// Metadata found in a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// `http(s)://` links in order of appearance, duplicates kept.
    pub urls: Vec<String>,
    /// `@name` tokens in order of appearance, duplicates kept.
    pub mentions: Vec<String>,
}

fn url_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)https?://\S+")
            .map_err(|e| tracing::warn!("URL pattern failed to compile, links not extracted: {e}"))
            .ok()
    })
    .as_ref()
}

fn mention_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[^\w.])(@[\w.]+)")
            .map_err(|e| tracing::warn!("Mention pattern failed to compile, mentions not extracted: {e}"))
            .ok()
    })
    .as_ref()
}

/// Scans `text` for URLs and mentions.
#[must_use]
pub fn extract(text: &str) -> Extracted {
    let (urls, url_spans) = find_urls(text);
    let mentions = find_mentions(text, &url_spans);
    Extracted { urls, mentions }
}

fn find_urls(text: &str) -> (Vec<String>, Vec<Range<usize>>) {
    let Some(re) = url_regex() else {
        return (Vec::new(), Vec::new());
    };

    let mut urls = Vec::new();
    let mut spans = Vec::new();
    for m in re.find_iter(text) {
        let url = m.as_str().trim_end_matches(URL_TRAILING_PUNCTUATION);
        // Bare scheme with nothing after it.
        if url.len() <= url.find("://").map_or(0, |i| i + 3) {
            continue;
        }
        spans.push(m.range());
        urls.push(url.to_string());
    }
    (urls, spans)
}

fn find_mentions(text: &str, url_spans: &[Range<usize>]) -> Vec<String> {
    let Some(re) = mention_regex() else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter(|m| !url_spans.iter().any(|span| span.contains(&m.start())))
        .map(|m| m.as_str().trim_end_matches('.'))
        .filter(|mention| mention.len() > 1)
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert!(url_regex().is_some());
        assert!(mention_regex().is_some());
    }

    #[test]
    fn test_url_and_mention_together() {
        let found = extract("see https://x.test/a?b=1 and @alice.bob thanks");
        assert_eq!(found.urls, vec!["https://x.test/a?b=1"]);
        assert_eq!(found.mentions, vec!["@alice.bob"]);
    }

    #[test]
    fn test_plain_text_yields_nothing() {
        assert_eq!(extract("nothing to see here"), Extracted::default());
        assert_eq!(extract(""), Extracted::default());
    }

    #[test]
    fn test_trailing_punctuation_is_stripped() {
        let found = extract("Read this (https://example.com/page). Or http://b.test/x?y=2!");
        assert_eq!(
            found.urls,
            vec!["https://example.com/page", "http://b.test/x?y=2"]
        );
    }

    #[test]
    fn test_duplicates_are_preserved_in_order() {
        let found = extract("https://a.test https://b.test https://a.test");
        assert_eq!(
            found.urls,
            vec!["https://a.test", "https://b.test", "https://a.test"]
        );
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(extract("HTTPS://Example.com").urls, vec!["HTTPS://Example.com"]);
    }

    #[test]
    fn test_bare_scheme_is_ignored() {
        assert!(extract("type https:// then the host").urls.is_empty());
    }

    #[test]
    fn test_email_is_not_a_mention() {
        assert!(extract("mail bob@example.com").mentions.is_empty());
    }

    #[test]
    fn test_mentions_at_start_and_after_punctuation() {
        let found = extract("@sam, ping (@jo_1) and @sam again.");
        assert_eq!(found.mentions, vec!["@sam", "@jo_1", "@sam"]);
    }

    #[test]
    fn test_mention_inside_url_is_ignored() {
        let found = extract("post at https://medium.com/@writer/post by @writer");
        assert_eq!(found.urls, vec!["https://medium.com/@writer/post"]);
        assert_eq!(found.mentions, vec!["@writer"]);
    }

    #[test]
    fn test_lone_at_sign_is_ignored() {
        assert!(extract("meet @ 5, or @. ok").mentions.is_empty());
    }
}
