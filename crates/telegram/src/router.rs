//! Recognizes messages that carry a supported video link.

use std::sync::LazyLock;

use {reelay_config::RouterConfig, regex::Regex};

/// An `http(s)://` link up to whitespace, quotes or brackets.
#[allow(clippy::expect_used)]
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>\[\](){}"',]+"#).expect("valid url pattern")
});

/// Sentence punctuation that ends up glued to a link in chat.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Matches chat text against the supported source domains.
#[derive(Debug, Clone)]
pub struct LinkRouter {
    domains: Vec<String>,
}

impl LinkRouter {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(&config.domains)
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// First configured domain occurring in `text`, case-insensitively.
    pub fn matched_domain(&self, text: &str) -> Option<&str> {
        let lower = text.to_ascii_lowercase();
        self.domains
            .iter()
            .find(|d| lower.contains(d.as_str()))
            .map(String::as_str)
    }

    /// Link to fetch for a message, or `None` if the text mentions no
    /// supported domain.
    ///
    /// Prefers the first `http(s)://` token that contains a supported domain
    /// and falls back to the whole trimmed text.
    pub fn extract_link(&self, text: &str) -> Option<String> {
        self.matched_domain(text)?;

        let link = URL_RE
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
            .find(|link| self.matched_domain(link).is_some())
            .unwrap_or_else(|| text.trim());
        Some(link.to_string())
    }
}
