//! Wiki-link extraction.
//!
//! Recognized syntaxes:
//! - `[[Target]]` — intra-domain link
//! - `[[domain::Target]]` — cross-domain link
//! - `[[Target|Display]]` — link with a display alias

use regex::Regex;
use std::sync::OnceLock;

fn wiki_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("wiki-link regex"))
}

/// A parsed `[[...]]` occurrence, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// Full text between the brackets.
    pub raw: String,
    /// Target name without domain prefix or display alias.
    pub target: String,
    /// Set for `[[domain::Target]]`.
    pub domain: Option<String>,
    /// Set for `[[Target|Alias]]`.
    pub alias: Option<String>,
}

/// Extract every wiki-link from `content`, preserving occurrence order.
#[must_use]
pub fn extract_wiki_links(content: &str) -> Vec<WikiLink> {
    let mut links = Vec::new();
    for caps in wiki_link_re().captures_iter(content) {
        let raw = caps[1].trim().to_string();
        if raw.is_empty() {
            continue;
        }

        let mut target = raw.clone();
        let mut domain = None;
        let mut alias = None;

        if let Some((d, t)) = target.split_once("::") {
            domain = Some(d.trim().to_string());
            target = t.trim().to_string();
        }
        if let Some((t, a)) = target.split_once('|') {
            alias = Some(a.trim().to_string());
            target = t.trim().to_string();
        }

        links.push(WikiLink {
            raw,
            target,
            domain,
            alias,
        });
    }
    links
}
