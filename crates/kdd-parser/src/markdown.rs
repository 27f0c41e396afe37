//! Markdown body parsing: ATX section tree, table capture, snippets.

use kdd_domain::Section;
use regex::Regex;
use std::sync::OnceLock;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("heading regex"))
}

/// Parse a markdown body into a flat, ordered list of sections.
///
/// Each section captures its heading, level (1-6), raw content, and the
/// dot-separated anchor path built from the heading ancestry. Fenced code
/// blocks (including mermaid) are captured verbatim inside the enclosing
/// section; a `#` inside a fence is not a heading.
#[must_use]
pub fn parse_sections(body: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut heading_stack: Vec<(String, u8)> = Vec::new();
    let mut current_lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    let flush = |sections: &mut Vec<Section>,
                 heading_stack: &[(String, u8)],
                 lines: &[&str]| {
        if let Some((heading, level)) = heading_stack.last() {
            let path = heading_stack
                .iter()
                .map(|(h, _)| heading_to_anchor(h))
                .collect::<Vec<_>>()
                .join(".");
            sections.push(Section {
                heading: heading.clone(),
                level: *level,
                content: lines.join("\n").trim().to_string(),
                path,
            });
        }
    };

    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            current_lines.push(line);
            continue;
        }
        if in_fence {
            current_lines.push(line);
            continue;
        }

        if let Some(caps) = heading_re().captures(line) {
            flush(&mut sections, &heading_stack, &current_lines);
            current_lines.clear();

            let level = caps[1].len() as u8;
            let heading = caps[2].trim().to_string();

            while heading_stack
                .last()
                .is_some_and(|(_, l)| *l >= level)
            {
                heading_stack.pop();
            }
            heading_stack.push((heading, level));
        } else {
            current_lines.push(line);
        }
    }
    flush(&mut sections, &heading_stack, &current_lines);

    sections
}

/// Convert a heading into a GitHub-style anchor slug.
#[must_use]
pub fn heading_to_anchor(heading: &str) -> String {
    let mut slug = String::with_capacity(heading.len());
    for c in heading.trim().chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else if c.is_whitespace() {
            slug.push('-');
        } else if c == '-' || c == '_' {
            slug.push(c);
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    while slug.starts_with('-') {
        slug.remove(0);
    }
    slug
}

/// Parse a pipe-table into header-keyed rows. The separator line (`|---|`)
/// is skipped; short rows are dropped.
#[must_use]
pub fn parse_table_rows(content: &str) -> Vec<Vec<(String, String)>> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('|'))
        .collect();
    if lines.len() < 2 {
        return Vec::new();
    }

    let split = |line: &str| -> Vec<String> {
        line.trim_matches('|')
            .split('|')
            .map(|c| c.trim().trim_matches('`').to_string())
            .collect()
    };

    let headers = split(lines[0]);
    let mut rows = Vec::new();
    for line in lines.iter().skip(2) {
        let cells = split(line);
        if cells.len() >= headers.len() {
            rows.push(headers.iter().cloned().zip(cells).collect());
        }
    }
    rows
}

/// Extract a plain-text snippet from markdown content: strips headings,
/// emphasis, and inline links, then truncates at a sentence or word
/// boundary.
#[must_use]
pub fn extract_snippet(content: &str, max_length: usize) -> String {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    static ITALIC: OnceLock<Regex> = OnceLock::new();
    static LINK: OnceLock<Regex> = OnceLock::new();
    static HEADING: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();

    let text = HEADING
        .get_or_init(|| Regex::new(r"(?m)^#+\s+").expect("snippet regex"))
        .replace_all(content.trim(), "");
    let text = BOLD
        .get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").expect("snippet regex"))
        .replace_all(&text, "$1");
    let text = ITALIC
        .get_or_init(|| Regex::new(r"\*([^*]+)\*").expect("snippet regex"))
        .replace_all(&text, "$1");
    let text = LINK
        .get_or_init(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("snippet regex"))
        .replace_all(&text, "$1");
    let text = SPACE
        .get_or_init(|| Regex::new(r"\s+").expect("snippet regex"))
        .replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_length).collect();
    if let Some(period) = truncated.rfind(". ") {
        if period > max_length / 2 {
            return truncated[..=period].to_string();
        }
    }
    if let Some(space) = truncated.rfind(' ') {
        if space > max_length / 2 {
            return format!("{}...", &truncated[..space]);
        }
    }
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_hierarchical_paths() {
        let body = "# Pedido\n\nIntro.\n\n## Descripción\n\nUn pedido.\n\n## Atributos\n\n### Detalle\n\nMás.\n";
        let sections = parse_sections(body);
        let paths: Vec<&str> = sections.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "pedido",
                "pedido.descripción",
                "pedido.atributos",
                "pedido.atributos.detalle"
            ]
        );
        assert_eq!(sections[1].content, "Un pedido.");
        assert_eq!(sections[3].level, 3);
    }

    #[test]
    fn sibling_headings_pop_the_stack() {
        let body = "## A\n\na\n\n### A1\n\na1\n\n## B\n\nb\n";
        let sections = parse_sections(body);
        assert_eq!(sections[2].path, "b");
    }

    #[test]
    fn fenced_blocks_are_opaque() {
        let body = "## Diagrama\n\n```mermaid\ngraph TD\n# not a heading\nA-->B\n```\n";
        let sections = parse_sections(body);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("# not a heading"));
    }

    #[test]
    fn table_rows_are_header_keyed() {
        let content = "| Relación | Cardinalidad | Entidad |\n|---|---|---|\n| pertenece_a | N:1 | [[Usuario]] |\n";
        let rows = parse_table_rows(content);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], ("Relación".to_string(), "pertenece_a".to_string()));
        assert_eq!(rows[0][1].1, "N:1");
    }

    #[test]
    fn short_table_is_empty() {
        assert!(parse_table_rows("| only | header |").is_empty());
    }

    #[test]
    fn snippet_strips_markdown() {
        let s = extract_snippet("## Title\n\nSome **bold** and [link](http://x) text.", 200);
        assert_eq!(s, "Some bold and link text.");
    }

    #[test]
    fn snippet_truncates_at_sentence() {
        let long = format!("{}. {}", "a".repeat(120), "b".repeat(120));
        let s = extract_snippet(&long, 160);
        assert!(s.ends_with('.'));
        assert!(s.len() <= 160);
    }

    #[test]
    fn anchor_slugs() {
        assert_eq!(heading_to_anchor("Cuándo aplica"), "cuándo-aplica");
        assert_eq!(heading_to_anchor("Problema / Oportunidad"), "problema--oportunidad");
    }
}
