//! Hierarchical chunking of embeddable sections.

use kdd_domain::{embeddable_sections, Document, Section};

const MIN_CHUNK_WORDS: usize = 20;
const SUMMARY_MAX_CHARS: usize = 160;

/// A text chunk ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub section_path: String,
    pub chunk_index: u32,
    pub raw_text: String,
    pub context_text: String,
}

/// Chunk a document's embeddable sections.
///
/// Each paragraph starts a chunk; paragraphs under 20 words fuse into the
/// next one (a trailing short paragraph fuses into the previous chunk).
/// Pipe-tables are always whole, single chunks. Sections whose body is only
/// a fenced block produce nothing.
#[must_use]
pub fn chunk_document(document: &Document) -> Vec<Chunk> {
    let allowed = embeddable_sections(document.kind);
    if allowed.is_empty() {
        return Vec::new();
    }

    let identity = format!("[{}: {}]", document.kind, document.id);
    let mut chunks = Vec::new();

    for section in &document.sections {
        if !allowed.contains(&section.heading.to_lowercase().as_str()) {
            continue;
        }
        if section.content.trim().is_empty() || section.is_opaque() {
            continue;
        }

        let context_prefix = context_prefix(&identity, document, section);
        let mut index: u32 = 0;
        for raw_text in split_chunks(&section.content) {
            let context_text = format!("{context_prefix} > {raw_text}");
            chunks.push(Chunk {
                section_path: section.path.clone(),
                chunk_index: index,
                raw_text,
                context_text,
            });
            index += 1;
        }
    }

    chunks
}

/// Identity line plus ancestor summaries, joined by ` > `.
fn context_prefix(identity: &str, document: &Document, section: &Section) -> String {
    let mut parts = vec![identity.to_string()];

    let segments: Vec<&str> = section.path.split('.').collect();
    for depth in 1..segments.len() {
        let ancestor_path = segments[..depth].join(".");
        if let Some(ancestor) = document
            .sections
            .iter()
            .find(|s| s.path == ancestor_path)
        {
            let summary = first_sentence(&ancestor.content);
            if !summary.is_empty() {
                parts.push(summary);
            }
        }
    }

    parts.join(" > ")
}

/// First sentence of a body, capped at 160 characters.
fn first_sentence(content: &str) -> String {
    let text = content.trim();
    if text.is_empty() || text.starts_with("```") {
        return String::new();
    }
    let first_line = text.lines().next().unwrap_or("");
    let sentence = match first_line.find(". ") {
        Some(pos) => &first_line[..=pos],
        None => first_line,
    };
    let mut summary: String = sentence.chars().take(SUMMARY_MAX_CHARS).collect();
    summary.truncate(summary.trim_end().len());
    summary
}

/// Split a section body into chunk texts, applying the fusion rule.
fn split_chunks(content: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut pending_words = 0;

    let flush = |chunks: &mut Vec<String>, pending: &mut Vec<&str>, pending_words: &mut usize| {
        if !pending.is_empty() {
            chunks.push(pending.join("\n\n"));
            pending.clear();
            *pending_words = 0;
        }
    };

    for paragraph in paragraphs(content) {
        if paragraph.is_table {
            // Tables never fuse: close the running chunk, emit the table whole.
            flush(&mut chunks, &mut pending, &mut pending_words);
            chunks.push(paragraph.text.to_string());
            continue;
        }
        if paragraph.text.starts_with("```") {
            continue;
        }

        pending.push(paragraph.text);
        pending_words += paragraph.word_count;
        if pending_words >= MIN_CHUNK_WORDS {
            flush(&mut chunks, &mut pending, &mut pending_words);
        }
    }

    // A trailing short paragraph fuses into the previous chunk.
    if !pending.is_empty() {
        let rest = pending.join("\n\n");
        match chunks.last_mut() {
            Some(last) if !last.starts_with('|') => {
                last.push_str("\n\n");
                last.push_str(&rest);
            }
            _ => chunks.push(rest),
        }
    }

    chunks
}

struct Paragraph<'a> {
    text: &'a str,
    word_count: usize,
    is_table: bool,
}

/// Split on blank lines, keeping fenced blocks and pipe-tables intact.
fn paragraphs(content: &str) -> Vec<Paragraph<'_>> {
    let mut result = Vec::new();
    let mut start = None;
    let mut in_fence = false;

    let lines: Vec<(usize, &str)> = content
        .split_inclusive('\n')
        .scan(0, |offset, line| {
            let at = *offset;
            *offset += line.len();
            Some((at, line))
        })
        .collect();

    let mut end = 0;
    for (at, line) in &lines {
        let trimmed = line.trim_end();
        if trimmed.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if trimmed.is_empty() && !in_fence {
            if let Some(s) = start.take() {
                push_paragraph(&mut result, &content[s..*at]);
            }
        } else if start.is_none() {
            start = Some(*at);
        }
        end = at + line.len();
    }
    if let Some(s) = start {
        push_paragraph(&mut result, &content[s..end]);
    }

    result
}

fn push_paragraph<'a>(result: &mut Vec<Paragraph<'a>>, raw: &'a str) {
    let text = raw.trim();
    if text.is_empty() {
        return;
    }
    result.push(Paragraph {
        text,
        word_count: text.split_whitespace().count(),
        is_table: text.starts_with('|'),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdd_domain::{Kind, Layer};
    use std::collections::BTreeMap;

    fn doc_with_sections(kind: Kind, sections: Vec<Section>) -> Document {
        Document {
            id: "Pedido".into(),
            kind,
            source_path: "specs/01-domain/entities/Pedido.md".into(),
            source_hash: "h".into(),
            layer: Layer::Domain,
            front_matter: BTreeMap::new(),
            sections,
            wiki_links: vec![],
            domain: None,
        }
    }

    fn section(heading: &str, path: &str, content: &str) -> Section {
        Section {
            heading: heading.into(),
            level: 2,
            content: content.into(),
            path: path.into(),
        }
    }

    #[test]
    fn events_produce_no_chunks() {
        let doc = doc_with_sections(
            Kind::Event,
            vec![section("Descripción", "descripción", "Texto del evento.")],
        );
        assert!(chunk_document(&doc).is_empty());
    }

    #[test]
    fn non_embeddable_sections_are_skipped() {
        let doc = doc_with_sections(
            Kind::Entity,
            vec![
                section("Descripción", "descripción", &"palabra ".repeat(25)),
                section("Atributos", "atributos", &"dato ".repeat(25)),
            ],
        );
        let chunks = chunk_document(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_path, "descripción");
    }

    #[test]
    fn long_paragraphs_are_separate_chunks() {
        let body = format!("{}\n\n{}", "uno ".repeat(25).trim(), "dos ".repeat(25).trim());
        let doc = doc_with_sections(
            Kind::Entity,
            vec![section("Descripción", "descripción", &body)],
        );
        let chunks = chunk_document(&doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[test]
    fn short_paragraph_fuses_into_next() {
        let body = format!("corto aquí\n\n{}", "larga ".repeat(25).trim());
        let doc = doc_with_sections(
            Kind::Entity,
            vec![section("Descripción", "descripción", &body)],
        );
        let chunks = chunk_document(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].raw_text.starts_with("corto aquí"));
    }

    #[test]
    fn trailing_short_paragraph_fuses_into_previous() {
        let body = format!("{}\n\nfinal corto", "larga ".repeat(25).trim());
        let doc = doc_with_sections(
            Kind::Entity,
            vec![section("Descripción", "descripción", &body)],
        );
        let chunks = chunk_document(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].raw_text.ends_with("final corto"));
    }

    #[test]
    fn tables_are_single_chunks() {
        let body = format!(
            "{}\n\n| a | b |\n|---|---|\n| 1 | 2 |",
            "texto ".repeat(25).trim()
        );
        let doc = doc_with_sections(
            Kind::Entity,
            vec![section("Descripción", "descripción", &body)],
        );
        let chunks = chunk_document(&doc);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].raw_text.starts_with('|'));
        assert!(chunks[1].raw_text.contains("| 1 | 2 |"));
    }

    #[test]
    fn mermaid_only_section_produces_nothing() {
        let doc = doc_with_sections(
            Kind::Entity,
            vec![section(
                "Descripción",
                "descripción",
                "```mermaid\ngraph TD\nA-->B\n```",
            )],
        );
        assert!(chunk_document(&doc).is_empty());
    }

    #[test]
    fn context_carries_identity_and_ancestors() {
        let doc = doc_with_sections(
            Kind::Entity,
            vec![
                section(
                    "Pedido",
                    "pedido",
                    "El pedido agrupa artículos comprados. Detalles abajo.",
                ),
                Section {
                    heading: "Descripción".into(),
                    level: 2,
                    content: "contenido ".repeat(25).trim().to_string(),
                    path: "pedido.descripción".into(),
                },
            ],
        );
        let chunks = chunk_document(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].context_text.starts_with("[entity: Pedido] > "));
        assert!(chunks[0]
            .context_text
            .contains("El pedido agrupa artículos comprados."));
    }
}
