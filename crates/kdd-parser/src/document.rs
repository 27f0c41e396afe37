//! Whole-file parsing into a [`Document`].

use crate::frontmatter::extract_front_matter;
use crate::hashing::content_hash;
use crate::markdown::parse_sections;
use crate::wiki_links::extract_wiki_links;
use kdd_domain::{layer_of_path, route_document, Document, Layer, RouteOutcome, WikiLinkRef};

/// Result of parsing one file.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed {
        document: Document,
        /// Location warning from routing, when the file sits outside the
        /// expected folder for its kind.
        warning: Option<String>,
    },
    /// File has no front-matter; skipped silently.
    NoFrontMatter,
    /// Front-matter present but the `kind` value is not recognized.
    UnknownKind { value: String, source_hash: String },
}

/// Parse raw file bytes into a [`Document`].
///
/// `source_path` is the repo-relative path used for layer and domain
/// detection; the hash covers the raw bytes exactly as read.
#[must_use]
pub fn parse_document(source_path: &str, bytes: &[u8]) -> ParseOutcome {
    let source_hash = content_hash(bytes);
    let content = String::from_utf8_lossy(bytes);

    let (front_matter, body) = extract_front_matter(&content);

    match route_document(&front_matter, source_path) {
        RouteOutcome::NoFrontMatter => ParseOutcome::NoFrontMatter,
        RouteOutcome::UnknownKind { value } => ParseOutcome::UnknownKind {
            value,
            source_hash,
        },
        RouteOutcome::Routed { kind, warning } => {
            let sections = parse_sections(&body);
            let wiki_links = sections
                .iter()
                .flat_map(|section| {
                    extract_wiki_links(&section.content)
                        .into_iter()
                        .map(|link| WikiLinkRef {
                            target: link.target,
                            section_path: section.path.clone(),
                        })
                })
                .collect();

            let id = front_matter
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| file_stem(source_path));

            let document = Document {
                id,
                kind,
                source_path: source_path.to_string(),
                source_hash,
                layer: layer_of_path(source_path).unwrap_or(Layer::Domain),
                front_matter,
                sections,
                wiki_links,
                domain: domain_of_path(source_path),
            };
            ParseOutcome::Parsed { document, warning }
        }
    }
}

fn file_stem(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".md").unwrap_or(name).to_string()
}

/// Domain from a `domains/<name>/` path segment, when present.
fn domain_of_path(path: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').collect();
    parts
        .windows(2)
        .find(|w| w[0] == "domains")
        .map(|w| w[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdd_domain::Kind;

    const ENTITY: &str = "---\nkind: entity\nid: Pedido\nstatus: approved\n---\n\n# Pedido\n\n## Descripción\n\nUn pedido del cliente [[Usuario]].\n\n## Relaciones\n\n| Relación | Cardinalidad | Entidad |\n|---|---|---|\n| pertenece_a | N:1 | [[Usuario]] |\n";

    #[test]
    fn parses_full_document() {
        let outcome = parse_document("specs/01-domain/entities/Pedido.md", ENTITY.as_bytes());
        let ParseOutcome::Parsed { document, warning } = outcome else {
            panic!("expected parsed document");
        };
        assert!(warning.is_none());
        assert_eq!(document.id, "Pedido");
        assert_eq!(document.kind, Kind::Entity);
        assert_eq!(document.layer, Layer::Domain);
        assert_eq!(document.status(), "approved");
        assert_eq!(document.wiki_links.len(), 2);
        assert_eq!(document.wiki_links[0].target, "Usuario");
        assert!(document.wiki_links[0].section_path.ends_with("descripción"));
    }

    #[test]
    fn id_falls_back_to_file_stem() {
        let src = "---\nkind: event\n---\n\n# EVT-Pedido-Creado\n";
        let outcome = parse_document("specs/01-domain/events/EVT-Pedido-Creado.md", src.as_bytes());
        let ParseOutcome::Parsed { document, .. } = outcome else {
            panic!("expected parsed document");
        };
        assert_eq!(document.id, "EVT-Pedido-Creado");
    }

    #[test]
    fn no_front_matter_is_skipped() {
        assert!(matches!(
            parse_document("specs/README.md", b"# Readme\n"),
            ParseOutcome::NoFrontMatter
        ));
    }

    #[test]
    fn unknown_kind_keeps_hash() {
        let src = "---\nkind: widget\n---\nbody";
        let outcome = parse_document("specs/x.md", src.as_bytes());
        let ParseOutcome::UnknownKind { value, source_hash } = outcome else {
            panic!("expected unknown kind");
        };
        assert_eq!(value, "widget");
        assert_eq!(source_hash, content_hash(src.as_bytes()));
    }

    #[test]
    fn domain_from_path_segment() {
        let src = "---\nkind: entity\nid: Factura\n---\nbody";
        let outcome = parse_document(
            "specs/domains/billing/01-domain/entities/Factura.md",
            src.as_bytes(),
        );
        let ParseOutcome::Parsed { document, .. } = outcome else {
            panic!("expected parsed document");
        };
        assert_eq!(document.domain.as_deref(), Some("billing"));
    }
}
