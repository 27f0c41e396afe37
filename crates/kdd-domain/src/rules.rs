//! Pure business rules: kind routing, layer validation, embeddable
//! sections, index-level detection, merge conflict resolution.
//!
//! Every function here is deterministic and free of I/O.

use crate::enums::{IndexLevel, Kind, Layer};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of routing a document to its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Recognized kind; the warning is set when the file sits outside the
    /// expected folder for that kind (the kind still wins).
    Routed {
        kind: Kind,
        warning: Option<String>,
    },
    /// Front-matter missing or empty — the file is silently skipped.
    NoFrontMatter,
    /// Front-matter present but `kind` is absent or not one of the 15.
    UnknownKind { value: String },
}

/// Determine the kind from front-matter and validate the file location.
///
/// The `kind` field always wins over the path; a mismatched location only
/// produces a warning.
#[must_use]
pub fn route_document(
    front_matter: &BTreeMap<String, Value>,
    source_path: &str,
) -> RouteOutcome {
    if front_matter.is_empty() {
        return RouteOutcome::NoFrontMatter;
    }

    let raw = front_matter
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let Ok(kind) = raw.parse::<Kind>() else {
        return RouteOutcome::UnknownKind { value: raw };
    };

    let expected = expected_path(kind);
    let warning = if !expected.is_empty() && !source_path.contains(expected) {
        Some(format!(
            "{kind} '{source_path}' found outside expected path '{expected}'"
        ))
    } else {
        None
    };

    RouteOutcome::Routed { kind, warning }
}

/// Expected folder prefix per kind, for location warnings.
#[must_use]
pub fn expected_path(kind: Kind) -> &'static str {
    match kind {
        Kind::Entity => "01-domain/entities/",
        Kind::Event => "01-domain/events/",
        Kind::BusinessRule => "01-domain/rules/",
        Kind::BusinessPolicy | Kind::CrossPolicy => "02-behavior/policies/",
        Kind::Command => "02-behavior/commands/",
        Kind::Query => "02-behavior/queries/",
        Kind::Process => "02-behavior/processes/",
        Kind::UseCase => "02-behavior/use-cases/",
        Kind::UiView | Kind::UiComponent => "03-experience/views/",
        Kind::Requirement => "04-verification/criteria/",
        Kind::Objective => "00-requirements/objectives/",
        Kind::Prd => "00-requirements/",
        Kind::Adr => "00-requirements/decisions/",
    }
}

/// Infer the layer from a file path's leading numeric segment under `specs/`.
#[must_use]
pub fn layer_of_path(source_path: &str) -> Option<Layer> {
    Layer::ALL
        .iter()
        .copied()
        .find(|layer| source_path.contains(layer.as_str()))
}

/// True when an edge `from → to` violates the layer dependency order.
///
/// Layers `01..04` form a strict order: pointing at a strictly higher
/// number is a violation. `00-requirements` is exempt in both directions.
#[must_use]
pub fn is_layer_violation(from: Layer, to: Layer) -> bool {
    if from == Layer::Requirements || to == Layer::Requirements {
        return false;
    }
    from.numeric() < to.numeric()
}

/// Embeddable section headings per kind, lowercased (Spanish canonical,
/// English fallback). An empty slice means the kind never embeds.
#[must_use]
pub fn embeddable_sections(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Entity => &["descripción", "description"],
        Kind::Event => &[],
        Kind::BusinessRule => &[
            "declaración",
            "declaration",
            "cuándo aplica",
            "when applies",
        ],
        Kind::BusinessPolicy => &["declaración", "declaration"],
        Kind::CrossPolicy => &["propósito", "purpose", "declaración", "declaration"],
        Kind::Command | Kind::Query => &["purpose", "propósito"],
        Kind::Process => &["participantes", "participants", "pasos", "steps"],
        Kind::UseCase => &[
            "descripción",
            "description",
            "flujo principal",
            "main flow",
        ],
        Kind::UiView => &[
            "descripción",
            "description",
            "comportamiento",
            "behavior",
        ],
        Kind::UiComponent | Kind::Requirement => &["descripción", "description"],
        Kind::Objective => &["objetivo", "objective"],
        Kind::Prd => &["problema / oportunidad", "problem / opportunity"],
        Kind::Adr => &["contexto", "context", "decisión", "decision"],
    }
}

/// Determine the highest indexing level the runtime supports.
#[must_use]
pub fn detect_index_level(embedder_available: bool, agent_available: bool) -> IndexLevel {
    if embedder_available && agent_available {
        IndexLevel::L3
    } else if embedder_available {
        IndexLevel::L2
    } else {
        IndexLevel::L1
    }
}

/// Which of two node candidates wins a merge conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictWinner {
    First,
    Second,
}

/// Last-write-wins by `indexed_at`; ties broken by the lexicographically
/// greater `source_hash` so the outcome is deterministic on every machine.
#[must_use]
pub fn resolve_node_conflict(
    a: (&DateTime<Utc>, &str),
    b: (&DateTime<Utc>, &str),
) -> ConflictWinner {
    match a.0.cmp(b.0) {
        std::cmp::Ordering::Less => ConflictWinner::Second,
        std::cmp::Ordering::Greater => ConflictWinner::First,
        std::cmp::Ordering::Equal => {
            if b.1 > a.1 {
                ConflictWinner::Second
            } else {
                ConflictWinner::First
            }
        }
    }
}

/// True for SCREAMING_SNAKE_CASE structural edge names; lower snake_case
/// names are free-form business relations.
#[must_use]
pub fn is_structural_edge(edge_type: &str) -> bool {
    !edge_type.is_empty()
        && edge_type
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
}

/// Normalize an authored relation name into a business edge type.
#[must_use]
pub fn edge_type_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Ranking priority per kind for tie-breaks in fused results. Lower sorts
/// first.
#[must_use]
pub fn kind_priority(kind: Kind) -> u8 {
    match kind {
        Kind::BusinessRule | Kind::BusinessPolicy | Kind::CrossPolicy => 0,
        Kind::Entity => 1,
        Kind::Command | Kind::UseCase | Kind::Requirement => 2,
        Kind::Event | Kind::Query | Kind::Process => 3,
        Kind::UiView | Kind::UiComponent => 4,
        Kind::Objective | Kind::Prd | Kind::Adr => 5,
    }
}
