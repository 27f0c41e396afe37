//! Context amplification: resolve hints, discover the neighborhood, and
//! pack the most constraining content into a token budget.

use crate::common::Deadline;
use crate::error::{QueryError, Result};
use crate::snapshot::Snapshot;
use kdd_domain::{GraphNode, Kind};
use kdd_parser::estimate_tokens;
use serde::Serialize;
use std::collections::HashMap;

const CONTENT_MAX_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct ContextInput {
    pub hints: Vec<String>,
    pub depth: usize,
    pub max_tokens: usize,
}

impl ContextInput {
    #[must_use]
    pub fn new(hints: Vec<String>) -> Self {
        Self {
            hints,
            depth: 1,
            max_tokens: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedHint {
    pub node_id: String,
    pub matched_from: String,
    pub match_method: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextItem {
    pub node_id: String,
    pub kind: Kind,
    pub content: String,
    pub source_file: String,
    /// The resolved hint node this item was discovered from.
    pub reached_via: String,
    pub distance: usize,
}

#[derive(Debug, Serialize)]
pub struct ContextResult {
    pub resolved: Vec<ResolvedHint>,
    /// Rules, policies, and entity invariants.
    pub constraints: Vec<ContextItem>,
    /// Commands, use cases, requirements, and the rest.
    pub behavior: Vec<ContextItem>,
    pub total_tokens: usize,
    pub warnings: Vec<String>,
    pub partial: bool,
}

/// Resolution → discovery → extraction → prioritized accumulation.
pub fn run(snapshot: &Snapshot, input: &ContextInput, deadline: &Deadline) -> Result<ContextResult> {
    if input.hints.is_empty() {
        return Err(QueryError::EmptyHints);
    }
    if input.depth == 0 || input.depth > 5 {
        return Err(QueryError::InvalidDepth(input.depth));
    }

    let mut warnings = Vec::new();
    let mut resolved: Vec<ResolvedHint> = Vec::new();
    for hint in &input.hints {
        match resolve_hint(snapshot, hint) {
            Some(r) => {
                if !resolved.iter().any(|prev| prev.node_id == r.node_id) {
                    resolved.push(r);
                }
            }
            None => warnings.push(format!("hint '{hint}' did not resolve to any node")),
        }
    }
    deadline.check_hard()?;

    // Discovery: closest path wins when several hints reach the same node.
    let mut discovered: HashMap<String, (usize, String)> = HashMap::new();
    for hint in &resolved {
        discovered
            .entry(hint.node_id.clone())
            .or_insert((0, hint.node_id.clone()));
        let traversal = snapshot.graph.traverse(&hint.node_id, input.depth, None, true);
        for (node_id, distance) in traversal.nodes {
            if distance == 0 {
                continue;
            }
            match discovered.get(&node_id) {
                Some((existing, _)) if *existing <= distance => {}
                _ => {
                    discovered.insert(node_id, (distance, hint.node_id.clone()));
                }
            }
        }
    }
    deadline.check_hard()?;

    // Extraction + prioritization.
    let mut items: Vec<(u8, ContextItem)> = discovered
        .into_iter()
        .filter_map(|(node_id, (distance, via))| {
            let node = snapshot.graph.get_node(&node_id)?;
            Some((
                priority_of(node),
                ContextItem {
                    node_id,
                    kind: node.kind,
                    content: extract_content(node),
                    source_file: node.source_file.clone(),
                    reached_via: via,
                    distance,
                },
            ))
        })
        .collect();
    items.sort_by(|(pa, a), (pb, b)| {
        pa.cmp(pb)
            .then_with(|| a.distance.cmp(&b.distance))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });

    // Accumulate under the token budget.
    let mut constraints = Vec::new();
    let mut behavior = Vec::new();
    let mut total_tokens = 0;
    let mut partial = false;
    for (priority, item) in items {
        if deadline.soft_exceeded() {
            partial = true;
            break;
        }
        let cost = estimate_tokens(&item.node_id)
            + estimate_tokens(item.kind.as_str())
            + estimate_tokens(&item.content)
            + estimate_tokens(&item.source_file)
            + estimate_tokens(&item.reached_via);
        if total_tokens + cost > input.max_tokens {
            if constraints.is_empty() && behavior.is_empty() {
                // Always return at least the top item, truncated.
                let mut item = item;
                item.content = truncate_content(&item.content, input.max_tokens);
                total_tokens += estimate_tokens(&item.content);
                push_item(&mut constraints, &mut behavior, priority, item);
            }
            warnings.push("TOKEN_LIMIT_EXCEEDED: context truncated".to_string());
            break;
        }
        total_tokens += cost;
        push_item(&mut constraints, &mut behavior, priority, item);
    }

    Ok(ContextResult {
        resolved,
        constraints,
        behavior,
        total_tokens,
        warnings,
        partial,
    })
}

fn push_item(
    constraints: &mut Vec<ContextItem>,
    behavior: &mut Vec<ContextItem>,
    priority: u8,
    item: ContextItem,
) {
    if priority <= 1 {
        constraints.push(item);
    } else {
        behavior.push(item);
    }
}

/// Resolve one hint to a node: exact id, file basename, or keyword.
fn resolve_hint(snapshot: &Snapshot, hint: &str) -> Option<ResolvedHint> {
    let hint = hint.trim();
    if hint.is_empty() {
        return None;
    }

    // (a) Exact node id.
    if hint.contains(':') {
        return snapshot.graph.has_node(hint).then(|| ResolvedHint {
            node_id: hint.to_string(),
            matched_from: hint.to_string(),
            match_method: "exact".to_string(),
        });
    }

    // (b) File path: try the basename against every kind prefix.
    if hint.contains('/') || hint.contains('.') {
        let basename = basename_of(hint);
        for candidate in name_variants(&basename) {
            for kind in Kind::ALL {
                let node_id = kind.node_id(&candidate);
                if snapshot.graph.has_node(&node_id) {
                    return Some(ResolvedHint {
                        node_id,
                        matched_from: hint.to_string(),
                        match_method: "basename".to_string(),
                    });
                }
            }
        }
        return None;
    }

    // (c) Keyword: prefix variants first, then the lexical index.
    for candidate in name_variants(hint) {
        for kind in Kind::ALL {
            let node_id = kind.node_id(&candidate);
            if snapshot.graph.has_node(&node_id) {
                return Some(ResolvedHint {
                    node_id,
                    matched_from: hint.to_string(),
                    match_method: "exact".to_string(),
                });
            }
        }
    }
    let hits = snapshot.graph.text_search(hint);
    hits.first().map(|node| ResolvedHint {
        node_id: node.id.clone(),
        matched_from: hint.to_string(),
        match_method: "text_search".to_string(),
    })
}

fn basename_of(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split_once('.').map_or(name, |(stem, _)| stem).to_string()
}

/// The name as written plus its capitalized form.
fn name_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        let capitalized: String = first.to_uppercase().chain(chars).collect();
        if capitalized != name {
            variants.push(capitalized);
        }
    }
    variants
}

/// Tier 0: rules and policies. Tier 1: entities. Tier 2: behavior kinds.
/// Tier 3: everything else.
fn priority_of(node: &GraphNode) -> u8 {
    match node.kind {
        Kind::BusinessRule | Kind::BusinessPolicy | Kind::CrossPolicy => 0,
        Kind::Entity => 1,
        Kind::Command | Kind::UseCase | Kind::Requirement => 2,
        _ => 3,
    }
}

/// Pick the most constraining field for a kind, truncated to 300 chars.
fn extract_content(node: &GraphNode) -> String {
    let field = |names: &[&str]| -> Option<String> {
        names.iter().find_map(|name| {
            node.indexed_fields
                .get(*name)
                .and_then(field_as_text)
                .filter(|t| !t.is_empty())
        })
    };

    let content = match node.kind {
        Kind::BusinessRule | Kind::BusinessPolicy | Kind::CrossPolicy => {
            field(&["declaration"])
        }
        Kind::Entity => field(&["invariants", "description"]),
        Kind::Command => field(&["preconditions", "postconditions", "purpose"]),
        Kind::UseCase => field(&["description", "preconditions"]),
        Kind::Requirement => field(&["description"]),
        _ => field(&["description", "purpose"]),
    };

    let content = content.unwrap_or_else(|| node.id.clone());
    truncate_content(&content, CONTENT_MAX_CHARS)
}

fn field_as_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::{snapshot_with, test_node};
    use kdd_domain::Layer;

    fn context_snapshot() -> Snapshot {
        snapshot_with(
            &[
                ("Entity:Pedido", Kind::Entity, Layer::Domain),
                ("BR:BR-001", Kind::BusinessRule, Layer::Domain),
                ("UC:UC-001", Kind::UseCase, Layer::Behavior),
                ("CMD:CMD-001", Kind::Command, Layer::Behavior),
            ],
            &[
                ("BR:BR-001", "Entity:Pedido", "ENTITY_RULE", false),
                ("UC:UC-001", "Entity:Pedido", "WIKI_LINK", false),
                ("UC:UC-001", "CMD:CMD-001", "UC_EXECUTES_CMD", false),
            ],
        )
    }

    #[test]
    fn empty_hints_fail() {
        let err = run(
            &context_snapshot(),
            &ContextInput::new(vec![]),
            &Deadline::start(),
        )
        .unwrap_err();
        assert_eq!(err, QueryError::EmptyHints);
    }

    #[test]
    fn exact_id_hint_resolves() {
        let result = run(
            &context_snapshot(),
            &ContextInput::new(vec!["Entity:Pedido".into()]),
            &Deadline::start(),
        )
        .unwrap();
        assert_eq!(result.resolved.len(), 1);
        assert_eq!(result.resolved[0].match_method, "exact");
    }

    #[test]
    fn basename_hint_resolves_source_file() {
        let result = run(
            &context_snapshot(),
            &ContextInput::new(vec!["src/models/pedido.ts".into()]),
            &Deadline::start(),
        )
        .unwrap();
        assert_eq!(result.resolved.len(), 1);
        assert_eq!(result.resolved[0].node_id, "Entity:Pedido");
        assert_eq!(result.resolved[0].match_method, "basename");
        assert_eq!(result.resolved[0].matched_from, "src/models/pedido.ts");
    }

    #[test]
    fn keyword_falls_back_to_text_search() {
        let result = run(
            &context_snapshot(),
            &ContextInput::new(vec!["descripción".into()]),
            &Deadline::start(),
        )
        .unwrap();
        assert_eq!(result.resolved.len(), 1);
        assert_eq!(result.resolved[0].match_method, "text_search");
    }

    #[test]
    fn unresolved_hint_warns_but_does_not_fail() {
        let result = run(
            &context_snapshot(),
            &ContextInput::new(vec!["nadaexiste123".into()]),
            &Deadline::start(),
        )
        .unwrap();
        assert!(result.resolved.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.constraints.is_empty());
        assert!(result.behavior.is_empty());
    }

    #[test]
    fn constraints_come_before_behavior() {
        let result = run(
            &context_snapshot(),
            &ContextInput::new(vec!["Entity:Pedido".into()]),
            &Deadline::start(),
        )
        .unwrap();

        // BR (tier 0) and the entity itself (tier 1) are constraints; the
        // use case (tier 2) is behavior.
        assert!(result
            .constraints
            .iter()
            .any(|i| i.node_id == "BR:BR-001"));
        assert!(result
            .constraints
            .iter()
            .any(|i| i.node_id == "Entity:Pedido"));
        assert!(result.behavior.iter().any(|i| i.node_id == "UC:UC-001"));
        assert!(result.total_tokens <= 4000);
    }

    #[test]
    fn depth_two_reaches_commands() {
        let mut input = ContextInput::new(vec!["Entity:Pedido".into()]);
        input.depth = 2;
        let result = run(&context_snapshot(), &input, &Deadline::start()).unwrap();
        assert!(result.behavior.iter().any(|i| i.node_id == "CMD:CMD-001"));
    }

    #[test]
    fn content_truncates_at_300_chars() {
        let mut node = test_node("Entity:Largo", Kind::Entity, Layer::Domain);
        node.indexed_fields.insert(
            "description".into(),
            serde_json::Value::String("x".repeat(400)),
        );
        let content = extract_content(&node);
        assert!(content.chars().count() <= 300);
        assert!(content.ends_with('…'));
    }

    #[test]
    fn token_budget_truncates_items() {
        let mut input = ContextInput::new(vec!["Entity:Pedido".into()]);
        input.max_tokens = 20;
        let result = run(&context_snapshot(), &input, &Deadline::start()).unwrap();
        assert!(result.total_tokens <= 20 || !result.warnings.is_empty());
    }
}
