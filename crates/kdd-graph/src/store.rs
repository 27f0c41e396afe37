use kdd_domain::{GraphEdge, GraphNode, Kind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Why an edge could not be attached to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanReason {
    MissingSource,
    MissingTarget,
    BothMissing,
}

impl OrphanReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrphanReason::MissingSource => "missing_source",
            OrphanReason::MissingTarget => "missing_target",
            OrphanReason::BothMissing => "both_missing",
        }
    }
}

/// An edge whose endpoint(s) are absent from the loaded index.
#[derive(Debug, Clone)]
pub struct OrphanEdge {
    pub edge: GraphEdge,
    pub reason: OrphanReason,
}

/// BFS result: reached node ids with their distance from the root (the
/// root itself at distance 0) and the edges traversed, deduplicated.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    pub nodes: Vec<(String, usize)>,
    pub edges: Vec<GraphEdge>,
}

/// A dependent reached by reverse traversal, with the edge chain from the
/// root to it.
#[derive(Debug, Clone)]
pub struct ReversePath {
    pub node_id: String,
    pub distance: usize,
    pub path: Vec<GraphEdge>,
}

/// In-memory directed labeled multigraph with query indices.
pub struct GraphStore {
    graph: DiGraph<String, GraphEdge>,
    nodes: HashMap<String, GraphNode>,
    index_of: HashMap<String, NodeIndex>,
    by_kind: HashMap<Kind, BTreeSet<String>>,
    lexical: HashMap<String, BTreeSet<String>>,
    orphans: Vec<OrphanEdge>,
}

impl GraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            index_of: HashMap::new(),
            by_kind: HashMap::new(),
            lexical: HashMap::new(),
            orphans: Vec::new(),
        }
    }

    /// Build every index from scratch. Edges with a missing endpoint land
    /// in the orphan list instead of the graph.
    #[must_use]
    pub fn load(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        let mut store = Self::new();
        for node in nodes {
            store.add_node(node);
        }
        for edge in edges {
            store.add_edge(edge);
        }
        log::debug!(
            "graph loaded: {} nodes, {} edges, {} orphans",
            store.node_count(),
            store.edge_count(),
            store.orphans.len()
        );
        store
    }

    pub fn add_node(&mut self, node: GraphNode) {
        let id = node.id.clone();
        let idx = self.graph.add_node(id.clone());
        self.index_of.insert(id.clone(), idx);
        self.by_kind.entry(node.kind).or_default().insert(id.clone());
        for token in node_tokens(&node) {
            self.lexical.entry(token).or_default().insert(id.clone());
        }
        self.nodes.insert(id, node);
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        let from = self.index_of.get(&edge.from_node).copied();
        let to = self.index_of.get(&edge.to_node).copied();
        match (from, to) {
            (Some(from), Some(to)) => {
                self.graph.add_edge(from, to, edge);
            }
            (None, Some(_)) => self.orphans.push(OrphanEdge {
                edge,
                reason: OrphanReason::MissingSource,
            }),
            (Some(_), None) => self.orphans.push(OrphanEdge {
                edge,
                reason: OrphanReason::MissingTarget,
            }),
            (None, None) => self.orphans.push(OrphanEdge {
                edge,
                reason: OrphanReason::BothMissing,
            }),
        }
    }

    /// Remove a node, cascading over its incident edges. Orphan edges whose
    /// remaining endpoint was this node are dropped too.
    pub fn remove_node(&mut self, node_id: &str) -> Option<GraphNode> {
        let idx = self.index_of.remove(node_id)?;
        let node = self.nodes.remove(node_id)?;

        self.graph.remove_node(idx);
        // petgraph swaps the last node into the removed slot; fix its index.
        if let Some(moved_id) = self.graph.node_weight(idx).cloned() {
            self.index_of.insert(moved_id, idx);
        }

        if let Some(ids) = self.by_kind.get_mut(&node.kind) {
            ids.remove(node_id);
        }
        for token in node_tokens(&node) {
            if let Some(ids) = self.lexical.get_mut(&token) {
                ids.remove(node_id);
                if ids.is_empty() {
                    self.lexical.remove(&token);
                }
            }
        }
        self.orphans
            .retain(|o| o.edge.from_node != node_id && o.edge.to_node != node_id);

        Some(node)
    }

    #[must_use]
    pub fn has_node(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    #[must_use]
    pub fn get_node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.get(node_id)
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn nodes_of_kind(&self, kind: Kind) -> Vec<&GraphNode> {
        self.by_kind
            .get(&kind)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges originating from a node, in insertion order, optionally
    /// filtered by type.
    #[must_use]
    pub fn outgoing_edges(&self, node_id: &str, types: Option<&[String]>) -> Vec<&GraphEdge> {
        self.directed_edges(node_id, Direction::Outgoing, types)
    }

    /// Edges pointing at a node (its dependents), in insertion order.
    #[must_use]
    pub fn incoming_edges(&self, node_id: &str, types: Option<&[String]>) -> Vec<&GraphEdge> {
        self.directed_edges(node_id, Direction::Incoming, types)
    }

    fn directed_edges(
        &self,
        node_id: &str,
        direction: Direction,
        types: Option<&[String]>,
    ) -> Vec<&GraphEdge> {
        let Some(&idx) = self.index_of.get(node_id) else {
            return Vec::new();
        };
        let mut edges: Vec<&GraphEdge> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| e.weight())
            .filter(|e| types.is_none_or(|ts| ts.iter().any(|t| *t == e.edge_type)))
            .collect();
        // petgraph iterates most-recent-first; restore insertion order.
        edges.reverse();
        edges
    }

    #[must_use]
    pub fn all_edges(&self) -> Vec<&GraphEdge> {
        self.graph.edge_weights().collect()
    }

    #[must_use]
    pub fn violations(&self) -> Vec<&GraphEdge> {
        self.graph
            .edge_weights()
            .filter(|e| e.layer_violation)
            .collect()
    }

    #[must_use]
    pub fn orphan_edges(&self) -> &[OrphanEdge] {
        &self.orphans
    }

    /// Node ids matching one lowercased token, straight from the inverted
    /// index.
    #[must_use]
    pub fn lexical_hits(&self, token: &str) -> Option<&BTreeSet<String>> {
        self.lexical.get(token)
    }

    /// Case-insensitive lexical search over ids, aliases, and indexed
    /// fields. A single token matches by union; multiple tokens must all
    /// match. Results are id-sorted for determinism.
    #[must_use]
    pub fn text_search(&self, query: &str) -> Vec<&GraphNode> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut hits: Option<BTreeSet<String>> = None;
        for token in &tokens {
            let ids = self.lexical.get(token).cloned().unwrap_or_default();
            hits = Some(match hits {
                None => ids,
                Some(prev) => prev.intersection(&ids).cloned().collect(),
            });
            if hits.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }

        hits.unwrap_or_default()
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// BFS from `root` up to `depth` hops, following outgoing and incoming
    /// edges. Violation edges are skipped when `respect_layers` is set.
    /// `depth == 0` returns only the root.
    #[must_use]
    pub fn traverse(
        &self,
        root: &str,
        depth: usize,
        edge_types: Option<&[String]>,
        respect_layers: bool,
    ) -> Traversal {
        let mut result = Traversal::default();
        if !self.has_node(root) {
            return result;
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_edges: HashSet<(String, String, String)> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();

        visited.insert(root.to_string());
        result.nodes.push((root.to_string(), 0));
        queue.push_back((root.to_string(), 0));

        while let Some((current, dist)) = queue.pop_front() {
            if dist >= depth {
                continue;
            }

            let outgoing = self.outgoing_edges(&current, edge_types);
            let incoming = self.incoming_edges(&current, edge_types);
            for (edge, neighbor) in outgoing
                .into_iter()
                .map(|e| (e, e.to_node.clone()))
                .chain(incoming.into_iter().map(|e| (e, e.from_node.clone())))
            {
                if respect_layers && edge.layer_violation {
                    continue;
                }
                if seen_edges.insert(edge.key()) {
                    result.edges.push(edge.clone());
                }
                if visited.insert(neighbor.clone()) {
                    result.nodes.push((neighbor.clone(), dist + 1));
                    queue.push_back((neighbor, dist + 1));
                }
            }
        }

        result
    }

    /// BFS following incoming edges only, recording the edge chain from the
    /// root to each dependent. Used by impact analysis.
    #[must_use]
    pub fn reverse_traverse(&self, root: &str, depth: usize) -> Vec<ReversePath> {
        let mut results = Vec::new();
        if !self.has_node(root) {
            return results;
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root.to_string());
        let mut queue: VecDeque<(String, usize, Vec<GraphEdge>)> = VecDeque::new();
        queue.push_back((root.to_string(), 0, Vec::new()));

        while let Some((current, dist, path)) = queue.pop_front() {
            if dist >= depth {
                continue;
            }
            for edge in self.incoming_edges(&current, None) {
                let dependent = edge.from_node.clone();
                if !visited.insert(dependent.clone()) {
                    continue;
                }
                let mut new_path = path.clone();
                new_path.push(edge.clone());
                results.push(ReversePath {
                    node_id: dependent.clone(),
                    distance: dist + 1,
                    path: new_path.clone(),
                });
                queue.push_back((dependent, dist + 1, new_path));
            }
        }

        results
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Searchable tokens for a node: its id, aliases, and every string value
/// in `indexed_fields`, lowercased and split on non-alphanumerics.
fn node_tokens(node: &GraphNode) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    let mut feed = |text: &str| {
        for token in tokenize(text) {
            tokens.insert(token);
        }
    };
    feed(&node.id);
    for alias in &node.aliases {
        feed(alias);
    }
    for value in node.indexed_fields.values() {
        feed_value(value, &mut tokens);
    }
    tokens
}

fn feed_value(value: &serde_json::Value, tokens: &mut BTreeSet<String>) {
    match value {
        serde_json::Value::String(s) => {
            for token in tokenize(s) {
                tokens.insert(token);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                feed_value(item, tokens);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                feed_value(item, tokens);
            }
        }
        _ => {}
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kdd_domain::{ExtractionMethod, Layer};
    use std::collections::BTreeMap;

    fn node(id: &str, kind: Kind) -> GraphNode {
        let mut fields = BTreeMap::new();
        fields.insert(
            "description".to_string(),
            serde_json::Value::String(format!("nodo de prueba {id}")),
        );
        GraphNode {
            id: id.into(),
            kind,
            source_file: "specs/test.md".into(),
            source_hash: "h".into(),
            layer: Layer::Domain,
            status: "draft".into(),
            aliases: vec![],
            domain: None,
            indexed_fields: fields,
            indexed_at: Utc::now(),
        }
    }

    fn edge(from: &str, to: &str, edge_type: &str) -> GraphEdge {
        GraphEdge {
            from_node: from.into(),
            to_node: to.into(),
            edge_type: edge_type.into(),
            source_file: "specs/test.md".into(),
            extraction_method: ExtractionMethod::WikiLink,
            metadata: BTreeMap::new(),
            layer_violation: false,
            bidirectional: false,
        }
    }

    fn sample_store() -> GraphStore {
        GraphStore::load(
            vec![
                node("Entity:Pedido", Kind::Entity),
                node("Entity:Usuario", Kind::Entity),
                node("BR:BR-001", Kind::BusinessRule),
                node("CMD:CMD-001", Kind::Command),
            ],
            vec![
                edge("Entity:Pedido", "Entity:Usuario", "WIKI_LINK"),
                edge("BR:BR-001", "Entity:Pedido", "ENTITY_RULE"),
                edge("CMD:CMD-001", "Entity:Pedido", "WIKI_LINK"),
                edge("Entity:Pedido", "Event:MISSING", "EMITS"),
            ],
        )
    }

    #[test]
    fn load_separates_orphans() {
        let store = sample_store();
        assert_eq!(store.node_count(), 4);
        assert_eq!(store.edge_count(), 3);
        assert_eq!(store.orphan_edges().len(), 1);
        assert_eq!(
            store.orphan_edges()[0].reason,
            OrphanReason::MissingTarget
        );
    }

    #[test]
    fn every_edge_is_loaded_or_orphan_never_both() {
        let store = sample_store();
        let loaded: Vec<_> = store.all_edges().iter().map(|e| e.key()).collect();
        for orphan in store.orphan_edges() {
            assert!(!loaded.contains(&orphan.edge.key()));
        }
        assert_eq!(loaded.len() + store.orphan_edges().len(), 4);
    }

    #[test]
    fn traverse_depth_zero_returns_root_only() {
        let store = sample_store();
        let t = store.traverse("Entity:Pedido", 0, None, true);
        assert_eq!(t.nodes, vec![("Entity:Pedido".to_string(), 0)]);
        assert!(t.edges.is_empty());
    }

    #[test]
    fn traverse_follows_both_directions() {
        let store = sample_store();
        let t = store.traverse("Entity:Pedido", 1, None, true);
        let ids: Vec<&str> = t.nodes.iter().map(|(id, _)| id.as_str()).collect();
        assert!(ids.contains(&"Entity:Usuario"));
        assert!(ids.contains(&"BR:BR-001"));
        assert!(ids.contains(&"CMD:CMD-001"));
        assert_eq!(t.edges.len(), 3);
    }

    #[test]
    fn traverse_respects_layer_violations() {
        let mut store = sample_store();
        let mut bad = edge("Entity:Pedido", "CMD:CMD-001", "WIKI_LINK");
        bad.layer_violation = true;
        store.add_edge(bad);

        let with = store.traverse("Entity:Pedido", 1, None, false);
        let without = store.traverse("Entity:Pedido", 1, None, true);
        assert_eq!(with.edges.len(), without.edges.len() + 1);
    }

    #[test]
    fn traverse_filters_edge_types() {
        let store = sample_store();
        let t = store.traverse(
            "Entity:Pedido",
            2,
            Some(&["ENTITY_RULE".to_string()]),
            true,
        );
        let ids: Vec<&str> = t.nodes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["Entity:Pedido", "BR:BR-001"]);
    }

    #[test]
    fn reverse_traverse_records_paths() {
        let store = GraphStore::load(
            vec![
                node("Entity:Pedido", Kind::Entity),
                node("CMD:CMD-001", Kind::Command),
                node("UC:UC-001", Kind::UseCase),
            ],
            vec![
                edge("CMD:CMD-001", "Entity:Pedido", "WIKI_LINK"),
                edge("UC:UC-001", "CMD:CMD-001", "UC_EXECUTES_CMD"),
            ],
        );
        let paths = store.reverse_traverse("Entity:Pedido", 3);
        assert_eq!(paths.len(), 2);

        let uc = paths.iter().find(|p| p.node_id == "UC:UC-001").unwrap();
        assert_eq!(uc.distance, 2);
        assert_eq!(uc.path.len(), 2);
        assert_eq!(uc.path[0].from_node, "CMD:CMD-001");
        assert_eq!(uc.path[1].from_node, "UC:UC-001");
    }

    #[test]
    fn remove_node_cascades() {
        let mut store = sample_store();
        store.remove_node("Entity:Pedido");
        assert!(!store.has_node("Entity:Pedido"));
        assert_eq!(store.edge_count(), 0);
        // The orphan EMITS edge originated from the removed node.
        assert!(store.orphan_edges().is_empty());
        // Remaining nodes still resolve after petgraph's index swap.
        assert!(store.has_node("Entity:Usuario"));
        assert!(store.outgoing_edges("Entity:Pedido", None).is_empty());
    }

    #[test]
    fn text_search_single_token_union() {
        let store = sample_store();
        let hits = store.text_search("pedido");
        let ids: Vec<&str> = hits.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"Entity:Pedido"));
    }

    #[test]
    fn text_search_multi_token_intersection() {
        let mut store = GraphStore::new();
        let mut a = node("Entity:Pedido", Kind::Entity);
        a.indexed_fields.insert(
            "description".into(),
            serde_json::Value::String("compra de artículos".into()),
        );
        let mut b = node("Entity:Carrito", Kind::Entity);
        b.indexed_fields.insert(
            "description".into(),
            serde_json::Value::String("compra pendiente".into()),
        );
        store.add_node(a);
        store.add_node(b);

        let hits = store.text_search("compra artículos");
        let ids: Vec<&str> = hits.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Entity:Pedido"]);
    }

    #[test]
    fn text_search_results_are_id_sorted() {
        let store = sample_store();
        let hits = store.text_search("prueba");
        let ids: Vec<&str> = hits.iter().map(|n| n.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn by_kind_index() {
        let store = sample_store();
        assert_eq!(store.nodes_of_kind(Kind::Entity).len(), 2);
        assert_eq!(store.nodes_of_kind(Kind::Command).len(), 1);
        assert!(store.nodes_of_kind(Kind::Adr).is_empty());
    }
}
