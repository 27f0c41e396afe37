use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The 15 artifact kinds recognized by the engine.
///
/// Each value corresponds to the `kind` field in a spec's front-matter and
/// maps to a dedicated extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "entity")]
    Entity,
    #[serde(rename = "event")]
    Event,
    #[serde(rename = "business-rule")]
    BusinessRule,
    #[serde(rename = "business-policy")]
    BusinessPolicy,
    #[serde(rename = "cross-policy")]
    CrossPolicy,
    #[serde(rename = "command")]
    Command,
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "process")]
    Process,
    #[serde(rename = "use-case")]
    UseCase,
    #[serde(rename = "ui-view")]
    UiView,
    #[serde(rename = "ui-component")]
    UiComponent,
    #[serde(rename = "requirement")]
    Requirement,
    #[serde(rename = "objective")]
    Objective,
    #[serde(rename = "prd")]
    Prd,
    #[serde(rename = "adr")]
    Adr,
}

impl Kind {
    pub const ALL: [Kind; 15] = [
        Kind::Entity,
        Kind::Event,
        Kind::BusinessRule,
        Kind::BusinessPolicy,
        Kind::CrossPolicy,
        Kind::Command,
        Kind::Query,
        Kind::Process,
        Kind::UseCase,
        Kind::UiView,
        Kind::UiComponent,
        Kind::Requirement,
        Kind::Objective,
        Kind::Prd,
        Kind::Adr,
    ];

    /// Front-matter string for this kind (also the artifact directory name).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Entity => "entity",
            Kind::Event => "event",
            Kind::BusinessRule => "business-rule",
            Kind::BusinessPolicy => "business-policy",
            Kind::CrossPolicy => "cross-policy",
            Kind::Command => "command",
            Kind::Query => "query",
            Kind::Process => "process",
            Kind::UseCase => "use-case",
            Kind::UiView => "ui-view",
            Kind::UiComponent => "ui-component",
            Kind::Requirement => "requirement",
            Kind::Objective => "objective",
            Kind::Prd => "prd",
            Kind::Adr => "adr",
        }
    }

    /// Node-id prefix, e.g. `Entity` in `Entity:Pedido`.
    #[must_use]
    pub fn node_prefix(self) -> &'static str {
        match self {
            Kind::Entity => "Entity",
            Kind::Event => "Event",
            Kind::BusinessRule => "BR",
            Kind::BusinessPolicy => "BP",
            Kind::CrossPolicy => "XP",
            Kind::Command => "CMD",
            Kind::Query => "QRY",
            Kind::Process => "PROC",
            Kind::UseCase => "UC",
            Kind::UiView => "UIView",
            Kind::UiComponent => "UIComp",
            Kind::Requirement => "REQ",
            Kind::Objective => "OBJ",
            Kind::Prd => "PRD",
            Kind::Adr => "ADR",
        }
    }

    /// Build the composite `{Prefix}:{DocumentId}` node id.
    #[must_use]
    pub fn node_id(self, document_id: &str) -> String {
        format!("{}:{document_id}", self.node_prefix())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Kind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

/// KDD layers ordered from requirements to verification.
///
/// The numeric prefix determines the allowed dependency direction: higher
/// layers may reference lower layers, not the reverse. `00-requirements` is
/// exempt in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    #[serde(rename = "00-requirements")]
    Requirements,
    #[serde(rename = "01-domain")]
    Domain,
    #[serde(rename = "02-behavior")]
    Behavior,
    #[serde(rename = "03-experience")]
    Experience,
    #[serde(rename = "04-verification")]
    Verification,
}

impl Layer {
    pub const ALL: [Layer; 5] = [
        Layer::Requirements,
        Layer::Domain,
        Layer::Behavior,
        Layer::Experience,
        Layer::Verification,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Requirements => "00-requirements",
            Layer::Domain => "01-domain",
            Layer::Behavior => "02-behavior",
            Layer::Experience => "03-experience",
            Layer::Verification => "04-verification",
        }
    }

    /// Numeric prefix (0-4) used for layer comparison.
    #[must_use]
    pub fn numeric(self) -> u8 {
        match self {
            Layer::Requirements => 0,
            Layer::Domain => 1,
            Layer::Behavior => 2,
            Layer::Experience => 3,
            Layer::Verification => 4,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Layer::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s)
            .ok_or(())
    }
}

/// Structural (SCREAMING_SNAKE_CASE) edge types produced by the extractors.
///
/// Business-domain edges (snake_case) are free-form strings authored in the
/// specs and are not enumerated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    WikiLink,
    DomainRelation,
    EntityRule,
    EntityPolicy,
    Emits,
    Consumes,
    UcAppliesRule,
    UcExecutesCmd,
    UcStory,
    ViewTriggersUc,
    ViewUsesComponent,
    ComponentUsesEntity,
    ReqTracesTo,
    Validates,
    DecidesFor,
    CrossDomainRef,
    LayerDependency,
}

impl EdgeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::WikiLink => "WIKI_LINK",
            EdgeType::DomainRelation => "DOMAIN_RELATION",
            EdgeType::EntityRule => "ENTITY_RULE",
            EdgeType::EntityPolicy => "ENTITY_POLICY",
            EdgeType::Emits => "EMITS",
            EdgeType::Consumes => "CONSUMES",
            EdgeType::UcAppliesRule => "UC_APPLIES_RULE",
            EdgeType::UcExecutesCmd => "UC_EXECUTES_CMD",
            EdgeType::UcStory => "UC_STORY",
            EdgeType::ViewTriggersUc => "VIEW_TRIGGERS_UC",
            EdgeType::ViewUsesComponent => "VIEW_USES_COMPONENT",
            EdgeType::ComponentUsesEntity => "COMPONENT_USES_ENTITY",
            EdgeType::ReqTracesTo => "REQ_TRACES_TO",
            EdgeType::Validates => "VALIDATES",
            EdgeType::DecidesFor => "DECIDES_FOR",
            EdgeType::CrossDomainRef => "CROSS_DOMAIN_REF",
            EdgeType::LayerDependency => "LAYER_DEPENDENCY",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an edge was discovered in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    WikiLink,
    SectionContent,
    Implicit,
    Frontmatter,
}

/// Progressive indexing levels.
///
/// L1 is always available. L2 requires a working embedding model. L3 adds
/// an agent client for enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexLevel {
    L1,
    L2,
    L3,
}

impl fmt::Display for IndexLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexLevel::L1 => f.write_str("L1"),
            IndexLevel::L2 => f.write_str("L2"),
            IndexLevel::L3 => f.write_str("L3"),
        }
    }
}

/// Index structure declared in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Structure {
    #[serde(rename = "single-domain")]
    SingleDomain,
    #[serde(rename = "multi-domain")]
    MultiDomain,
}

/// Conflict handling for the merge engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    LastWriteWins,
    FailOnConflict,
}
