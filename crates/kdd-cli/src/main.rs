//! `kdd-index` — command-line front-end over the engine crates.
//!
//! Exit codes: 0 ok, 1 recoverable (partial failure), 2 fatal, 3 user
//! error.

mod embedder;

use anyhow::Context;
use clap::{Parser, Subcommand};
use embedder::HttpEmbedder;
use kdd_domain::{detect_index_level, EmbeddingModel, EventBus, Kind, Layer};
use kdd_indexer::{
    index_incremental, merge_indexes, GitAdapter, IncrementalOptions, IndexerDeps, MergeOptions,
};
use kdd_query::{
    ContextInput, CoverageInput, GraphQueryInput, HybridInput, ImpactInput, OrphanInput,
    QueryEngine, QueryFilters, SemanticInput, Snapshot, ViolationsInput,
};
use kdd_store::{load_index, ArtifactStore};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_OK: u8 = 0;
const EXIT_PARTIAL: u8 = 1;
const EXIT_FATAL: u8 = 2;
const EXIT_USER: u8 = 3;

#[derive(Parser)]
#[command(name = "kdd-index", version, about = "Knowledge index over KDD spec documents")]
struct Cli {
    /// Artifact root (defaults to .kdd-index under the repo root).
    #[arg(long, global = true)]
    index_path: Option<PathBuf>,

    /// Repository root holding the specs/ tree.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the spec tree (incremental by default).
    Index {
        /// Re-scan everything instead of following the git diff.
        #[arg(long)]
        full: bool,
        /// Re-index files even when their content hash is unchanged.
        #[arg(long)]
        force: bool,
        /// Tag indexed documents with a domain.
        #[arg(long)]
        domain: Option<String>,
    },
    /// Hybrid search over the index.
    Search {
        text: String,
        #[arg(long)]
        kind: Vec<String>,
        #[arg(long)]
        layer: Vec<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0.5)]
        min_score: f32,
        /// Semantic-only search (requires an L2 index).
        #[arg(long)]
        semantic: bool,
        #[arg(long)]
        json: bool,
    },
    /// Traverse the graph around a node.
    Graph {
        node: String,
        #[arg(long, default_value_t = 2)]
        depth: usize,
        /// Comma-separated edge types to follow.
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// What depends on a node, and which scenarios to re-run.
    Impact {
        node: String,
        #[arg(long, default_value_t = 3)]
        depth: usize,
        #[arg(long)]
        json: bool,
    },
    /// Governance coverage for a node.
    Coverage {
        node: String,
        #[arg(long)]
        json: bool,
    },
    /// All layer-dependency violations.
    Violations {
        #[arg(long)]
        json: bool,
    },
    /// Edges pointing at artifacts that are not indexed.
    Orphans {
        #[arg(long)]
        json: bool,
    },
    /// Amplify hints (ids, paths, keywords) into constraints + behavior.
    Context {
        hints: Vec<String>,
        #[arg(long, default_value_t = 1)]
        depth: usize,
        #[arg(long, default_value_t = 4000)]
        max_tokens: usize,
        #[arg(long)]
        json: bool,
    },
    /// Merge several artifact roots into one.
    Merge {
        sources: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "last_write_wins")]
        strategy: String,
    },
    /// Manifest summary of the local index.
    Status,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let index_root = cli
        .index_path
        .clone()
        .unwrap_or_else(|| cli.repo.join(".kdd-index"));

    match cli.command {
        Command::Index { full, force, domain } => run_index(&cli.repo, &index_root, full, force, domain),
        Command::Merge {
            sources,
            output,
            strategy,
        } => run_merge(&sources, &output, &strategy),
        Command::Status => run_status(&index_root),
        query => run_query(&index_root, query),
    }
}

fn run_index(
    repo: &PathBuf,
    index_root: &PathBuf,
    full: bool,
    force: bool,
    domain: Option<String>,
) -> anyhow::Result<u8> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let store = ArtifactStore::new(index_root);
    let bus = EventBus::new();
    let embedder = HttpEmbedder::from_env();
    let index_level = detect_index_level(embedder.is_some(), false);
    log::info!("indexing at level {index_level}");

    let deps = IndexerDeps {
        store: &store,
        bus: Some(&bus),
        embedder: embedder.as_ref().map(|e| e as &dyn EmbeddingModel),
        index_level,
        domain: domain.clone(),
    };
    let git = GitAdapter::new(repo.clone());
    let specs_root = repo.join("specs");
    let options = IncrementalOptions {
        force,
        full,
        domain,
    };

    let report = runtime.block_on(index_incremental(repo, &specs_root, &git, &deps, &options))?;

    println!(
        "indexed {} documents ({} up-to-date, {} skipped, {} deleted, {} degraded){}",
        report.indexed,
        report.up_to_date,
        report.skipped,
        report.deleted,
        report.degraded,
        if report.full_scan { " [full scan]" } else { "" },
    );
    if report.partial_failure() {
        for (path, reason) in &report.errors {
            eprintln!("failed: {path}: {reason}");
        }
        return Ok(EXIT_PARTIAL);
    }
    Ok(EXIT_OK)
}

fn run_merge(sources: &[PathBuf], output: &PathBuf, strategy: &str) -> anyhow::Result<u8> {
    let strategy = match strategy {
        "last_write_wins" => kdd_domain::MergeStrategy::LastWriteWins,
        "fail_on_conflict" => kdd_domain::MergeStrategy::FailOnConflict,
        other => {
            eprintln!("unknown merge strategy '{other}'");
            return Ok(EXIT_USER);
        }
    };

    match merge_indexes(sources, output, &MergeOptions { strategy }, None) {
        Ok(report) => {
            println!(
                "merged {} nodes, {} edges, {} embeddings ({} conflicts resolved, {} deletions applied)",
                report.total_nodes,
                report.total_edges,
                report.total_embeddings,
                report.conflicts_resolved,
                report.deletions_applied,
            );
            Ok(EXIT_OK)
        }
        Err(err) => {
            eprintln!("merge failed: {err}");
            Ok(EXIT_FATAL)
        }
    }
}

fn run_status(index_root: &PathBuf) -> anyhow::Result<u8> {
    let store = ArtifactStore::new(index_root);
    match store.read_manifest()? {
        Some(manifest) => {
            println!("index: {}", index_root.display());
            println!("level: {}", manifest.index_level);
            println!(
                "nodes: {}  edges: {}  embeddings: {}",
                manifest.stats.nodes, manifest.stats.edges, manifest.stats.embeddings
            );
            if let Some(model) = &manifest.embedding_model {
                println!("embedding model: {model}");
            }
            if let Some(commit) = &manifest.git_commit {
                println!("git commit: {commit}");
            }
            Ok(EXIT_OK)
        }
        None => {
            println!("no index at {}", index_root.display());
            Ok(EXIT_USER)
        }
    }
}

fn run_query(index_root: &PathBuf, command: Command) -> anyhow::Result<u8> {
    let store = ArtifactStore::new(index_root);
    let loaded = load_index(&store).context("index not loadable; run `kdd-index index` first")?;
    let snapshot = Snapshot::from_loaded(loaded)
        .map_err(|e| anyhow::anyhow!("failed to build snapshot: {e}"))?;

    let embedder: Option<Arc<dyn EmbeddingModel>> = HttpEmbedder::from_env()
        .map(|e| Arc::new(e) as Arc<dyn EmbeddingModel>);
    let engine = QueryEngine::new(Arc::new(snapshot), embedder, None);

    let outcome: Result<(serde_json::Value, bool), kdd_query::QueryError> = match command {
        Command::Search {
            text,
            kind,
            layer,
            limit,
            min_score,
            semantic,
            json,
        } => {
            let filters = QueryFilters {
                include_kinds: parse_kinds(&kind)?,
                include_layers: parse_layers(&layer)?,
                respect_layers: true,
                limit,
                min_score,
            };
            if semantic {
                let mut input = SemanticInput::new(text);
                input.filters = filters;
                engine
                    .semantic(&input)
                    .map(|r| (serde_json::to_value(&r).unwrap_or_default(), json))
            } else {
                let mut input = HybridInput::new(text);
                input.filters = filters;
                engine
                    .hybrid(&input)
                    .map(|r| (serde_json::to_value(&r).unwrap_or_default(), json))
            }
        }
        Command::Graph {
            node,
            depth,
            types,
            json,
        } => engine
            .graph(&GraphQueryInput {
                root_node: node,
                depth,
                edge_types: types,
                filters: QueryFilters::default(),
            })
            .map(|r| (serde_json::to_value(&r).unwrap_or_default(), json)),
        Command::Impact { node, depth, json } => engine
            .impact(&ImpactInput { node_id: node, depth })
            .map(|r| (serde_json::to_value(&r).unwrap_or_default(), json)),
        Command::Coverage { node, json } => engine
            .coverage(&CoverageInput { node_id: node })
            .map(|r| (serde_json::to_value(&r).unwrap_or_default(), json)),
        Command::Violations { json } => engine
            .violations(&ViolationsInput::default())
            .map(|r| (serde_json::to_value(&r).unwrap_or_default(), json)),
        Command::Orphans { json } => engine
            .orphans(&OrphanInput::default())
            .map(|r| (serde_json::to_value(&r).unwrap_or_default(), json)),
        Command::Context {
            hints,
            depth,
            max_tokens,
            json,
        } => engine
            .context(&ContextInput {
                hints,
                depth,
                max_tokens,
            })
            .map(|r| (serde_json::to_value(&r).unwrap_or_default(), json)),
        Command::Index { .. } | Command::Merge { .. } | Command::Status => unreachable!(),
    };

    match outcome {
        Ok((value, as_json)) => {
            if as_json {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_human(&value);
            }
            Ok(EXIT_OK)
        }
        Err(err) => {
            eprintln!("{err}");
            let code = match err.code() {
                "TIMEOUT" | "INDEX_UNAVAILABLE" | "EMBEDDING_FAILED" => EXIT_FATAL,
                _ => EXIT_USER,
            };
            Ok(code)
        }
    }
}

fn parse_kinds(raw: &[String]) -> anyhow::Result<Vec<Kind>> {
    raw.iter()
        .map(|k| {
            k.parse::<Kind>()
                .map_err(|()| anyhow::anyhow!("unknown kind '{k}'"))
        })
        .collect()
}

fn parse_layers(raw: &[String]) -> anyhow::Result<Vec<Layer>> {
    raw.iter()
        .map(|l| {
            l.parse::<Layer>()
                .map_err(|()| anyhow::anyhow!("unknown layer '{l}'"))
        })
        .collect()
}

/// Compact human rendering: one line per list item, scalars inline.
fn print_human(value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, item) in map {
                match item {
                    serde_json::Value::Array(items) => {
                        println!("{key} ({}):", items.len());
                        for entry in items {
                            println!("  {}", summarize(entry));
                        }
                    }
                    other => println!("{key}: {}", summarize(other)),
                }
            }
        }
        other => println!("{}", summarize(other)),
    }
}

fn summarize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut parts = Vec::new();
            for key in ["node_id", "id", "from_node", "to_node", "edge_type", "score", "distance", "status", "content"] {
                if let Some(v) = map.get(key) {
                    parts.push(format!("{key}={v}"));
                }
            }
            if parts.is_empty() {
                value.to_string()
            } else {
                parts.join(" ")
            }
        }
        other => other.to_string(),
    }
}
