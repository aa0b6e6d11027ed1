use std::path::PathBuf;

use anyhow::ensure;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use revgraph_core::{parser, DependencyEdge, GraphSummary, Revision, RevisionGraph, ShadowedRevision};

/// revgraph - Reconstruct the dependency graph of a migrations directory
#[derive(Parser)]
#[command(name = "revgraph")]
#[command(version)] // Auto-pull version from Cargo.toml
#[command(about = "Classify migration revisions as bases, heads, merges and missing parents", long_about = None)]
struct Cli {
    /// Directory containing migration version scripts
    directory: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct Report<'a> {
    summary: GraphSummary,
    bases: Vec<&'a str>,
    heads: Vec<&'a str>,
    merges: Vec<&'a str>,
    missing_parents: Vec<&'a str>,
    revisions: Vec<&'a Revision>,
    edges: Vec<DependencyEdge>,
    shadowed: &'a [ShadowedRevision],
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    ensure!(
        cli.directory.is_dir(),
        "{} is not a directory",
        cli.directory.display()
    );

    let graph = RevisionGraph::build(parser::scan_directory(&cli.directory));

    match cli.format {
        Format::Text => print_text(&graph),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report(&graph))?),
    }

    Ok(())
}

fn report(graph: &RevisionGraph) -> Report<'_> {
    let mut revisions: Vec<&Revision> = graph.nodes().collect();
    revisions.sort_by(|a, b| a.id.cmp(&b.id));

    let mut merges: Vec<&str> = graph
        .nodes()
        .filter(|node| node.is_merge())
        .map(|node| node.id.as_str())
        .collect();
    merges.sort_unstable();

    Report {
        summary: graph.summary(),
        bases: graph.bases().collect(),
        heads: graph.heads().collect(),
        merges,
        missing_parents: graph.missing_parents().collect(),
        revisions,
        edges: graph.edges(),
        shadowed: graph.shadowed(),
    }
}

fn print_text(graph: &RevisionGraph) {
    println!("{}", graph.summary());

    print_labeled_section(graph, "bases", graph.bases());
    print_labeled_section(graph, "heads", graph.heads());

    let report = report(graph);
    if !report.merges.is_empty() {
        println!("merges:");
        for id in &report.merges {
            let parents = graph
                .get(id)
                .map(|node| node.down_revisions.join(", "))
                .unwrap_or_default();
            println!("  {id} <- {parents}");
        }
    }

    if graph.missing_parents().next().is_some() {
        println!("missing parents:");
        for id in graph.missing_parents() {
            println!("  {id} (referenced by {})", graph.children_of(id).join(", "));
        }
    }

    if !graph.shadowed().is_empty() {
        println!("shadowed duplicates:");
        for shadowed in graph.shadowed() {
            println!("  {} from {}", shadowed.id, shadowed.path.display());
        }
    }
}

fn print_labeled_section<'a>(
    graph: &RevisionGraph,
    title: &str,
    ids: impl Iterator<Item = &'a str>,
) {
    let ids: Vec<&str> = ids.collect();
    if ids.is_empty() {
        return;
    }
    println!("{title}:");
    for id in ids {
        match graph.get(id) {
            Some(node) => println!("  {}", node.label),
            None => println!("  {id}"),
        }
    }
}
