//! Revision graph construction and classification
//!
//! Uses `petgraph::StableGraph` for the resolved dependency edges, with an
//! id→index side table for O(1) lookups. The graph is an immutable value
//! produced wholesale by [`RevisionGraph::build`]; there are no incremental
//! mutators, so a rebuild replaces the previous graph atomically from the
//! consumer's point of view.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One parsed migration script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    /// Declared revision identifier
    pub id: String,
    /// Identifiers this revision revises; empty for a base revision
    pub down_revisions: Vec<String>,
    /// Originating script path, carried through unexamined
    pub path: PathBuf,
    /// Human-readable label, `<id> (<file stem>)`, fixed at parse time
    pub label: String,
}

impl Revision {
    /// Create a revision node.
    ///
    /// Deduplicates `down_revisions` (order-preserving) and derives the
    /// display label from the file stem of `source`.
    pub fn new(id: impl Into<String>, down_revisions: Vec<String>, source: &Path) -> Self {
        let id = id.into();
        let mut seen = HashSet::new();
        let down_revisions: Vec<String> = down_revisions
            .into_iter()
            .filter(|parent| seen.insert(parent.clone()))
            .collect();
        let label = match source.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) => format!("{id} ({stem})"),
            None => id.clone(),
        };
        Self {
            id,
            down_revisions,
            path: source.to_path_buf(),
            label,
        }
    }

    /// A merge revision unites two or more branches.
    pub fn is_merge(&self) -> bool {
        self.down_revisions.len() > 1
    }

    /// A base revision revises nothing.
    pub fn is_base(&self) -> bool {
        self.down_revisions.is_empty()
    }
}

/// A resolved dependency edge, parent → child. Only emitted when both
/// endpoints exist in the graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

/// A revision discarded by a later script declaring the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowedRevision {
    pub id: String,
    pub path: PathBuf,
}

/// Per-rebuild counts, suitable for logging. Only the four counts are
/// contractual; the `Display` wording is free-form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub revisions: usize,
    pub bases: usize,
    pub heads: usize,
    pub missing_parents: usize,
}

impl fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} revisions: {} base(s), {} head(s), {} missing parent(s)",
            self.revisions, self.bases, self.heads, self.missing_parents
        )
    }
}

/// The reconstructed revision graph
///
/// Built wholesale from a node sequence by [`RevisionGraph::build`]; every
/// anomaly in the input (dangling references, duplicate ids, self-loops,
/// cycles) degrades to data a consumer can inspect, never to an error.
pub struct RevisionGraph {
    /// Surviving revisions plus resolved edges (private to enforce encapsulation)
    inner: StableGraph<Revision, ()>,
    /// id → node index for O(1) lookups
    index: HashMap<String, NodeIndex>,
    /// Every referenced parent id → sorted set of child ids. Keys include
    /// parents with no corresponding revision.
    children: BTreeMap<String, BTreeSet<String>>,
    /// Revisions with no parents, sorted
    bases: BTreeSet<String>,
    /// Revisions never referenced as a parent, sorted
    heads: BTreeSet<String>,
    /// Referenced parent ids with no corresponding revision, sorted
    missing: BTreeSet<String>,
    /// Earlier nodes discarded by duplicate-id overwrites, in input order
    shadowed: Vec<ShadowedRevision>,
}

impl RevisionGraph {
    /// Build a graph from a sequence of parsed revisions.
    ///
    /// Pure function of the input sequence: the same sequence yields the
    /// same classifications and the same iteration orders. Never fails —
    /// an empty sequence yields an empty graph, a duplicate id keeps the
    /// later node (the earlier one is recorded in [`shadowed`]), and a
    /// revision naming itself as a parent produces a self-loop edge.
    ///
    /// [`shadowed`]: RevisionGraph::shadowed
    ///
    /// # Example
    /// ```
    /// use std::path::Path;
    /// use revgraph_core::{Revision, RevisionGraph};
    ///
    /// let graph = RevisionGraph::build(vec![
    ///     Revision::new("a1", vec![], Path::new("a1_init.py")),
    ///     Revision::new("b2", vec!["a1".into()], Path::new("b2_next.py")),
    /// ]);
    /// assert!(graph.is_base("a1"));
    /// assert!(graph.is_head("b2"));
    /// ```
    pub fn build(revisions: impl IntoIterator<Item = Revision>) -> Self {
        let mut inner = StableGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();
        let mut shadowed = Vec::new();

        // Index pass: last write wins on duplicate ids, discarded nodes are
        // kept as diagnostics
        for revision in revisions {
            match index.get(&revision.id) {
                Some(&idx) => {
                    let prior = std::mem::replace(&mut inner[idx], revision);
                    shadowed.push(ShadowedRevision {
                        id: prior.id,
                        path: prior.path,
                    });
                }
                None => {
                    let id = revision.id.clone();
                    let idx = inner.add_node(revision);
                    index.insert(id, idx);
                }
            }
        }

        // Adjacency pass over surviving nodes: every parent reference lands
        // in the children index; references that resolve also become edges
        let snapshot: Vec<(NodeIndex, String, Vec<String>)> = inner
            .node_indices()
            .map(|idx| {
                let node = &inner[idx];
                (idx, node.id.clone(), node.down_revisions.clone())
            })
            .collect();

        let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (child_idx, child_id, parents) in &snapshot {
            let mut wired = HashSet::new();
            for parent in parents {
                if !wired.insert(parent.as_str()) {
                    continue;
                }
                children
                    .entry(parent.clone())
                    .or_default()
                    .insert(child_id.clone());
                if let Some(&parent_idx) = index.get(parent) {
                    inner.add_edge(parent_idx, *child_idx, ());
                }
            }
        }

        // Classification pass, derived purely from the two indices
        let mut bases = BTreeSet::new();
        let mut heads = BTreeSet::new();
        for (_, id, parents) in &snapshot {
            if parents.is_empty() {
                bases.insert(id.clone());
            }
            if !children.contains_key(id) {
                heads.insert(id.clone());
            }
        }
        let missing: BTreeSet<String> = children
            .keys()
            .filter(|parent| !index.contains_key(*parent))
            .cloned()
            .collect();

        debug!(
            revisions = index.len(),
            bases = bases.len(),
            heads = heads.len(),
            missing_parents = missing.len(),
            shadowed = shadowed.len(),
            "built revision graph"
        );

        Self {
            inner,
            index,
            children,
            bases,
            heads,
            missing,
            shadowed,
        }
    }

    /// Look up a revision by id.
    pub fn get(&self, id: &str) -> Option<&Revision> {
        self.index.get(id).map(|&idx| &self.inner[idx])
    }

    /// Sorted direct children of an id; empty when it has none. The id may
    /// be a missing parent — its children are still indexed.
    pub fn children_of(&self, id: &str) -> Vec<&str> {
        self.children
            .get(id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether `id` names a revision with no parents.
    pub fn is_base(&self, id: &str) -> bool {
        self.bases.contains(id)
    }

    /// Whether `id` names a revision never referenced as a parent.
    pub fn is_head(&self, id: &str) -> bool {
        self.heads.contains(id)
    }

    /// Whether `id` is referenced as a parent but has no revision.
    pub fn is_missing_parent(&self, id: &str) -> bool {
        self.missing.contains(id)
    }

    /// Iterate over all revisions in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = &Revision> {
        self.inner.node_weights()
    }

    /// Base revision ids, sorted.
    pub fn bases(&self) -> impl Iterator<Item = &str> {
        self.bases.iter().map(String::as_str)
    }

    /// Head revision ids, sorted.
    pub fn heads(&self) -> impl Iterator<Item = &str> {
        self.heads.iter().map(String::as_str)
    }

    /// Referenced-but-absent parent ids, sorted.
    pub fn missing_parents(&self) -> impl Iterator<Item = &str> {
        self.missing.iter().map(String::as_str)
    }

    /// Revisions discarded by duplicate-id overwrites, in input order.
    pub fn shadowed(&self) -> &[ShadowedRevision] {
        &self.shadowed
    }

    /// Resolved edges, parent → child, sorted by (from, to). Derived on
    /// demand; references to missing parents are not emitted here (they are
    /// reachable via [`missing_parents`](RevisionGraph::missing_parents)).
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = self
            .inner
            .edge_references()
            .map(|edge| DependencyEdge {
                from: self.inner[edge.source()].id.clone(),
                to: self.inner[edge.target()].id.clone(),
            })
            .collect();
        edges.sort();
        edges
    }

    /// Get the number of revisions in the graph
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Get the number of resolved edges in the graph
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Per-rebuild diagnostic counts.
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            revisions: self.node_count(),
            bases: self.bases.len(),
            heads: self.heads.len(),
            missing_parents: self.missing.len(),
        }
    }
}

impl Default for RevisionGraph {
    fn default() -> Self {
        Self::build(std::iter::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(id: &str, parents: &[&str]) -> Revision {
        let script = format!("{id}_script.py");
        Revision::new(
            id,
            parents.iter().map(|p| (*p).to_string()).collect(),
            Path::new(&script),
        )
    }

    #[test]
    fn test_single_revision_is_base_and_head() {
        let graph = RevisionGraph::build(vec![rev("a1", &[])]);

        assert!(graph.is_base("a1"));
        assert!(graph.is_head("a1"));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_child_indexed_under_parent() {
        let graph = RevisionGraph::build(vec![rev("a1", &[]), rev("b2", &["a1"])]);

        assert_eq!(graph.children_of("a1"), vec!["b2"]);
        assert_eq!(graph.bases().collect::<Vec<_>>(), vec!["a1"]);
        assert_eq!(graph.heads().collect::<Vec<_>>(), vec!["b2"]);
        assert_eq!(
            graph.edges(),
            vec![DependencyEdge {
                from: "a1".into(),
                to: "b2".into()
            }]
        );
    }

    #[test]
    fn test_merge_revision_has_both_edges() {
        let graph = RevisionGraph::build(vec![
            rev("a1", &[]),
            rev("b2", &[]),
            rev("c3", &["a1", "b2"]),
        ]);

        assert!(graph.get("c3").unwrap().is_merge());
        assert_eq!(
            graph.edges(),
            vec![
                DependencyEdge {
                    from: "a1".into(),
                    to: "c3".into()
                },
                DependencyEdge {
                    from: "b2".into(),
                    to: "c3".into()
                },
            ]
        );
        assert_eq!(graph.heads().collect::<Vec<_>>(), vec!["c3"]);
    }

    #[test]
    fn test_missing_parent_tracked_but_not_edged() {
        let graph = RevisionGraph::build(vec![rev("d4", &["zzz"])]);

        assert_eq!(graph.missing_parents().collect::<Vec<_>>(), vec!["zzz"]);
        assert!(graph.is_missing_parent("zzz"));
        assert_eq!(graph.children_of("zzz"), vec!["d4"]);
        assert!(graph.edges().is_empty());
        assert!(graph.get("zzz").is_none());
    }

    #[test]
    fn test_duplicate_id_last_write_wins_and_is_recorded() {
        let first = rev("x", &[]);
        let second = Revision::new("x", vec!["a1".into()], Path::new("x_redone.py"));
        let graph = RevisionGraph::build(vec![rev("a1", &[]), first, second]);

        assert_eq!(graph.node_count(), 2);
        let survivor = graph.get("x").unwrap();
        assert_eq!(survivor.path, Path::new("x_redone.py"));
        assert_eq!(survivor.down_revisions, vec!["a1"]);

        assert_eq!(graph.shadowed().len(), 1);
        assert_eq!(graph.shadowed()[0].id, "x");
        assert_eq!(graph.shadowed()[0].path, Path::new("x_script.py"));
    }

    #[test]
    fn test_self_reference_produces_self_loop() {
        let graph = RevisionGraph::build(vec![rev("a1", &["a1"])]);

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(
            graph.edges(),
            vec![DependencyEdge {
                from: "a1".into(),
                to: "a1".into()
            }]
        );
        // Referenced as a parent, so not a head; has a parent, so not a base
        assert!(!graph.is_head("a1"));
        assert!(!graph.is_base("a1"));
        assert!(graph.missing_parents().next().is_none());
    }

    #[test]
    fn test_cycle_classifies_without_error() {
        let graph = RevisionGraph::build(vec![rev("a1", &["b2"]), rev("b2", &["a1"])]);

        // A pure cycle has no base and no head; the sets report that truthfully
        assert_eq!(graph.bases().count(), 0);
        assert_eq!(graph.heads().count(), 0);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_empty_input_yields_empty_graph() {
        let graph = RevisionGraph::default();

        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.bases().count(), 0);
        assert_eq!(graph.heads().count(), 0);
        assert_eq!(graph.missing_parents().count(), 0);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_children_are_sorted_and_deduplicated() {
        let graph = RevisionGraph::build(vec![
            rev("a1", &[]),
            rev("c3", &["a1"]),
            rev("b2", &["a1", "a1"]),
        ]);

        assert_eq!(graph.children_of("a1"), vec!["b2", "c3"]);
        // The duplicated reference wires a single edge
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_deterministic_rebuild() {
        let input = || {
            vec![
                rev("m3", &["a1", "b2"]),
                rev("a1", &[]),
                rev("b2", &["a1"]),
                rev("d4", &["gone"]),
            ]
        };
        let one = RevisionGraph::build(input());
        let two = RevisionGraph::build(input());

        assert_eq!(one.bases().collect::<Vec<_>>(), two.bases().collect::<Vec<_>>());
        assert_eq!(one.heads().collect::<Vec<_>>(), two.heads().collect::<Vec<_>>());
        assert_eq!(
            one.missing_parents().collect::<Vec<_>>(),
            two.missing_parents().collect::<Vec<_>>()
        );
        assert_eq!(one.edges(), two.edges());
    }

    #[test]
    fn test_classification_partition_properties() {
        let graph = RevisionGraph::build(vec![
            rev("a1", &[]),
            rev("b2", &["a1"]),
            rev("c3", &["b2", "nope"]),
        ]);

        let ids: BTreeSet<&str> = graph.nodes().map(|n| n.id.as_str()).collect();
        // bases ⊆ nodes, heads ⊆ nodes, missing ∩ nodes = ∅
        assert!(graph.bases().all(|b| ids.contains(b)));
        assert!(graph.heads().all(|h| ids.contains(h)));
        assert!(graph.missing_parents().all(|m| !ids.contains(m)));
        // every edge endpoint names an existing revision
        for edge in graph.edges() {
            assert!(ids.contains(edge.from.as_str()));
            assert!(ids.contains(edge.to.as_str()));
        }
        // no head is referenced by any node's parents
        for head in graph.heads() {
            assert!(graph
                .nodes()
                .all(|n| !n.down_revisions.iter().any(|p| p == head)));
        }
    }

    #[test]
    fn test_summary_counts() {
        let graph = RevisionGraph::build(vec![
            rev("a1", &[]),
            rev("b2", &["a1"]),
            rev("d4", &["gone"]),
        ]);

        let summary = graph.summary();
        assert_eq!(summary.revisions, 3);
        assert_eq!(summary.bases, 1);
        assert_eq!(summary.heads, 2);
        assert_eq!(summary.missing_parents, 1);

        let line = summary.to_string();
        assert!(line.contains("3 revisions"));
        assert!(line.contains("1 missing parent"));
    }

    #[test]
    fn test_revision_serialization_round_trip() {
        let revision = rev("a1", &["zz"]);
        let json = serde_json::to_string(&revision).unwrap();
        let back: Revision = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, revision.id);
        assert_eq!(back.down_revisions, revision.down_revisions);
        assert_eq!(back.label, revision.label);
    }
}
