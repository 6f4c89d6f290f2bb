use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::model::{ContentStreamId, NodeAggregateId, NodeRelationAnchorPoint};
use crate::storage::{
    GraphStore, HierarchyFilter, HierarchyRelation, ReferenceRelation, RestrictionEdge,
    RestrictionFilter,
};
use crate::types::Result;

const MAX_FINDINGS: usize = 32;

/// Specifies the depth of verification checks to perform.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyLevel {
    /// Row-level checks: edge endpoints, references and orphaned rows.
    Fast,
    /// Adds tree shape, sibling positions and restriction coverage.
    Full,
}

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Informational message about the verification process.
    Info,
    /// Non-critical issue that may indicate a problem.
    Warning,
    /// Broken invariant.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Human-readable description of the issue.
    pub message: String,
}

/// Rows examined during verification.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// Node rows.
    pub nodes: u64,
    /// Hierarchy edges.
    pub hierarchy_edges: u64,
    /// Restriction edges.
    pub restriction_edges: u64,
    /// Reference rows.
    pub references: u64,
    /// Distinct content streams with at least one hierarchy edge.
    pub content_streams: u64,
}

/// Complete report of a verification operation.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// The verification level that was performed.
    pub level: VerifyLevel,
    /// Whether no error-level finding was recorded.
    pub success: bool,
    /// Findings, capped per run.
    pub findings: Vec<VerifyFinding>,
    /// Statistics about the rows examined.
    pub counts: VerifyCounts,
}

impl VerifyReport {
    /// Number of error-level findings.
    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.severity == VerifySeverity::Error)
            .count()
    }
}

#[derive(Default)]
struct Findings(Vec<VerifyFinding>);

impl Findings {
    fn push(&mut self, severity: VerifySeverity, message: impl Into<String>) {
        if self.0.len() < MAX_FINDINGS {
            self.0.push(VerifyFinding {
                severity,
                message: message.into(),
            });
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(VerifySeverity::Error, message);
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(VerifySeverity::Warning, message);
    }

    fn full(&self) -> bool {
        self.0.len() >= MAX_FINDINGS
    }
}

/// Checks the projected graph in `store` for broken invariants.
///
/// A failed check is reported as a finding rather than an error; the `Err` case
/// is reserved for storage failures and undecodable rows.
pub fn verify<S: GraphStore>(store: &S, level: VerifyLevel) -> Result<VerifyReport> {
    store.read(|read| {
        let mut findings = Findings::default();
        let mut counts = VerifyCounts::default();

        let nodes = read.all_nodes()?;
        let edges = read.hierarchy(&HierarchyFilter::new())?;
        let restrictions = read.restrictions(&RestrictionFilter::new())?;
        let references = read.all_references()?;
        counts.nodes = nodes.len() as u64;
        counts.hierarchy_edges = edges.len() as u64;
        counts.restriction_edges = restrictions.len() as u64;
        counts.references = references.len() as u64;
        counts.content_streams = edges
            .iter()
            .map(|edge| &edge.content_stream_id)
            .collect::<BTreeSet<_>>()
            .len() as u64;

        let anchors: FxHashMap<NodeRelationAnchorPoint, &NodeAggregateId> = nodes
            .iter()
            .map(|node| (node.anchor, &node.node_aggregate_id))
            .collect();

        check_edge_endpoints(&edges, &anchors, &mut findings);
        check_orphans(&edges, &references, &anchors, &mut findings);

        if matches!(level, VerifyLevel::Full) && !findings.full() {
            check_single_parent(&edges, &mut findings);
            check_cycles(&edges, &mut findings);
            check_positions(&edges, &mut findings);
            check_restriction_coverage(&restrictions, &edges, &anchors, &mut findings);
        }

        if findings.full() {
            findings.0.push(VerifyFinding {
                severity: VerifySeverity::Info,
                message: format!("stopped after {MAX_FINDINGS} findings"),
            });
        }
        let success = !findings
            .0
            .iter()
            .any(|finding| finding.severity == VerifySeverity::Error);
        Ok(VerifyReport {
            level,
            success,
            findings: findings.0,
            counts,
        })
    })
}

fn check_edge_endpoints(
    edges: &[HierarchyRelation],
    anchors: &FxHashMap<NodeRelationAnchorPoint, &NodeAggregateId>,
    findings: &mut Findings,
) {
    for edge in edges {
        if !anchors.contains_key(&edge.child) {
            findings.error(format!(
                "hierarchy edge {} -> {} in stream {} at {} targets a missing node",
                edge.parent, edge.child, edge.content_stream_id, edge.dimension_space_point
            ));
        }
        if !edge.parent.is_root_edge() && !anchors.contains_key(&edge.parent) {
            findings.error(format!(
                "hierarchy edge {} -> {} in stream {} at {} starts at a missing node",
                edge.parent, edge.child, edge.content_stream_id, edge.dimension_space_point
            ));
        }
        if findings.full() {
            return;
        }
    }
}

fn check_orphans(
    edges: &[HierarchyRelation],
    references: &[ReferenceRelation],
    anchors: &FxHashMap<NodeRelationAnchorPoint, &NodeAggregateId>,
    findings: &mut Findings,
) {
    for reference in references {
        if !anchors.contains_key(&reference.anchor) {
            findings.error(format!(
                "reference {} #{} belongs to missing node {}",
                reference.name, reference.position, reference.anchor
            ));
        }
    }
    let children: FxHashSet<NodeRelationAnchorPoint> = edges.iter().map(|edge| edge.child).collect();
    let mut unreferenced: Vec<_> = anchors
        .iter()
        .filter(|(anchor, _)| !children.contains(anchor))
        .collect();
    unreferenced.sort_by_key(|(anchor, _)| **anchor);
    for (anchor, aggregate) in unreferenced {
        findings.warning(format!(
            "node {anchor} of aggregate {aggregate} is not referenced by any hierarchy edge"
        ));
    }
}

type Scope<'e> = (&'e ContentStreamId, &'e str);

fn check_single_parent(edges: &[HierarchyRelation], findings: &mut Findings) {
    let mut parents: BTreeMap<(Scope<'_>, NodeRelationAnchorPoint), usize> = BTreeMap::new();
    for edge in edges {
        *parents
            .entry(((&edge.content_stream_id, edge.dimension_space_point_hash()), edge.child))
            .or_default() += 1;
    }
    for (((cs, hash), child), count) in parents {
        if count > 1 {
            findings.error(format!(
                "node {child} has {count} parent edges in stream {cs} at dimension hash {hash}"
            ));
        }
    }
}

fn check_cycles(edges: &[HierarchyRelation], findings: &mut Findings) {
    let mut by_scope: BTreeMap<Scope<'_>, FxHashMap<NodeRelationAnchorPoint, NodeRelationAnchorPoint>> =
        BTreeMap::new();
    for edge in edges {
        by_scope
            .entry((&edge.content_stream_id, edge.dimension_space_point_hash()))
            .or_default()
            .insert(edge.child, edge.parent);
    }
    for ((cs, hash), parent_of) in by_scope {
        let mut acyclic: FxHashSet<NodeRelationAnchorPoint> = FxHashSet::default();
        for start in parent_of.keys() {
            let mut path = FxHashSet::default();
            let mut current = *start;
            while let Some(parent) = parent_of.get(&current) {
                if acyclic.contains(&current) {
                    break;
                }
                if !path.insert(current) {
                    findings.error(format!(
                        "hierarchy cycle through node {current} in stream {cs} at dimension hash {hash}"
                    ));
                    break;
                }
                current = *parent;
            }
            acyclic.extend(path);
            if findings.full() {
                return;
            }
        }
    }
}

fn check_positions(edges: &[HierarchyRelation], findings: &mut Findings) {
    let mut seen: FxHashMap<(Scope<'_>, NodeRelationAnchorPoint, i64), NodeRelationAnchorPoint> =
        FxHashMap::default();
    for edge in edges {
        let slot = (
            (&edge.content_stream_id, edge.dimension_space_point_hash()),
            edge.parent,
            edge.position,
        );
        if let Some(other) = seen.insert(slot, edge.child) {
            findings.warning(format!(
                "siblings {other} and {} below {} share position {} in stream {} at {}",
                edge.child, edge.parent, edge.position, edge.content_stream_id, edge.dimension_space_point
            ));
        }
    }
}

fn check_restriction_coverage(
    restrictions: &[RestrictionEdge],
    edges: &[HierarchyRelation],
    anchors: &FxHashMap<NodeRelationAnchorPoint, &NodeAggregateId>,
    findings: &mut Findings,
) {
    let covered: FxHashSet<(&ContentStreamId, &str, &NodeAggregateId)> = edges
        .iter()
        .filter_map(|edge| {
            anchors
                .get(&edge.child)
                .map(|aggregate| (&edge.content_stream_id, edge.dimension_space_point_hash(), *aggregate))
        })
        .collect();
    for restriction in restrictions {
        let key = (
            &restriction.content_stream_id,
            restriction.dimension_space_point_hash.as_str(),
            &restriction.affected,
        );
        if !covered.contains(&key) {
            findings.error(format!(
                "restriction {} -> {} in stream {} at dimension hash {} affects an uncovered node",
                restriction.origin,
                restriction.affected,
                restriction.content_stream_id,
                restriction.dimension_space_point_hash
            ));
        }
        if findings.full() {
            return;
        }
    }
}
