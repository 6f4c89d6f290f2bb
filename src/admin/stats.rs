use std::collections::BTreeMap;

use serde::Serialize;

use crate::storage::{GraphStore, HierarchyFilter, RestrictionFilter};
use crate::types::Result;

/// Row counts of a projected graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsReport {
    /// Node rows.
    pub nodes: u64,
    /// Hierarchy edges.
    pub hierarchy_edges: u64,
    /// Restriction edges.
    pub restriction_edges: u64,
    /// Reference rows.
    pub references: u64,
    /// Processed-event markers.
    pub processed_events: u64,
    /// Per-stream breakdown, ordered by stream id.
    pub content_streams: Vec<ContentStreamStats>,
}

/// Row counts of one content stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentStreamStats {
    /// Stream id.
    pub content_stream_id: String,
    /// Hierarchy edges.
    pub hierarchy_edges: u64,
    /// Restriction edges.
    pub restriction_edges: u64,
    /// Distinct dimension points with at least one edge.
    pub dimension_space_points: u64,
}

/// Counts rows in `store`.
pub fn stats<S: GraphStore>(store: &S) -> Result<StatsReport> {
    store.read(|read| {
        let mut streams: BTreeMap<String, (ContentStreamStats, Vec<String>)> = BTreeMap::new();
        let edges = read.hierarchy(&HierarchyFilter::new())?;
        for edge in &edges {
            let (entry, hashes) = streams
                .entry(edge.content_stream_id.to_string())
                .or_default();
            entry.hierarchy_edges += 1;
            hashes.push(edge.dimension_space_point_hash().to_owned());
        }
        let restrictions = read.restrictions(&RestrictionFilter::new())?;
        for restriction in &restrictions {
            streams
                .entry(restriction.content_stream_id.to_string())
                .or_default()
                .0
                .restriction_edges += 1;
        }

        let content_streams = streams
            .into_iter()
            .map(|(id, (mut entry, mut hashes))| {
                hashes.sort_unstable();
                hashes.dedup();
                entry.content_stream_id = id;
                entry.dimension_space_points = hashes.len() as u64;
                entry
            })
            .collect();

        Ok(StatsReport {
            nodes: read.count_nodes()?,
            hierarchy_edges: edges.len() as u64,
            restriction_edges: restrictions.len() as u64,
            references: read.all_references()?.len() as u64,
            processed_events: read.processed_count()?,
            content_streams,
        })
    })
}
