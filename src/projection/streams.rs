use std::collections::BTreeSet;

use tracing::debug;

use crate::storage::{HierarchyFilter, RestrictionFilter};
use crate::types::{ProjectionError, Result};

use super::events::{ContentStreamWasForked, ContentStreamWasRemoved};
use super::writer::GraphWriter;

impl GraphWriter<'_> {
    pub(super) fn fork_content_stream(&mut self, event: &ContentStreamWasForked) -> Result<()> {
        if event.content_stream_id == event.source_content_stream_id {
            return Err(ProjectionError::InvalidArgument(format!(
                "stream {} cannot be forked onto itself",
                event.content_stream_id
            )));
        }
        let occupied = !self
            .tx
            .hierarchy(&HierarchyFilter::new().content_stream(&event.content_stream_id))?
            .is_empty();
        if occupied {
            return Err(ProjectionError::violation(format!(
                "fork target stream {} already has edges",
                event.content_stream_id
            )));
        }
        self.tx
            .copy_content_stream(&event.source_content_stream_id, &event.content_stream_id)?;
        debug!(
            source = %event.source_content_stream_id,
            target = %event.content_stream_id,
            "projection.stream.forked"
        );
        Ok(())
    }

    pub(super) fn remove_content_stream(&mut self, event: &ContentStreamWasRemoved) -> Result<()> {
        let cs = &event.content_stream_id;
        let edges = self.tx.hierarchy(&HierarchyFilter::new().content_stream(cs))?;
        let mut children = BTreeSet::new();
        for edge in &edges {
            self.tx.delete_hierarchy(&edge.key())?;
            children.insert(edge.child);
        }
        let restrictions = self
            .tx
            .delete_restrictions(&RestrictionFilter::new().content_stream(cs))?;
        self.metrics.restriction_edges_removed(restrictions);
        let mut deleted = 0;
        for anchor in children {
            if self.delete_if_orphaned(anchor)? {
                deleted += 1;
            }
        }
        debug!(stream = %cs, edges = edges.len(), deleted, "projection.stream.removed");
        Ok(())
    }
}
