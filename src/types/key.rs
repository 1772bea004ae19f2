//! Series key: the opaque identifier a `SeriesIndex` keys `SeriesStore`s by.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::consolidation::Consolidator;

/// Identifies a rollup archive: its resolution and how it was consolidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveTag {
    /// Rollup span in seconds.
    pub agg_span: u32,
    /// Consolidator that produced this archive.
    pub consolidator: Consolidator,
}

/// Opaque series identifier: a metric id plus an optional archive tag.
///
/// The metric id is an interned string rather than a numeric id — this
/// crate has no opinion on how upstream names metrics, only that the name
/// is hashable and cheap to clone, which `Arc<str>` gives for free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    metric_id: Arc<str>,
    archive: Option<ArchiveTag>,
}

impl SeriesKey {
    /// A key naming the raw, native-resolution series for a metric.
    pub fn raw(metric_id: impl Into<Arc<str>>) -> Self {
        Self {
            metric_id: metric_id.into(),
            archive: None,
        }
    }

    /// A key naming a specific rollup archive of a metric.
    pub fn archive(metric_id: impl Into<Arc<str>>, agg_span: u32, consolidator: Consolidator) -> Self {
        Self {
            metric_id: metric_id.into(),
            archive: Some(ArchiveTag {
                agg_span,
                consolidator,
            }),
        }
    }

    /// The metric id this key names.
    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    /// The archive tag, if this key names a rollup rather than the raw series.
    pub fn archive_tag(&self) -> Option<ArchiveTag> {
        self.archive
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.archive {
            None => write!(f, "{}", self.metric_id),
            Some(tag) => write!(f, "{};{}:{:?}", self.metric_id, tag.agg_span, tag.consolidator),
        }
    }
}
