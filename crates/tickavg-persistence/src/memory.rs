//! In-memory storage backend.

use crate::error::PersistenceResult;
use crate::storage::{RecordQuery, Storage};
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use tickavg_core::TradeRecord;

/// Per-symbol record vectors kept sorted by event time.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<String, Vec<TradeRecord>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all symbols.
    pub fn len(&self) -> usize {
        self.records.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn query(&self, query: RecordQuery) -> BoxFuture<'_, PersistenceResult<Vec<TradeRecord>>> {
        Box::pin(async move {
            let matching: Vec<TradeRecord> = self
                .records
                .read()
                .get(&query.symbol)
                .map(|rs| rs.iter().filter(|r| query.matches(r)).cloned().collect())
                .unwrap_or_default();
            Ok(query.finish(matching))
        })
    }

    fn append_batch<'a>(
        &'a self,
        records: &'a [TradeRecord],
    ) -> BoxFuture<'a, PersistenceResult<()>> {
        Box::pin(async move {
            let mut guard = self.records.write();
            for record in records {
                let series = guard.entry(record.symbol().to_string()).or_default();
                // Stable insert after equal timestamps keeps arrival order.
                let pos = series.partition_point(|r| r.event_time() <= record.event_time());
                series.insert(pos, record.clone());
            }
            Ok(())
        })
    }
}
