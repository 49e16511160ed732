//! In-memory batch of trade records.

use tickavg_core::TradeRecord;

/// Ordered records accumulated by one collection between flushes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    records: Vec<TradeRecord>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: TradeRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TradeRecord> {
        self.records
    }

    /// Take the accumulated records, leaving an empty batch with the same
    /// capacity hint behind.
    pub(crate) fn take(&mut self) -> Batch {
        let capacity = self.records.len();
        std::mem::replace(self, Batch::with_capacity(capacity))
    }
}

impl From<Vec<TradeRecord>> for Batch {
    fn from(records: Vec<TradeRecord>) -> Self {
        Self { records }
    }
}
