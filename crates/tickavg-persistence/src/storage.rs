//! Storage collaborator interface.

use crate::error::PersistenceResult;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tickavg_core::TradeRecord;

/// Event-time constraint of a query. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    Any,
    Between {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    AtOrBefore(DateTime<Utc>),
}

impl TimeBound {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        match *self {
            Self::Any => true,
            Self::Between { from, to } => from <= ts && ts <= to,
            Self::AtOrBefore(end) => ts <= end,
        }
    }

    /// Whether records with an event time on `date` (UTC) can match.
    pub fn may_contain_date(&self, date: NaiveDate) -> bool {
        match *self {
            Self::Any => true,
            Self::Between { from, to } => from.date_naive() <= date && date <= to.date_naive(),
            Self::AtOrBefore(end) => date <= end.date_naive(),
        }
    }
}

/// Record selection for [`Storage::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub symbol: String,
    pub bound: TimeBound,
    /// Keep only the latest `limit` matching records.
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bound: TimeBound::Any,
            limit: None,
        }
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.bound = TimeBound::Between { from, to };
        self
    }

    pub fn at_or_before(mut self, end: DateTime<Utc>) -> Self {
        self.bound = TimeBound::AtOrBefore(end);
        self
    }

    pub fn latest(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &TradeRecord) -> bool {
        record.symbol() == self.symbol && self.bound.contains(record.event_time())
    }

    /// Sort matching records by event time and apply the limit.
    ///
    /// With a limit the *latest* records are kept, still in ascending order.
    pub(crate) fn finish(&self, mut records: Vec<TradeRecord>) -> Vec<TradeRecord> {
        records.sort_by_key(|r| r.event_time());
        if let Some(limit) = self.limit {
            let skip = records.len().saturating_sub(limit);
            records.drain(..skip);
        }
        records
    }
}

/// Append-only store of trade records.
pub trait Storage: Send + Sync {
    /// Matching records ordered by event time ascending.
    fn query(&self, query: RecordQuery) -> BoxFuture<'_, PersistenceResult<Vec<TradeRecord>>>;

    /// Append records. An empty slice is a no-op.
    fn append_batch<'a>(&'a self, records: &'a [TradeRecord]) -> BoxFuture<'a, PersistenceResult<()>>;
}

/// Arc wrapper for Storage trait objects.
pub type DynStorage = Arc<dyn Storage>;
