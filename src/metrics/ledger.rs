use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::RequestRecord;

/// Bounded FIFO of the most recent request records.
///
/// Insert is O(1); once `capacity` is reached the oldest record is evicted.
/// `total_ever_recorded` keeps counting across evictions.
#[derive(Debug)]
pub struct Ledger {
    records: VecDeque<RequestRecord>,
    capacity: usize,
    total: u64,
}

impl Ledger {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    pub fn record(&mut self, record: RequestRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        self.total += 1;
    }

    /// Records stamped at or after `since`, oldest first.
    ///
    /// The iterator is lazy and `Clone`, so it can be walked more than once.
    pub fn recent_since(
        &self,
        since: DateTime<Utc>,
    ) -> impl Iterator<Item = &RequestRecord> + Clone + '_ {
        self.records.iter().filter(move |r| r.timestamp >= since)
    }

    pub fn total_ever_recorded(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestRecord> + '_ {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Endpoint;
    use chrono::Duration;

    fn rec(status: u16) -> RequestRecord {
        RequestRecord::new(Endpoint::new("GET", "/api/test"), status, 0.01)
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut ledger = Ledger::new(3);
        for status in [200, 201, 202, 203, 204] {
            ledger.record(rec(status));
        }

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.total_ever_recorded(), 5);
        let kept: Vec<u16> = ledger.iter().map(|r| r.status_code).collect();
        assert_eq!(kept, vec![202, 203, 204]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut ledger = Ledger::new(0);
        ledger.record(rec(200));
        ledger.record(rec(201));
        assert_eq!(ledger.capacity(), 1);
        assert_eq!(ledger.iter().next().map(|r| r.status_code), Some(201));
    }

    #[test]
    fn recent_since_filters_and_restarts() {
        let now = Utc::now();
        let mut ledger = Ledger::new(10);

        let mut old = rec(200);
        old.timestamp = now - Duration::minutes(10);
        ledger.record(old);

        let mut fresh = rec(201);
        fresh.timestamp = now - Duration::seconds(30);
        ledger.record(fresh);

        let recent = ledger.recent_since(now - Duration::minutes(5));
        assert_eq!(recent.clone().count(), 1);
        // walking it again yields the same records
        assert_eq!(recent.map(|r| r.status_code).collect::<Vec<_>>(), vec![201]);
        assert!(ledger.recent_since(now).next().is_none());
    }
}
