// Bounded in-memory history of listing polls, addressed by poll id.
// One RwLock guards both the ring and the id counter, so an append (assign id, push, evict)
// is never observed half-done by a reader. Snapshots are shared as Arc so reads stay cheap.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{PollOutcome, Snapshot};

/// Number of polls retained; older ones are evicted FIFO.
pub const HISTORY_CAPACITY: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("no poll has completed yet")]
    EmptyHistory,
    #[error("malformed id {0:?}")]
    MalformedId(String),
    #[error("response does not exist for id {0}, is your id too far back?")]
    OutOfRange(u64),
    #[error("response does not exist for id {0} yet, the listing may be down or not populated")]
    NotPopulated(u64),
}

/// Which snapshot a client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    Newest,
    Oldest,
    Id(u64),
}

impl PageRequest {
    /// Absent query value means newest.
    pub fn from_query(value: Option<&str>) -> Result<Self, HistoryError> {
        match value {
            None => Ok(PageRequest::Newest),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for PageRequest {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "min" | "oldest" => Ok(PageRequest::Oldest),
            t => t
                .parse::<u64>()
                .map(PageRequest::Id)
                .map_err(|_| HistoryError::MalformedId(s.to_string())),
        }
    }
}

/// A snapshot together with the lower pagination bound at the time it was read.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub snapshot: Arc<Snapshot>,
    pub minimum_id: u64,
}

struct Ring {
    entries: VecDeque<Arc<Snapshot>>,
    next_id: u64,
}

impl Ring {
    fn newest(&self) -> Result<&Arc<Snapshot>, HistoryError> {
        self.entries.back().ok_or(HistoryError::EmptyHistory)
    }

    fn oldest(&self) -> Result<&Arc<Snapshot>, HistoryError> {
        self.entries.front().ok_or(HistoryError::EmptyHistory)
    }

    // Retained ids are contiguous, so the offset from the oldest id is the index.
    fn by_id(&self, id: u64) -> Result<&Arc<Snapshot>, HistoryError> {
        let oldest_id = self.oldest()?.id;
        let offset = id
            .checked_sub(oldest_id)
            .ok_or(HistoryError::OutOfRange(id))?;
        if offset > HISTORY_CAPACITY as u64 {
            return Err(HistoryError::OutOfRange(id));
        }
        self.entries
            .get(offset as usize)
            .ok_or(HistoryError::NotPopulated(id))
    }
}

pub struct SnapshotHistory {
    ring: RwLock<Ring>,
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self {
            ring: RwLock::new(Ring {
                entries: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
                next_id: 0,
            }),
        }
    }

    /// Records one poll and returns its id. Every call consumes an id, failed polls included.
    pub async fn append(&self, outcome: PollOutcome) -> u64 {
        let mut ring = self.ring.write().await;
        let id = ring.next_id;
        ring.next_id += 1;
        ring.entries.push_back(Arc::new(Snapshot {
            id,
            captured_at: Utc::now(),
            outcome,
        }));
        if ring.entries.len() > HISTORY_CAPACITY {
            ring.entries.pop_front();
        }
        id
    }

    pub async fn newest(&self) -> Result<Arc<Snapshot>, HistoryError> {
        self.ring.read().await.newest().cloned()
    }

    pub async fn oldest(&self) -> Result<Arc<Snapshot>, HistoryError> {
        self.ring.read().await.oldest().cloned()
    }

    pub async fn by_id(&self, id: u64) -> Result<Arc<Snapshot>, HistoryError> {
        self.ring.read().await.by_id(id).cloned()
    }

    /// Smallest retained id, i.e. the lower pagination bound.
    pub async fn minimum_id(&self) -> Result<u64, HistoryError> {
        Ok(self.ring.read().await.oldest()?.id)
    }

    pub async fn len(&self) -> usize {
        self.ring.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ring.read().await.entries.is_empty()
    }

    /// Resolves a page request and the current minimum id under a single read lock.
    pub async fn page(&self, request: PageRequest) -> Result<HistoryPage, HistoryError> {
        let ring = self.ring.read().await;
        let minimum_id = ring.oldest()?.id;
        let snapshot = match request {
            PageRequest::Newest => ring.newest()?,
            PageRequest::Oldest => ring.oldest()?,
            PageRequest::Id(id) => ring.by_id(id)?,
        };
        Ok(HistoryPage {
            snapshot: snapshot.clone(),
            minimum_id,
        })
    }

    /// Most recent avatar descriptor seen for `friend_code`, searching newest polls first.
    pub async fn avatar_descriptor_for(&self, friend_code: &str) -> Option<String> {
        let ring = self.ring.read().await;
        ring.entries
            .iter()
            .rev()
            .filter_map(|s| s.rooms())
            .flat_map(|rooms| rooms.iter())
            .flat_map(|room| room.players.values())
            .find(|p| p.friend_code == friend_code && p.avatar_descriptor().is_some())
            .and_then(|p| p.avatar_descriptor().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_parses_query_values() {
        assert_eq!(PageRequest::from_query(None), Ok(PageRequest::Newest));
        assert_eq!(PageRequest::from_query(Some("min")), Ok(PageRequest::Oldest));
        assert_eq!(PageRequest::from_query(Some("oldest")), Ok(PageRequest::Oldest));
        assert_eq!(PageRequest::from_query(Some("42")), Ok(PageRequest::Id(42)));
        assert!(matches!(
            PageRequest::from_query(Some("abc")),
            Err(HistoryError::MalformedId(_))
        ));
        assert!(matches!(
            PageRequest::from_query(Some("-1")),
            Err(HistoryError::MalformedId(_))
        ));
    }

    #[tokio::test]
    async fn empty_history_reports_empty() {
        let history = SnapshotHistory::new();
        assert_eq!(history.newest().await.unwrap_err(), HistoryError::EmptyHistory);
        assert_eq!(history.oldest().await.unwrap_err(), HistoryError::EmptyHistory);
        assert_eq!(history.minimum_id().await.unwrap_err(), HistoryError::EmptyHistory);
        assert_eq!(history.by_id(0).await.unwrap_err(), HistoryError::EmptyHistory);
        assert!(history.is_empty().await);
    }

    #[tokio::test]
    async fn single_entry_is_both_newest_and_oldest() {
        let history = SnapshotHistory::new();
        history.append(PollOutcome::NoData).await;
        assert_eq!(history.newest().await.unwrap().id, 0);
        assert_eq!(history.oldest().await.unwrap().id, 0);
        let page = history.page(PageRequest::Oldest).await.unwrap();
        assert_eq!(page.snapshot.id, 0);
        assert_eq!(page.minimum_id, 0);
    }

    #[tokio::test]
    async fn ids_past_newest_are_not_populated() {
        let history = SnapshotHistory::new();
        history.append(PollOutcome::NoData).await;
        assert_eq!(history.by_id(1).await.unwrap_err(), HistoryError::NotPopulated(1));
        assert_eq!(
            history.by_id(HISTORY_CAPACITY as u64).await.unwrap_err(),
            HistoryError::NotPopulated(HISTORY_CAPACITY as u64)
        );
        assert_eq!(
            history.by_id(HISTORY_CAPACITY as u64 + 1).await.unwrap_err(),
            HistoryError::OutOfRange(HISTORY_CAPACITY as u64 + 1)
        );
    }
}
