// Poll results and their read-time JSON view

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::room::{Room, RoomKind, Visibility};

/// Outcome of one poll of the listing API.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Rooms(Vec<Room>),
    /// Upstream answered successfully but with no data (`null` body).
    NoData,
    Failed(String),
}

impl PollOutcome {
    pub fn rooms(&self) -> Option<&[Room]> {
        match self {
            PollOutcome::Rooms(rooms) => Some(rooms),
            _ => None,
        }
    }

    pub fn status(&self) -> SnapshotStatus {
        match self {
            PollOutcome::Rooms(_) => SnapshotStatus::Ok,
            PollOutcome::NoData => SnapshotStatus::NoData,
            PollOutcome::Failed(_) => SnapshotStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Ok,
    NoData,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: u64,
    pub captured_at: DateTime<Utc>,
    pub outcome: PollOutcome,
}

impl Snapshot {
    pub fn rooms(&self) -> Option<&[Room]> {
        self.outcome.rooms()
    }
}

/// Room annotated with values computed at read time.
#[derive(Debug, Serialize)]
pub struct RoomView<'a> {
    #[serde(flatten)]
    pub room: &'a Room,
    #[serde(rename = "averageVR")]
    pub average_skill_rating: Option<i64>,
    pub kind: RoomKind,
    pub visibility: Visibility,
    #[serde(rename = "playerCount")]
    pub player_count: usize,
    pub joinable: bool,
    #[serde(rename = "uptimeSecs")]
    pub uptime_secs: Option<i64>,
}

impl<'a> RoomView<'a> {
    pub fn new(room: &'a Room, captured_at: DateTime<Utc>) -> Self {
        Self {
            room,
            average_skill_rating: room.average_skill_rating(),
            kind: room.kind(),
            visibility: room.visibility(),
            player_count: room.player_count(),
            joinable: room.joinable(),
            uptime_secs: room.uptime_secs(captured_at),
        }
    }
}

/// One page of history as served to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView<'a> {
    pub id: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub status: SnapshotStatus,
    pub rooms: Option<Vec<RoomView<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    pub room_count: Option<usize>,
    pub player_count: Option<usize>,
    /// Existing clients page from this exact key.
    #[serde(rename = "minimum_id")]
    pub minimum_id: u64,
}

impl<'a> SnapshotView<'a> {
    pub fn new(snapshot: &'a Snapshot, minimum_id: u64) -> Self {
        let rooms = snapshot.rooms().map(|rooms| {
            rooms
                .iter()
                .map(|r| RoomView::new(r, snapshot.captured_at))
                .collect::<Vec<_>>()
        });
        let room_count = rooms.as_ref().map(Vec::len);
        let player_count = rooms
            .as_ref()
            .map(|rooms| rooms.iter().map(|r| r.player_count).sum());
        let error = match &snapshot.outcome {
            PollOutcome::Failed(reason) => Some(reason.as_str()),
            _ => None,
        };
        Self {
            id: snapshot.id,
            timestamp: snapshot.captured_at,
            status: snapshot.outcome.status(),
            rooms,
            error,
            room_count,
            player_count,
            minimum_id,
        }
    }
}
