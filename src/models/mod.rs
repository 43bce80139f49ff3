// Domain models: listing rooms/players and recorded polls

mod room;
mod snapshot;

pub use room::{MiiEntry, OpenHost, Player, ROOM_PLAYER_LIMIT, Room, RoomKind, Visibility};
pub use snapshot::{PollOutcome, RoomView, Snapshot, SnapshotStatus, SnapshotView};
