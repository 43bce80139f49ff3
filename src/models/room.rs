// Rooms and players as delivered by the listing API

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Rooms at this size cannot be joined.
pub const ROOM_PLAYER_LIMIT: usize = 12;

/// Session category derived from the opaque `rk` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomKind {
    Versus,
    TimeTrial,
    Other,
}

impl RoomKind {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("vs_10") | Some("vs_751") => RoomKind::Versus,
            Some("vs_11") => RoomKind::TimeTrial,
            _ => RoomKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Boolean carried as the string "true"/"false" on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenHost(pub bool);

impl Serialize for OpenHost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if self.0 { "true" } else { "false" })
    }
}

impl<'de> Deserialize<'de> for OpenHost {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => OpenHost(b),
            Value::String(s) => OpenHost(s == "true"),
            _ => OpenHost(false),
        })
    }
}

/// Missing and `null` both decode to the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Accepts a JSON number or a numeric string; anything else counts as undefined.
fn lenient_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiiEntry {
    pub data: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "fc")]
    pub friend_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(
        rename = "ev",
        default,
        deserialize_with = "lenient_rating",
        skip_serializing_if = "Option::is_none"
    )]
    pub skill_rating: Option<i64>,
    #[serde(
        rename = "eb",
        default,
        deserialize_with = "lenient_rating",
        skip_serializing_if = "Option::is_none"
    )]
    pub battle_rating: Option<i64>,
    #[serde(rename = "openhost", default)]
    pub open_host: OpenHost,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub mii: Vec<MiiEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Player {
    /// Opaque payload that can be exchanged for a rendered avatar.
    pub fn avatar_descriptor(&self) -> Option<&str> {
        self.mii
            .first()
            .map(|m| m.data.as_str())
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    /// Raw access code; "anybody" means public.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub access: String,
    #[serde(rename = "rk", default, skip_serializing_if = "Option::is_none")]
    pub kind_code: Option<String>,
    #[serde(rename = "created", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Player slot -> player.
    #[serde(default, deserialize_with = "null_as_default")]
    pub players: BTreeMap<String, Player>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Room {
    pub fn kind(&self) -> RoomKind {
        RoomKind::from_code(self.kind_code.as_deref())
    }

    pub fn visibility(&self) -> Visibility {
        if self.access == "anybody" {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn joinable(&self) -> bool {
        self.players.len() < ROOM_PLAYER_LIMIT
    }

    /// Mean skill rating over players that report one, rounded to the nearest integer.
    /// Players without a rating count toward neither the sum nor the divisor.
    pub fn average_skill_rating(&self) -> Option<i64> {
        // upstream ratings can sit near i64::MAX
        let (sum, count) = self
            .players
            .values()
            .filter_map(|p| p.skill_rating)
            .fold((0i128, 0i128), |(sum, count), r| (sum + i128::from(r), count + 1));
        if count == 0 {
            return None;
        }
        Some((sum as f64 / count as f64).round() as i64)
    }

    /// Seconds the room had been open at `at`.
    pub fn uptime_secs(&self, at: DateTime<Utc>) -> Option<i64> {
        self.created_at.map(|c| (at - c).num_seconds().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player(fc: &str, ev: Value) -> Value {
        json!({ "fc": fc, "name": "p", "ev": ev, "openhost": "false" })
    }

    fn room_with(players: Vec<Value>) -> Room {
        let players: Map<String, Value> = players
            .into_iter()
            .enumerate()
            .map(|(i, p)| (i.to_string(), p))
            .collect();
        serde_json::from_value(json!({ "id": "r1", "type": "anybody", "rk": "vs_10", "players": players }))
            .unwrap()
    }

    #[test]
    fn average_excludes_players_without_rating() {
        let room = room_with(vec![player("a", json!(10)), player("b", json!(20)), player("c", Value::Null)]);
        assert_eq!(room.average_skill_rating(), Some(15));
    }

    #[test]
    fn average_is_none_for_empty_room() {
        let room = room_with(vec![]);
        assert_eq!(room.average_skill_rating(), None);
    }

    #[test]
    fn average_is_none_when_nobody_has_rating() {
        let room = room_with(vec![json!({ "fc": "a" }), json!({ "fc": "b" })]);
        assert_eq!(room.average_skill_rating(), None);
    }

    #[test]
    fn average_rounds_to_nearest() {
        let room = room_with(vec![player("a", json!(5000)), player("b", json!("5003"))]);
        // 5001.5 rounds up
        assert_eq!(room.average_skill_rating(), Some(5002));
    }

    #[test]
    fn kind_and_visibility_derive_from_codes() {
        let mut room = room_with(vec![]);
        assert_eq!(room.kind(), RoomKind::Versus);
        assert_eq!(room.visibility(), Visibility::Public);
        room.kind_code = Some("vs_11".into());
        room.access = "private".into();
        assert_eq!(room.kind(), RoomKind::TimeTrial);
        assert_eq!(room.visibility(), Visibility::Private);
        room.kind_code = None;
        assert_eq!(room.kind(), RoomKind::Other);
    }

    #[test]
    fn open_host_serializes_as_string() {
        let p: Player = serde_json::from_value(json!({ "fc": "a", "openhost": true })).unwrap();
        assert_eq!(p.open_host, OpenHost(true));
        let out = serde_json::to_value(&p).unwrap();
        assert_eq!(out["openhost"], json!("true"));
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let p: Player =
            serde_json::from_value(json!({ "fc": "a", "pid": "123", "count": "1" })).unwrap();
        let out = serde_json::to_value(&p).unwrap();
        assert_eq!(out["pid"], json!("123"));
        assert_eq!(out["count"], json!("1"));
    }

    #[test]
    fn avatar_descriptor_is_first_mii_entry() {
        let p: Player = serde_json::from_value(json!({
            "fc": "a",
            "name": "fallback",
            "mii": [{ "data": "AAAA", "name": "Mario" }]
        }))
        .unwrap();
        assert_eq!(p.avatar_descriptor(), Some("AAAA"));

        let bare: Player = serde_json::from_value(json!({ "fc": "b", "name": "bare" })).unwrap();
        assert_eq!(bare.avatar_descriptor(), None);
    }

    #[test]
    fn null_collections_decode_as_empty() {
        let room: Room = serde_json::from_value(json!({
            "id": "r1",
            "type": null,
            "players": null
        }))
        .unwrap();
        assert!(room.players.is_empty());
        assert_eq!(room.access, "");
        assert_eq!(room.average_skill_rating(), None);

        let p: Player =
            serde_json::from_value(json!({ "fc": "a", "name": null, "mii": null })).unwrap();
        assert!(p.mii.is_empty());
        assert_eq!(p.name, "");
        assert_eq!(p.avatar_descriptor(), None);
    }

    #[test]
    fn average_of_huge_ratings_does_not_overflow() {
        let room = room_with(vec![player("a", json!("9e18")), player("b", json!("9e18"))]);
        assert_eq!(room.average_skill_rating(), Some(9_000_000_000_000_000_000));
    }
}
