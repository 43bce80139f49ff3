// Positive-only avatar cache: entries live for the process lifetime and are never refreshed

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use tokio::sync::RwLock;

/// Rendered avatar: raw PNG bytes plus the base64 text sent to JSON clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarImage {
    png: Bytes,
    encoded: Arc<str>,
}

impl AvatarImage {
    pub fn from_png(png: Bytes) -> Self {
        let encoded = STANDARD.encode(&png).into();
        Self { png, encoded }
    }

    pub fn png(&self) -> Bytes {
        self.png.clone()
    }

    pub fn as_base64(&self) -> &str {
        &self.encoded
    }
}

impl Serialize for AvatarImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded)
    }
}

#[derive(Default)]
pub struct AvatarCache {
    entries: RwLock<HashMap<String, AvatarImage>>,
}

impl AvatarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, friend_code: &str) -> Option<AvatarImage> {
        self.entries.read().await.get(friend_code).cloned()
    }

    /// Last writer wins; values for one friend code are expected to be equivalent.
    pub async fn insert(&self, friend_code: &str, image: AvatarImage) {
        self.entries
            .write()
            .await
            .insert(friend_code.to_string(), image);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
