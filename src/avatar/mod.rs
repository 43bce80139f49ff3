// Avatar resolution: cache lookup, single-flight upstream rendering, batch fan-out.
//
// Concurrent requests for the same friend code share one pending OnceCell from `in_flight`,
// so at most one conversion/render pair per key is outstanding. A successful image is written
// to the cache before its in-flight entry is removed; a caller that misses the in-flight map
// while holding its lock will therefore find the image in the cache. Failures are never cached.

mod cache;
mod render;

pub use cache::AvatarImage;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};

use crate::history::SnapshotHistory;
use cache::AvatarCache;
use render::Renderer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvatarError {
    #[error("avatar descriptor is not valid base64: {0}")]
    InvalidDescriptor(String),
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
    #[error("render fetch failed: {0}")]
    RenderFetchFailed(String),
    #[error("friend code {0} was not found or does not have an associated Mii")]
    UnknownFriendCode(String),
}

type Pending = Arc<OnceCell<Result<AvatarImage, AvatarError>>>;

/// Upstream endpoints used by the render pipeline.
#[derive(Debug, Clone)]
pub struct AvatarEndpoints {
    /// Conversion service accepting the multipart descriptor upload.
    pub studio_url: String,
    /// Image endpoint the conversion token is embedded into.
    pub render_url: String,
}

pub struct AvatarResolver {
    renderer: Renderer,
    cache: AvatarCache,
    in_flight: Mutex<HashMap<String, Pending>>,
}

impl AvatarResolver {
    pub fn new(endpoints: AvatarEndpoints, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            renderer: Renderer {
                http,
                studio_url: endpoints.studio_url,
                render_url: endpoints.render_url,
            },
            cache: AvatarCache::new(),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub async fn cached(&self, friend_code: &str) -> Option<AvatarImage> {
        self.cache.get(friend_code).await
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.len().await
    }

    /// Cached image for `friend_code`, or render `descriptor` and cache the result on success.
    pub async fn resolve(
        &self,
        friend_code: &str,
        descriptor: &str,
    ) -> Result<AvatarImage, AvatarError> {
        if let Some(image) = self.cache.get(friend_code).await {
            return Ok(image);
        }

        let pending = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(image) = self.cache.get(friend_code).await {
                return Ok(image);
            }
            in_flight
                .entry(friend_code.to_string())
                .or_default()
                .clone()
        };

        let outcome = pending
            .get_or_init(|| async {
                let outcome = self.renderer.render(descriptor).await;
                match &outcome {
                    Ok(image) => self.cache.insert(friend_code, image.clone()).await,
                    Err(e) => tracing::warn!(
                        friend_code,
                        error = %e,
                        operation = "resolve_avatar",
                        "Unable to get mii"
                    ),
                }
                outcome
            })
            .await
            .clone();

        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .get(friend_code)
            .is_some_and(|p| Arc::ptr_eq(p, &pending))
        {
            in_flight.remove(friend_code);
        }
        outcome
    }

    /// Serves cached entries directly and resolves every miss concurrently.
    /// A failed resolution maps to `None`; it never aborts the rest of the batch.
    pub async fn resolve_many(
        &self,
        requests: HashMap<String, String>,
    ) -> HashMap<String, Option<AvatarImage>> {
        let mut resolved = HashMap::with_capacity(requests.len());
        let mut misses = Vec::new();
        for (friend_code, descriptor) in requests {
            match self.cache.get(&friend_code).await {
                Some(image) => {
                    resolved.insert(friend_code, Some(image));
                }
                None => misses.push((friend_code, descriptor)),
            }
        }

        tracing::debug!(
            operation = "resolve_many",
            hits = resolved.len(),
            misses = misses.len(),
            "avatar batch"
        );

        let results = join_all(
            misses
                .iter()
                .map(|(friend_code, descriptor)| self.resolve(friend_code, descriptor)),
        )
        .await;
        for ((friend_code, _), result) in misses.into_iter().zip(results) {
            resolved.insert(friend_code, result.ok());
        }
        resolved
    }

    /// Resolves a friend code using the newest descriptor found in retained history.
    pub async fn resolve_known(
        &self,
        friend_code: &str,
        history: &SnapshotHistory,
    ) -> Result<AvatarImage, AvatarError> {
        if let Some(image) = self.cache.get(friend_code).await {
            return Ok(image);
        }
        let descriptor = history
            .avatar_descriptor_for(friend_code)
            .await
            .ok_or_else(|| AvatarError::UnknownFriendCode(friend_code.to_string()))?;
        self.resolve(friend_code, &descriptor).await
    }
}
