// Two chained upstream calls: descriptor -> studio token (conversion), token -> PNG (render)

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::instrument;

use super::{AvatarError, AvatarImage};

/// Fixed render parameters; only `data` varies per request.
const RENDER_PARAMS: &[(&str, &str)] = &[
    ("type", "face"),
    ("expression", "normal"),
    ("width", "270"),
    ("bgColor", "FFFFFF00"),
    ("clothesColor", "default"),
    ("cameraXRotate", "0"),
    ("cameraYRotate", "0"),
    ("cameraZRotate", "0"),
    ("characterXRotate", "0"),
    ("characterYRotate", "0"),
    ("characterZRotate", "0"),
    ("lightDirectionMode", "none"),
    ("instanceCount", "1"),
    ("instanceRotationMode", "model"),
];

#[derive(Debug, Deserialize)]
struct ConversionResponse {
    #[serde(default)]
    mii: Option<String>,
}

pub(super) fn decode_descriptor(descriptor: &str) -> Result<Vec<u8>, AvatarError> {
    STANDARD
        .decode(descriptor.trim())
        .map_err(|e| AvatarError::InvalidDescriptor(e.to_string()))
}

pub(super) fn render_url(base: &str, token: &str) -> Result<Url, AvatarError> {
    let params = std::iter::once(("data", token)).chain(RENDER_PARAMS.iter().copied());
    Url::parse_with_params(base, params)
        .map_err(|e| AvatarError::RenderFetchFailed(format!("bad render url: {e}")))
}

pub(super) struct Renderer {
    pub(super) http: reqwest::Client,
    pub(super) studio_url: String,
    pub(super) render_url: String,
}

impl Renderer {
    /// Full pipeline for one descriptor. Does not touch the cache.
    pub(super) async fn render(&self, descriptor: &str) -> Result<AvatarImage, AvatarError> {
        let data = decode_descriptor(descriptor)?;
        let token = self.convert(data).await?;
        self.fetch_image(&token).await
    }

    #[instrument(skip(self, data), fields(client = "studio", operation = "convert", bytes = data.len()))]
    async fn convert(&self, data: Vec<u8>) -> Result<String, AvatarError> {
        let part = Part::bytes(data)
            .file_name("mii.dat")
            .mime_str("application/octet-stream")
            .map_err(|e| AvatarError::ConversionFailed(e.to_string()))?;
        let form = Form::new().part("data", part).text("platform", "wii");

        let response = self
            .http
            .post(&self.studio_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AvatarError::ConversionFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AvatarError::ConversionFailed(format!("status {status}")));
        }
        let body: ConversionResponse = response
            .json()
            .await
            .map_err(|e| AvatarError::ConversionFailed(format!("malformed response: {e}")))?;
        body.mii
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AvatarError::ConversionFailed("response has no mii token".into()))
    }

    #[instrument(skip(self, token), fields(client = "render", operation = "fetch_image"))]
    async fn fetch_image(&self, token: &str) -> Result<AvatarImage, AvatarError> {
        let url = render_url(&self.render_url, token)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AvatarError::RenderFetchFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AvatarError::RenderFetchFailed(format!("status {status}")));
        }
        let png = response
            .bytes()
            .await
            .map_err(|e| AvatarError::RenderFetchFailed(e.to_string()))?;
        if png.is_empty() {
            return Err(AvatarError::RenderFetchFailed("empty image body".into()));
        }
        Ok(AvatarImage::from_png(png))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_url_embeds_token_with_fixed_params() {
        let url = render_url("https://studio.example/miis/image.png", "abc123").unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(query[0], ("data".to_string(), "abc123".to_string()));
        assert!(query.contains(&("type".to_string(), "face".to_string())));
        assert!(query.contains(&("width".to_string(), "270".to_string())));
        assert!(query.contains(&("instanceRotationMode".to_string(), "model".to_string())));
        assert_eq!(query.len(), RENDER_PARAMS.len() + 1);
        assert_eq!(url.path(), "/miis/image.png");
    }

    #[test]
    fn render_url_is_deterministic() {
        let a = render_url("https://studio.example/miis/image.png", "tok").unwrap();
        let b = render_url("https://studio.example/miis/image.png", "tok").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decode_rejects_non_base64() {
        assert!(matches!(
            decode_descriptor("not base64!!"),
            Err(AvatarError::InvalidDescriptor(_))
        ));
        assert_eq!(decode_descriptor("AAEC").unwrap(), vec![0u8, 1, 2]);
    }
}
