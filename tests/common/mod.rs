// Shared test helpers: listing fixtures and mocked avatar services

#![allow(dead_code)]

use std::time::Duration;

use roomwatch::avatar::{AvatarEndpoints, AvatarResolver};
use roomwatch::models::Room;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STUDIO_PATH: &str = "/cgi-bin/studio.cgi";
pub const RENDER_PATH: &str = "/miis/image.png";

/// Valid base64 standing in for a Mii data blob.
pub const DESCRIPTOR: &str = "AAECAwQFBgc=";
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

pub fn groups_json() -> Value {
    json!([
        {
            "id": "ROOM1",
            "type": "anybody",
            "rk": "vs_10",
            "created": "2024-05-01T12:00:00Z",
            "players": {
                "0": {
                    "fc": "1111-2222-3333",
                    "name": "p0",
                    "ev": "10",
                    "eb": "5000",
                    "openhost": "true",
                    "mii": [{ "data": DESCRIPTOR, "name": "Mario" }]
                },
                "1": { "fc": "4444-5555-6666", "name": "b", "ev": 20, "openhost": "false" },
                "2": { "fc": "7777-8888-9999", "name": "c", "openhost": "false" }
            }
        },
        {
            "id": "ROOM2",
            "type": "private",
            "rk": "vs_11",
            "created": "2024-05-01T12:05:00Z",
            "players": {}
        }
    ])
}

pub fn rooms() -> Vec<Room> {
    serde_json::from_value(groups_json()).unwrap()
}

pub fn resolver_for(server: &MockServer) -> AvatarResolver {
    AvatarResolver::new(
        AvatarEndpoints {
            studio_url: format!("{}{}", server.uri(), STUDIO_PATH),
            render_url: format!("{}{}", server.uri(), RENDER_PATH),
        },
        Duration::from_secs(5),
    )
    .unwrap()
}

/// Resolver whose upstreams are unreachable; for tests that must not hit the network.
pub fn offline_resolver() -> AvatarResolver {
    AvatarResolver::new(
        AvatarEndpoints {
            studio_url: "http://127.0.0.1:9/studio".into(),
            render_url: "http://127.0.0.1:9/render".into(),
        },
        Duration::from_millis(200),
    )
    .unwrap()
}

/// Conversion returns `token`, render returns `png` for that token.
pub async fn mount_avatar_services(server: &MockServer, token: &str, png: &[u8]) {
    Mock::given(method("POST"))
        .and(path(STUDIO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "mii": token })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(RENDER_PATH))
        .and(query_param("data", token))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png.to_vec()))
        .mount(server)
        .await;
}

pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
