//! Snapshot source backed by the Unciv multiplayer file server.
//!
//! The server stores two files per game: the full save at
//! `{server}/files/{game_id}` and a lightweight preview at
//! `{server}/files/{game_id}_Preview`. The preview carries the turn counter
//! and current player but no map, cities or civilizations, so it is polled
//! for change detection and the full save is pulled only at a turn
//! boundary. Both bodies are base64 text wrapping a gzip stream of JSON.

use std::io::Read as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use tracing::debug;
use turnwatch_core::{FetchError, Snapshot, SnapshotSource};

/// Longest error body kept in a [`FetchError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Fetches game files over HTTP.
pub struct GameServerSource {
    client: reqwest::Client,
    preview_url: String,
    save_url: String,
}

impl GameServerSource {
    /// Create a source for `game_id` on `server_url`.
    pub fn new(client: reqwest::Client, server_url: &str, game_id: &str) -> Self {
        Self {
            client,
            preview_url: format!("{server_url}/files/{game_id}_Preview"),
            save_url: format!("{server_url}/files/{game_id}"),
        }
    }

    /// The preview URL polled every cycle.
    pub fn preview_url(&self) -> &str {
        &self.preview_url
    }

    /// The full save URL fetched at turn boundaries.
    pub fn save_url(&self) -> &str {
        &self.save_url
    }

    async fn get(&self, url: &str) -> Result<Snapshot, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Http(e.without_url().to_string()))?;
        let snapshot = decode_game_file(&body)?;
        debug!(
            url,
            bytes = body.len(),
            turn = snapshot.turn(),
            player = snapshot.current_player(),
            "game file fetched"
        );
        Ok(snapshot)
    }
}

impl SnapshotSource for GameServerSource {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        self.get(&self.preview_url).await
    }

    async fn fetch_full(&self, preview: Snapshot) -> Result<Snapshot, FetchError> {
        let full = self.get(&self.save_url).await?;
        if full.turn() != preview.turn() {
            debug!(
                preview_turn = preview.turn(),
                save_turn = full.turn(),
                "save moved on since the preview"
            );
        }
        Ok(full)
    }
}

/// Decode a game file body: base64, then gzip, then JSON.
pub fn decode_game_file(body: &[u8]) -> Result<Snapshot, FetchError> {
    let compressed = STANDARD
        .decode(body.trim_ascii())
        .map_err(|e| FetchError::Decode(format!("base64: {e}")))?;

    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| FetchError::Decode(format!("gzip: {e}")))?;

    let document: serde_json::Value =
        serde_json::from_slice(&json).map_err(|e| FetchError::Decode(format!("json: {e}")))?;

    Ok(Snapshot::from_value(document)?)
}
