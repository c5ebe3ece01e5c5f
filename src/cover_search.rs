//! Blocking client for the album cover search provider.

use std::io::Read;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::config::{NetworkConfig, SearchConfig};
use crate::protocol::CoverCandidate;

/// Issues album searches and cover downloads over one reusable agent.
pub struct CoverSearchClient {
    http_client: ureq::Agent,
    endpoint: String,
    download_max_bytes: u64,
}

impl CoverSearchClient {
    pub fn new(search: &SearchConfig, network: &NetworkConfig) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(u64::from(network.connect_timeout_secs)))
            .timeout_read(Duration::from_secs(u64::from(network.read_timeout_secs)))
            .timeout_write(Duration::from_secs(u64::from(network.write_timeout_secs)))
            .build();

        Self {
            http_client,
            endpoint: search.endpoint.clone(),
            download_max_bytes: u64::from(network.download_max_size_mb.max(1)) * 1024 * 1024,
        }
    }

    fn search_request_url(&self, artist: &str, album: &str) -> String {
        let query = format!("{artist} {album}");
        let mut url = String::with_capacity(self.endpoint.len() + query.len() + 8);
        url.push_str(&self.endpoint);
        url.push_str("?q=");
        url.push_str(urlencoding::encode(&query).as_ref());
        url
    }

    fn http_get_json(&self, url: &str) -> Result<Value, String> {
        let response = self
            .http_client
            .get(url)
            .set("Accept", "application/json")
            .call()
            .map_err(|error| format!("Request failed: {error}"))?;
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|error| format!("Failed to read response: {error}"))?;
        serde_json::from_str(&body).map_err(|error| format!("Invalid JSON response: {error}"))
    }

    /// Queries the provider for an album's cover candidates.
    pub fn search_album_covers(
        &self,
        artist: &str,
        album: &str,
        max_results: usize,
    ) -> Result<Vec<CoverCandidate>, String> {
        let url = self.search_request_url(artist, album);
        debug!("Cover search request: {url}");
        let payload = self.http_get_json(&url)?;
        Ok(extract_cover_candidates(&payload, max_results))
    }

    /// Downloads one candidate image, bounded by the configured size cap.
    pub fn download_cover(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .http_client
            .get(url)
            .call()
            .map_err(|error| format!("Request failed: {error}"))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(self.download_max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|error| format!("Failed to read image data: {error}"))?;

        if bytes.is_empty() {
            return Err("Empty response body".to_string());
        }
        if bytes.len() as u64 > self.download_max_bytes {
            return Err(format!(
                "Image larger than the {} MiB download limit",
                self.download_max_bytes / (1024 * 1024)
            ));
        }
        Ok(bytes)
    }
}

/// Pulls up to `max_results` candidates out of a search response.
/// Entries without a usable image URL are skipped rather than failing
/// the whole response.
pub fn extract_cover_candidates(payload: &Value, max_results: usize) -> Vec<CoverCandidate> {
    let mut out = Vec::new();
    let Some(entries) = payload["data"].as_array() else {
        return out;
    };

    for entry in entries {
        if out.len() >= max_results {
            break;
        }
        let url = entry["cover_big"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        if url.is_empty() {
            continue;
        }
        let album_title = entry["title"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        let artist_name = entry["artist"]["name"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        out.push(CoverCandidate {
            url,
            album_title,
            artist_name,
        });
    }
    out
}
