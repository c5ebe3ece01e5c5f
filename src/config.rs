//! On-disk configuration shapes and their defaults.

/// Root configuration persisted to `coverscout.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Scan behavior preferences.
    pub scan: ScanConfig,
    #[serde(default)]
    /// Cover search provider settings.
    pub search: SearchConfig,
    #[serde(default)]
    /// Network timeouts and download limits.
    pub network: NetworkConfig,
}

/// Scan behavior preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize, Default)]
pub struct ScanConfig {
    /// Music folder used when the command line does not name one.
    #[serde(default)]
    pub music_folder: String,
}

/// Cover search provider settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SearchConfig {
    /// Album search endpoint queried for cover candidates.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// Maximum number of candidates offered per album.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: u32,
}

/// Network timeouts and download limits.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u32,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u32,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u32,
    /// Upper bound on a single cover download.
    #[serde(default = "default_download_max_size_mb")]
    pub download_max_size_mb: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            download_max_size_mb: default_download_max_size_mb(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://api.deezer.com/search/album".to_string()
}

fn default_max_candidates() -> u32 {
    4
}

fn default_connect_timeout_secs() -> u32 {
    5
}

fn default_read_timeout_secs() -> u32 {
    20
}

fn default_write_timeout_secs() -> u32 {
    10
}

fn default_download_max_size_mb() -> u32 {
    20
}
