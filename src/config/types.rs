//! The effective configuration value: one struct, loaded once from TOML,
//! with `serde(default)` on every field so a partial (or absent) config
//! file still produces a usable `Config`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vaultcast_blob::AccountConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub segments: SegmentConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default = "default_hardware_accel")]
    pub hardware_accel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            segments: SegmentConfig::default(),
            cache: CacheConfig::default(),
            upload: UploadConfig::default(),
            accounts: Vec::new(),
            database: DatabaseConfig::default(),
            hardware_accel: default_hardware_accel(),
        }
    }
}

fn default_hardware_accel() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub local_host: String,

    #[serde(default = "default_port")]
    pub local_port: u16,

    /// If set, absolute playlist URLs are built against this domain instead
    /// of the local bind address.
    #[serde(default)]
    pub public_domain: Option<String>,

    #[serde(default)]
    pub force_https: bool,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            local_host: default_host(),
            local_port: default_port(),
            public_domain: None,
            force_https: false,
            auth: AuthConfig::default(),
        }
    }
}

/// Single-operator-key admin auth, gating only `/api/*` mutation routes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmentConfig {
    #[serde(default = "default_max_segment_bytes")]
    pub max_segment_bytes: u64,

    #[serde(default = "default_min_segment_duration")]
    pub min_segment_duration: f64,

    #[serde(default = "default_max_segment_duration")]
    pub max_segment_duration: f64,

    /// Wall-clock budget for the planner's duration search, in seconds.
    #[serde(default = "default_plan_time_budget_secs")]
    pub plan_time_budget_secs: u64,
}

fn default_max_segment_bytes() -> u64 {
    15 * 1024 * 1024
}
fn default_min_segment_duration() -> f64 {
    2.0
}
fn default_max_segment_duration() -> f64 {
    30.0
}
fn default_plan_time_budget_secs() -> u64 {
    60
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: default_max_segment_bytes(),
            min_segment_duration: default_min_segment_duration(),
            max_segment_duration: default_max_segment_duration(),
            plan_time_budget_secs: default_plan_time_budget_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Memory,
    Disk,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_type")]
    pub cache_type: CacheType,

    #[serde(default = "default_cache_size")]
    pub cache_size: u64,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,

    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_preload_segments")]
    pub preload_segments: u32,

    #[serde(default = "default_max_concurrent_preloads")]
    pub max_concurrent_preloads: u32,
}

fn default_cache_type() -> CacheType {
    CacheType::Memory
}
fn default_cache_size() -> u64 {
    512 * 1024 * 1024
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_preload_segments() -> u32 {
    6
}
fn default_max_concurrent_preloads() -> u32 {
    4
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: default_cache_type(),
            cache_size: default_cache_size(),
            cache_ttl: default_cache_ttl(),
            cache_dir: None,
            preload_segments: default_preload_segments(),
            max_concurrent_preloads: default_max_concurrent_preloads(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: u32,

    #[serde(default = "default_upload_retries")]
    pub upload_retries: u32,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_upload_concurrency() -> u32 {
    6
}
fn default_upload_retries() -> u32 {
    3
}
fn default_requests_per_second() -> u32 {
    4
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_concurrency: default_upload_concurrency(),
            upload_retries: default_upload_retries(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("vaultcast.sqlite")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}
