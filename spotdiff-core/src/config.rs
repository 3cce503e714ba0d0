//! Settings read once from the environment and passed down explicitly.

use crate::{LevelError, Result};

pub const ENV_S3_ENDPOINT_URL: &str = "S3_ENDPOINT_URL";
pub const ENV_S3_ACCESS_KEY_ID: &str = "S3_ACCESS_KEY_ID";
pub const ENV_S3_SECRET_ACCESS_KEY: &str = "S3_SECRET_ACCESS_KEY";
pub const ENV_S3_BUCKET: &str = "S3_BUCKET";
pub const ENV_S3_REGION: &str = "S3_REGION";
pub const ENV_PUBLIC_URL_BASE: &str = "PUBLIC_URL_BASE";
pub const ENV_WORKER_URL: &str = "WORKER_URL";
pub const ENV_WORKER_API_KEY: &str = "WORKER_API_KEY";

const DEFAULT_REGION: &str = "auto";

/// S3-compatible object store (AWS, Cloudflare R2, MinIO, ...).
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub url: String,
    pub api_key: String,
}

impl std::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub storage: Option<StorageConfig>,
    pub worker: Option<WorkerConfig>,
    pub public_url_base: Option<String>,
}

/// Collects a group of variables that must be set together. `Ok(None)` when
/// none of them is set.
fn all_or_none<F>(lookup: &F, names: &[&str]) -> Result<Option<Vec<String>>>
where
    F: Fn(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = names.iter().map(|name| lookup(name)).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    let missing: Vec<&str> = names
        .iter()
        .zip(&values)
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(LevelError::Config(format!(
            "incomplete configuration, missing {}",
            missing.join(", ")
        )));
    }
    Ok(Some(values.into_iter().flatten().collect()))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let storage = all_or_none(
            &lookup,
            &[
                ENV_S3_ENDPOINT_URL,
                ENV_S3_ACCESS_KEY_ID,
                ENV_S3_SECRET_ACCESS_KEY,
                ENV_S3_BUCKET,
            ],
        )?
        .map(|values| {
            let [endpoint_url, access_key_id, secret_access_key, bucket]: [String; 4] =
                values.try_into().unwrap_or_default();
            StorageConfig {
                endpoint_url,
                access_key_id,
                secret_access_key,
                bucket,
                region: lookup(ENV_S3_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            }
        });

        let worker = all_or_none(&lookup, &[ENV_WORKER_URL, ENV_WORKER_API_KEY])?.map(|values| {
            let [url, api_key]: [String; 2] = values.try_into().unwrap_or_default();
            WorkerConfig { url, api_key }
        });

        Ok(Self {
            storage,
            worker,
            public_url_base: lookup(ENV_PUBLIC_URL_BASE),
        })
    }
}
