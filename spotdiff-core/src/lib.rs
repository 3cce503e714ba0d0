use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod config;
pub mod index;
pub mod level;
pub mod mutate;
pub mod notify;
pub mod publish;
pub mod storage;

pub use config::{Config, StorageConfig, WorkerConfig};
pub use level::{Level, LevelAssets, LevelMetadata};
pub use mutate::{Difference, DifferenceKind, DifferenceSettings};
pub use storage::{LevelStore, LocalStore, S3Store};

/// Public base written into `levels.json` when levels are kept on local
/// disk and no `PUBLIC_URL_BASE` is configured.
pub const DEFAULT_LOCAL_PUBLIC_BASE: &str = "/generated_levels";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    pub seed: u64,
    pub min_differences: usize,
    pub max_differences: usize,
    /// Upload to the configured S3-compatible store instead of `output_path`.
    pub publish: bool,
    /// Report each stored level to the worker endpoint.
    pub notify: bool,
    /// Overrides the id derived from the file name. Single-image runs only.
    pub level_id: Option<String>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("image is too small ({width}x{height}); both sides must be at least {min} px", min = mutate::MIN_IMAGE_SIDE)]
    ImageTooSmall { width: u32, height: u32 },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("worker notification failed: {0}")]
    Notify(String),
}

pub type Result<T> = std::result::Result<T, LevelError>;

/// Outcome of a run: ids of the levels that were stored and how many
/// source images were skipped because of an error.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stored: Vec<String>,
    pub failed: usize,
}

impl RunSettings {
    pub fn difference_settings(&self) -> DifferenceSettings {
        DifferenceSettings {
            min_differences: self.min_differences,
            max_differences: self.max_differences,
        }
    }
}

/// Level ids become object keys and local paths, so they must stay a
/// single path segment.
fn validate_level_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(LevelError::Config(format!(
            "level id '{id}' must be a single name without '/', '\\' or '..'"
        )));
    }
    Ok(())
}

fn validate_settings(settings: &RunSettings) -> Result<()> {
    settings.difference_settings().validate()?;
    if let Some(id) = settings.level_id.as_deref() {
        validate_level_id(id)?;
    }
    if !settings.input_path.exists() {
        return Err(LevelError::Config(format!(
            "Input path does not exist: {}",
            settings.input_path.display()
        )));
    }
    if settings.level_id.is_some() && settings.input_path.is_dir() {
        return Err(LevelError::Config(
            "a level id override only applies to a single input image".to_string(),
        ));
    }
    Ok(())
}

fn open_store(settings: &RunSettings, config: &Config) -> Result<Box<dyn LevelStore>> {
    if settings.publish {
        let storage = config.storage.as_ref().ok_or_else(|| {
            LevelError::Config(
                "publishing needs S3_ENDPOINT_URL, S3_ACCESS_KEY_ID, S3_SECRET_ACCESS_KEY and S3_BUCKET"
                    .to_string(),
            )
        })?;
        let public_base = match config.public_url_base.as_deref() {
            Some(base) => base.to_string(),
            None => {
                warn!("PUBLIC_URL_BASE is not set; levels.json will hold bucket-relative keys");
                String::new()
            }
        };
        Ok(Box::new(S3Store::new(storage, public_base)?))
    } else {
        let public_base = config
            .public_url_base
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_PUBLIC_BASE.to_string());
        Ok(Box::new(LocalStore::new(&settings.output_path, public_base)))
    }
}

fn process_image(
    store: &dyn LevelStore,
    worker: Option<&WorkerConfig>,
    path: &Path,
    level_id: &str,
    settings: &RunSettings,
) -> Result<Level> {
    let stem = level::file_stem(path)?;
    let name = level::display_name_from_stem(&stem);
    let differences = settings.difference_settings();

    let assets = level::build_level(path, level_id, &name, settings.seed, &differences)?;
    let entry = publish::publish_level(store, &assets)?;
    info!(
        "stored level '{}' ({} differences) from {}",
        entry.id,
        entry.differences.len(),
        path.display()
    );

    if let Some(worker) = worker {
        // The level is already stored; a failed notification only means the
        // worker's key-value index lags behind.
        match notify::notify_worker(worker, &entry.id) {
            Ok(()) => info!("worker notified about level '{}'", entry.id),
            Err(err) => warn!("level '{}': {err}", entry.id),
        }
    }

    Ok(entry)
}

pub fn run(settings: RunSettings, config: &Config) -> Result<RunSummary> {
    validate_settings(&settings)?;

    let worker = if settings.notify {
        Some(config.worker.as_ref().ok_or_else(|| {
            LevelError::Config("notifying needs WORKER_URL and WORKER_API_KEY".to_string())
        })?)
    } else {
        None
    };

    let store = open_store(&settings, config)?;
    info!("writing levels to {} (seed {})", store.describe(), settings.seed);

    let mut summary = RunSummary::default();

    if settings.input_path.is_file() {
        let level_id = match settings.level_id.as_deref() {
            Some(id) => id.to_string(),
            None => level::level_id_from_stem(&level::file_stem(&settings.input_path)?),
        };
        let entry = process_image(
            store.as_ref(),
            worker,
            &settings.input_path,
            &level_id,
            &settings,
        )?;
        summary.stored.push(entry.id);
        return Ok(summary);
    }

    let sources = level::discover_source_images(&settings.input_path)?;
    if sources.is_empty() {
        warn!(
            "no png/jpg images found in {}",
            settings.input_path.display()
        );
        return Ok(summary);
    }
    info!("found {} images to process", sources.len());

    for path in &sources {
        let outcome = level::file_stem(path).and_then(|stem| {
            let level_id = level::level_id_from_stem(&stem);
            process_image(store.as_ref(), worker, path, &level_id, &settings)
        });
        match outcome {
            Ok(entry) => summary.stored.push(entry.id),
            Err(err) => {
                error!("could not process {}: {err}", path.display());
                summary.failed += 1;
            }
        }
    }

    info!(
        "generated {} levels ({} failed)",
        summary.stored.len(),
        summary.failed
    );
    Ok(summary)
}
