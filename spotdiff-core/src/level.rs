use image::codecs::png::PngEncoder;
use log::debug;
use image::{ColorType, ImageEncoder, RgbaImage};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::mutate::{apply_random_differences, Difference, DifferenceSettings};
use crate::{LevelError, Result};

const SOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Entry of the shared `levels.json` index read by the game frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: String,
    pub name: String,
    pub original: String,
    pub modified: String,
    pub differences: Vec<Difference>,
}

/// Per-level `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelMetadata {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub created_at: String,
    pub differences: Vec<Difference>,
}

/// Everything produced for one level, ready to be stored.
#[derive(Debug, Clone)]
pub struct LevelAssets {
    pub metadata: LevelMetadata,
    pub original_png: Vec<u8>,
    pub modified_png: Vec<u8>,
}

pub(crate) fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            LevelError::Config(format!("cannot derive a level name from {}", path.display()))
        })
}

pub fn level_id_from_stem(stem: &str) -> String {
    stem.replace(' ', "_").to_lowercase()
}

pub fn display_name_from_stem(stem: &str) -> String {
    stem.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted so batch runs are reproducible.
pub fn discover_source_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| LevelError::Io(e.into()))?;
        if entry.file_type().is_file() && has_source_extension(entry.path()) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

pub fn load_source_image(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(buf)
}

fn fnv1a(text: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// RNG seed for one level; independent of the other images in a batch.
pub fn level_seed(seed: u64, level_id: &str) -> u64 {
    seed ^ fnv1a(level_id)
}

pub fn build_level(
    path: &Path,
    level_id: &str,
    name: &str,
    seed: u64,
    settings: &DifferenceSettings,
) -> Result<LevelAssets> {
    let original = load_source_image(path)?;
    let mut modified = original.clone();

    let mut rng = StdRng::seed_from_u64(level_seed(seed, level_id));
    let differences = apply_random_differences(&mut modified, &mut rng, settings)?;
    debug!(
        "level '{}': {} differences on {}x{} image",
        level_id,
        differences.len(),
        original.width(),
        original.height()
    );

    Ok(LevelAssets {
        metadata: LevelMetadata {
            id: level_id.to_string(),
            name: name.to_string(),
            width: original.width(),
            height: original.height(),
            seed,
            created_at: chrono::Utc::now().to_rfc3339(),
            differences,
        },
        original_png: encode_png(&original)?,
        modified_png: encode_png(&modified)?,
    })
}
