use log::info;

use crate::index::{parse_index, render_index, upsert_level};
use crate::level::{Level, LevelAssets};
use crate::storage::LevelStore;
use crate::Result;

pub const INDEX_KEY: &str = "levels.json";

const PNG: &str = "image/png";
const JSON: &str = "application/json";

pub fn original_key(level_id: &str) -> String {
    format!("levels/{level_id}/original.png")
}

pub fn modified_key(level_id: &str) -> String {
    format!("levels/{level_id}/modified.png")
}

pub fn metadata_key(level_id: &str) -> String {
    format!("levels/{level_id}/metadata.json")
}

/// Uploads the level's objects, then records it in `levels.json`.
///
/// The first failed upload aborts; objects already written stay behind.
pub fn publish_level(store: &dyn LevelStore, assets: &LevelAssets) -> Result<Level> {
    let id = assets.metadata.id.as_str();

    store.put(&original_key(id), &assets.original_png, PNG)?;
    store.put(&modified_key(id), &assets.modified_png, PNG)?;
    store.put(
        &metadata_key(id),
        &serde_json::to_vec_pretty(&assets.metadata)?,
        JSON,
    )?;

    let entry = Level {
        id: id.to_string(),
        name: assets.metadata.name.clone(),
        original: store.public_url(&original_key(id)),
        modified: store.public_url(&modified_key(id)),
        differences: assets.metadata.differences.clone(),
    };

    let mut levels = match store.get(INDEX_KEY)? {
        Some(bytes) => parse_index(&bytes)?,
        None => Vec::new(),
    };
    if upsert_level(&mut levels, entry.clone()) {
        info!("replaced existing index entry for level '{id}'");
    }
    store.put(INDEX_KEY, &render_index(&levels)?, JSON)?;

    Ok(entry)
}
