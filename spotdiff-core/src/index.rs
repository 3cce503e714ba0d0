//! The shared `levels.json` document: a flat JSON array of [`Level`]s.
//!
//! Updates are a plain read-modify-write; two runs updating the same index
//! at once can lose one another's entries.

use crate::level::Level;
use crate::Result;

pub fn parse_index(bytes: &[u8]) -> Result<Vec<Level>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Replaces the entry with the same id in place, or appends. Returns `true`
/// when an existing entry was replaced.
pub fn upsert_level(levels: &mut Vec<Level>, level: Level) -> bool {
    match levels.iter_mut().find(|existing| existing.id == level.id) {
        Some(existing) => {
            *existing = level;
            true
        }
        None => {
            levels.push(level);
            false
        }
    }
}

pub fn render_index(levels: &[Level]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(levels)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(id: &str, original: &str) -> Level {
        Level {
            id: id.to_string(),
            name: id.to_string(),
            original: original.to_string(),
            modified: format!("{original}-modified"),
            differences: Vec::new(),
        }
    }

    #[test]
    fn empty_documents_are_empty_indexes() {
        assert!(parse_index(b"").unwrap().is_empty());
        assert!(parse_index(b"  \n").unwrap().is_empty());
        assert!(parse_index(b"[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_index_is_an_error() {
        assert!(parse_index(b"{\"id\": 1}").is_err());
    }

    #[test]
    fn upsert_replaces_by_id_and_keeps_order() {
        let mut levels = vec![level("a", "a1"), level("b", "b1")];

        assert!(!upsert_level(&mut levels, level("c", "c1")));
        assert!(upsert_level(&mut levels, level("a", "a2")));

        let ids: Vec<&str> = levels.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(levels[0].original, "a2");
    }

    #[test]
    fn parses_frontend_schema() {
        let doc = br#"[{"id":"park","name":"Park","original":"/generated_levels/park_original.png",
            "modified":"/generated_levels/park_modified.png",
            "differences":[{"type":"removal","x":120,"y":80,"radius":22,"details":"A small detail was removed."},
                           {"type":"add_shape","x":40,"y":50,"radius":9}]}]"#;
        let levels = parse_index(doc).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].differences.len(), 2);
        assert_eq!(levels[0].differences[1].details, "");
    }
}
