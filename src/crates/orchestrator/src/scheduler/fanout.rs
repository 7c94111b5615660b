//! Fan-out derivation: turning a `plan` Checkpoint's chapter/scene layout
//! into concrete `write`/`polish` instance indices.

use crate::db::models::Checkpoint;

/// Derive the `write[ch,s]` fan-out indices from the `plan` phase's output.
/// Returns `compose_scene_index(chapter, scene)` for every scene in every
/// chapter, in chapter-then-scene order.
pub fn derive_write_indices(plan_checkpoint: &Checkpoint) -> Result<Vec<i64>, String> {
    let payload: serde_json::Value = serde_json::from_str(&plan_checkpoint.payload)
        .map_err(|e| format!("corrupt plan checkpoint: {e}"))?;

    let chapters = payload
        .get("chapters")
        .and_then(|c| c.as_array())
        .ok_or("plan payload missing chapters array")?;

    let mut indices = Vec::new();
    for (chapter_idx, chapter) in chapters.iter().enumerate() {
        let scenes = chapter
            .get("scenes")
            .and_then(|s| s.as_array())
            .ok_or_else(|| format!("chapter {chapter_idx} missing scenes array"))?;
        for scene_idx in 0..scenes.len() {
            indices.push(Checkpoint::compose_scene_index(chapter_idx as i64, scene_idx as i64));
        }
    }
    Ok(indices)
}

/// `polish` fans out over exactly the same indices as `write` — it is
/// deps-gated on `write` at the same index (see SPEC_FULL.md 4.D note 2).
pub fn derive_polish_indices(plan_checkpoint: &Checkpoint) -> Result<Vec<i64>, String> {
    derive_write_indices(plan_checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_checkpoint(chapters: serde_json::Value) -> Checkpoint {
        Checkpoint::new("job-1", "plan", 0, json!({"chapters": chapters}).to_string(), "fp")
    }

    #[test]
    fn test_derive_write_indices_multi_chapter() {
        let chapters = json!([
            {"title": "One", "scenes": [{"summary": "a"}, {"summary": "b"}]},
            {"title": "Two", "scenes": [{"summary": "c"}]},
        ]);
        let cp = plan_checkpoint(chapters);
        let indices = derive_write_indices(&cp).unwrap();
        assert_eq!(
            indices,
            vec![
                Checkpoint::compose_scene_index(0, 0),
                Checkpoint::compose_scene_index(0, 1),
                Checkpoint::compose_scene_index(1, 0),
            ]
        );
    }

    #[test]
    fn test_derive_write_indices_missing_chapters_errors() {
        let cp = Checkpoint::new("job-1", "plan", 0, "{}".to_string(), "fp");
        assert!(derive_write_indices(&cp).is_err());
    }
}
