//! Cover Subsystem (compound phase)
//!
//! Looks like one phase to the Scheduler but is internally a state
//! machine: `concept -> generate -> qualityCheck -> {retry with variation |
//! compose} -> composed`. Failure after the attempt cap is not fatal to
//! the Job — `cover_status` records `failed` and the pipeline continues.

pub mod slop;

use crate::executor::providers::{ImageGenerator, ObjectStore, VisionInspector};

#[derive(Debug, Clone)]
pub enum CoverResult {
    Composed { image_reference: String, attempts: u32 },
    Failed { attempts: u32 },
}

/// Deterministic prompt variation derived from the attempt number: a
/// rotating color palette index and a growing scale hint, so repeated
/// rejections don't converge on the same rejected composition.
fn variation_for_attempt(attempt: u32) -> (u32, f32) {
    let palette_index = attempt % slop::SLOP_PATTERNS.len() as u32;
    let scale_hint = 1.0 + attempt as f32 * 0.1;
    (palette_index, scale_hint)
}

fn seed_for_attempt(attempt: u32) -> u64 {
    let (palette, _) = variation_for_attempt(attempt);
    (attempt as u64) << 8 | palette as u64
}

/// Quality gate: rejects text/letters/digits in the render, known slop
/// patterns, and a degenerate (empty) subject render.
fn passes_quality_gate(bytes: &[u8], has_text: bool, slop_patterns: &[String]) -> bool {
    !has_text && slop_patterns.is_empty() && !bytes.is_empty()
}

pub async fn run_cover(
    base_prompt: &str,
    image: &dyn ImageGenerator,
    vision: &dyn VisionInspector,
    objects: &dyn ObjectStore,
    object_key: &str,
    max_attempts: u32,
) -> Result<CoverResult, String> {
    for attempt in 0..max_attempts {
        let (palette, scale) = variation_for_attempt(attempt);
        let prompt = if attempt == 0 {
            base_prompt.to_string()
        } else {
            format!("{base_prompt} -- palette {palette}, scale {scale:.1}")
        };

        let generation = image.generate(&prompt, seed_for_attempt(attempt)).await?;
        let inspection = vision.inspect(&generation.bytes).await?;

        if passes_quality_gate(&generation.bytes, inspection.has_text, &inspection.slop_patterns) {
            let location = objects.put(object_key, generation.bytes).await?;
            return Ok(CoverResult::Composed { image_reference: location, attempts: attempt + 1 });
        }
    }
    Ok(CoverResult::Failed { attempts: max_attempts })
}
