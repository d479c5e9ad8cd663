//! Turning a style template plus an upload into a runnable graph.

use rand::Rng;
use serde_json::json;

use easel_core::error::CoreError;
use easel_core::graph::Graph;

use crate::catalog::StyleTemplate;
use crate::kind::StyleKind;

/// Seeds are drawn from the engine's accepted range.
const SEED_MIN: i64 = 1;
const SEED_MAX: i64 = 1_125_899_906_842_600;

/// Produce a runnable graph from `template` for one uploaded image.
///
/// The template graph is cloned and mutated per the template's kind:
/// the upload lands in content/image slots, the style's reference image
/// in style/reference slots, and seed slots get a fresh random seed.
/// When the template names a prompt slot and the caller supplied a
/// prompt, it is written to that node's `text` input.
///
/// A slot id that names no node in the template is a template error,
/// surfaced at submission rather than mid-execution.
pub fn materialize(
    template: &StyleTemplate,
    upload_name: &str,
    prompt: Option<&str>,
) -> Result<Graph, CoreError> {
    let mut graph = template.graph.clone();

    match &template.kind {
        StyleKind::StyleImageSwap {
            style_slot,
            content_slot,
        } => {
            graph.set_input(style_slot, "image", json!(template.reference_image))?;
            graph.set_input(content_slot, "image", json!(upload_name))?;
        }
        StyleKind::SeedRandomizedPainting {
            image_slots,
            seed_slot,
        } => {
            for slot in image_slots {
                graph.set_input(slot, "image", json!(upload_name))?;
            }
            graph.set_input(seed_slot, "seed", json!(fresh_seed()))?;
        }
        StyleKind::SceneSwap {
            reference_slot,
            content_slot,
            seed_slot,
        } => {
            graph.set_input(reference_slot, "image", json!(template.reference_image))?;
            graph.set_input(content_slot, "image", json!(upload_name))?;
            graph.set_input(seed_slot, "seed", json!(fresh_seed()))?;
        }
    }

    if let (Some(slot), Some(text)) = (&template.prompt_slot, prompt) {
        graph.set_input(slot, "text", json!(text))?;
    }

    Ok(graph)
}

fn fresh_seed() -> i64 {
    rand::rng().random_range(SEED_MIN..=SEED_MAX)
}
