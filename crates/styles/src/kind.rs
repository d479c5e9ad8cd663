//! The three fixed style kinds and their slot sets.
//!
//! A slot is the id of a template node whose input gets replaced at
//! materialization time: image slots take an `image` input, seed slots
//! a `seed` input. Slot ids default to the catalog's conventional node
//! numbering and can be overridden per group or per item.

use serde::{Deserialize, Serialize};

use easel_core::error::CoreError;
use easel_core::graph::NodeId;

/// Optional slot overrides as written in the catalog document.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SlotOverrides {
    pub style_slot: Option<NodeId>,
    pub content_slot: Option<NodeId>,
    pub image_slots: Option<Vec<NodeId>>,
    pub reference_slot: Option<NodeId>,
    pub seed_slot: Option<NodeId>,
}

/// How an uploaded image is substituted into a graph template.
///
/// Each variant carries exactly the slots its substitution rule needs,
/// resolved once at catalog load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StyleKind {
    /// The reference asset is the style input, the upload the content
    /// input.
    StyleImageSwap {
        style_slot: NodeId,
        content_slot: NodeId,
    },

    /// The upload fills every image slot; a fresh random seed goes
    /// into the seed slot.
    SeedRandomizedPainting {
        image_slots: Vec<NodeId>,
        seed_slot: NodeId,
    },

    /// Reference asset and upload fill distinct slots; a fresh random
    /// seed goes into the seed slot.
    SceneSwap {
        reference_slot: NodeId,
        content_slot: NodeId,
        seed_slot: NodeId,
    },
}

impl StyleKind {
    /// Wire name as used in the catalog document.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StyleImageSwap { .. } => "style-image-swap",
            Self::SeedRandomizedPainting { .. } => "seed-randomized-painting",
            Self::SceneSwap { .. } => "scene-swap",
        }
    }

    /// Build a kind from its wire name plus optional slot overrides.
    pub(crate) fn from_doc(name: &str, slots: &SlotOverrides) -> Result<Self, CoreError> {
        match name {
            "style-image-swap" => Ok(Self::StyleImageSwap {
                style_slot: slots.style_slot.clone().unwrap_or_else(|| "2".into()),
                content_slot: slots.content_slot.clone().unwrap_or_else(|| "3".into()),
            }),
            "seed-randomized-painting" => Ok(Self::SeedRandomizedPainting {
                image_slots: slots
                    .image_slots
                    .clone()
                    .unwrap_or_else(|| vec!["12".into(), "30".into()]),
                seed_slot: slots.seed_slot.clone().unwrap_or_else(|| "3".into()),
            }),
            "scene-swap" => Ok(Self::SceneSwap {
                reference_slot: slots.reference_slot.clone().unwrap_or_else(|| "12".into()),
                content_slot: slots.content_slot.clone().unwrap_or_else(|| "30".into()),
                seed_slot: slots.seed_slot.clone().unwrap_or_else(|| "3".into()),
            }),
            other => Err(CoreError::Template(format!(
                "Unknown style kind '{other}'. Must be one of: \
                 style-image-swap, seed-randomized-painting, scene-swap"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn kinds_parse_with_default_slots() {
        let k = StyleKind::from_doc("style-image-swap", &SlotOverrides::default()).unwrap();
        assert_eq!(
            k,
            StyleKind::StyleImageSwap {
                style_slot: "2".into(),
                content_slot: "3".into()
            }
        );

        let k = StyleKind::from_doc("seed-randomized-painting", &SlotOverrides::default()).unwrap();
        assert_matches!(k, StyleKind::SeedRandomizedPainting { .. });

        let k = StyleKind::from_doc("scene-swap", &SlotOverrides::default()).unwrap();
        assert_matches!(k, StyleKind::SceneSwap { .. });
    }

    #[test]
    fn slot_overrides_win_over_defaults() {
        let slots = SlotOverrides {
            seed_slot: Some("99".into()),
            ..Default::default()
        };
        let k = StyleKind::from_doc("scene-swap", &slots).unwrap();
        assert_matches!(k, StyleKind::SceneSwap { seed_slot, .. } if seed_slot == "99");
    }

    #[test]
    fn unknown_kind_is_template_error() {
        let err = StyleKind::from_doc("oil-painting", &SlotOverrides::default()).unwrap_err();
        assert_matches!(err, CoreError::Template(_));
    }
}
