//! Catalog document parsing and name resolution.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use easel_core::error::CoreError;
use easel_core::graph::{Graph, NodeId};

use crate::kind::{SlotOverrides, StyleKind};

// ---------------------------------------------------------------------------
// Document shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GroupDoc {
    name: String,
    style: String,
    #[serde(default)]
    slots: Option<SlotOverrides>,
    items: Vec<ItemDoc>,
}

#[derive(Debug, Deserialize)]
struct ItemDoc {
    name: String,
    thumbnail: String,
    /// Reference image path as written into graph image inputs.
    image: String,
    /// Workflow template file, relative to the catalog document.
    workflow: String,
    #[serde(default)]
    slots: Option<SlotOverrides>,
    /// Node whose `text` input receives the free-text prompt, if the
    /// template supports one.
    #[serde(default)]
    prompt_slot: Option<NodeId>,
}

// ---------------------------------------------------------------------------
// Resolved catalog
// ---------------------------------------------------------------------------

/// A fully resolved style: everything materialization needs.
#[derive(Debug, Clone)]
pub struct StyleTemplate {
    pub name: String,
    pub kind: StyleKind,
    /// Reference image value substituted into reference/style slots.
    pub reference_image: String,
    /// Thumbnail file, relative to the catalog document's directory.
    pub thumbnail: PathBuf,
    /// Parsed graph template. Read-only at request time; materialize
    /// works on a copy.
    pub graph: Graph,
    pub prompt_slot: Option<NodeId>,
}

/// An ordered group of styles sharing one kind.
#[derive(Debug, Clone)]
pub struct StyleGroup {
    pub name: String,
    pub kind_name: &'static str,
    pub items: Vec<StyleTemplate>,
}

/// The loaded catalog. Read-only between reloads.
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    groups: Vec<StyleGroup>,
    base_dir: PathBuf,
}

impl StyleCatalog {
    /// Parse the catalog document at `path`.
    ///
    /// Workflow and thumbnail paths inside the document are resolved
    /// relative to the document's directory. A malformed document or an
    /// unreadable workflow file fails the whole load; a catalog without
    /// a single style is also rejected since resolution needs a
    /// default.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Template(format!("cannot read style catalog {}: {e}", path.display()))
        })?;
        let docs: Vec<GroupDoc> = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Template(format!("malformed style catalog: {e}")))?;

        let mut groups = Vec::with_capacity(docs.len());
        for doc in docs {
            let group_slots = doc.slots.unwrap_or_default();
            let mut items = Vec::with_capacity(doc.items.len());
            for item in doc.items {
                let kind = match &item.slots {
                    Some(slots) => StyleKind::from_doc(&doc.style, slots)?,
                    None => StyleKind::from_doc(&doc.style, &group_slots)?,
                };
                let workflow_path = base_dir.join(&item.workflow);
                let graph = load_workflow(&workflow_path)?;
                items.push(StyleTemplate {
                    name: item.name,
                    kind,
                    reference_image: item.image,
                    thumbnail: PathBuf::from(item.thumbnail),
                    graph,
                    prompt_slot: item.prompt_slot,
                });
            }
            groups.push(StyleGroup {
                name: doc.name,
                kind_name: StyleKind::from_doc(&doc.style, &group_slots)?.name(),
                items,
            });
        }

        let catalog = Self { groups, base_dir };
        if catalog.default().is_none() {
            return Err(CoreError::Template(
                "style catalog contains no styles".to_string(),
            ));
        }
        tracing::info!(
            groups = catalog.groups.len(),
            styles = catalog.groups.iter().map(|g| g.items.len()).sum::<usize>(),
            "Style catalog loaded",
        );
        Ok(catalog)
    }

    pub fn groups(&self) -> &[StyleGroup] {
        &self.groups
    }

    /// Directory the catalog document lives in; thumbnail paths are
    /// relative to it.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The designated fallback: the first item of the first non-empty
    /// group.
    pub fn default(&self) -> Option<&StyleTemplate> {
        self.groups.iter().flat_map(|g| g.items.iter()).next()
    }

    /// Find a style by name, falling back to the default when absent.
    ///
    /// The fallback is deliberate and non-fatal: an unknown or empty
    /// style name still produces an image.
    pub fn resolve(&self, name: &str) -> &StyleTemplate {
        if let Some(found) = self
            .groups
            .iter()
            .flat_map(|g| g.items.iter())
            .find(|t| t.name == name)
        {
            return found;
        }
        let fallback = self.default().expect("catalog is never loaded empty");
        tracing::warn!(
            requested = name,
            fallback = %fallback.name,
            "Unknown style requested, using default",
        );
        fallback
    }
}

fn load_workflow(path: &Path) -> Result<Graph, CoreError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Template(format!("cannot read workflow {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| CoreError::Template(format!("malformed workflow {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    pub(crate) fn write_fixture_catalog(dir: &Path) -> PathBuf {
        let workflow = serde_json::json!({
            "2": {"class_type": "LoadImage", "inputs": {"image": "placeholder.png"}},
            "3": {"class_type": "LoadImage", "inputs": {"image": "placeholder.png"}}
        });
        std::fs::write(dir.join("swap.json"), workflow.to_string()).unwrap();

        let painting = serde_json::json!({
            "3": {"class_type": "KSampler", "inputs": {"seed": 0}},
            "12": {"class_type": "LoadImage", "inputs": {"image": "placeholder.png"}},
            "30": {"class_type": "LoadImage", "inputs": {"image": "placeholder.png"}}
        });
        std::fs::write(dir.join("painting.json"), painting.to_string()).unwrap();

        let config = serde_json::json!([
            {
                "name": "Portraits",
                "style": "style-image-swap",
                "items": [
                    {"name": "renaissance", "thumbnail": "thumbs/renaissance.png",
                     "image": "styles/renaissance.png", "workflow": "swap.json"}
                ]
            },
            {
                "name": "Paintings",
                "style": "seed-randomized-painting",
                "items": [
                    {"name": "impasto", "thumbnail": "thumbs/impasto.png",
                     "image": "styles/impasto.png", "workflow": "painting.json"}
                ]
            }
        ]);
        let path = dir.join("styles_config.json");
        std::fs::write(&path, config.to_string()).unwrap();
        path
    }

    #[test]
    fn loads_groups_in_document_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture_catalog(dir.path());
        let catalog = StyleCatalog::load(&path).unwrap();

        let names: Vec<_> = catalog.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["Portraits", "Paintings"]);
        assert_eq!(catalog.groups()[0].kind_name, "style-image-swap");
    }

    #[test]
    fn resolve_finds_styles_across_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture_catalog(dir.path());
        let catalog = StyleCatalog::load(&path).unwrap();

        assert_eq!(catalog.resolve("impasto").name, "impasto");
    }

    #[test]
    fn resolve_unknown_name_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture_catalog(dir.path());
        let catalog = StyleCatalog::load(&path).unwrap();

        assert_eq!(catalog.resolve("nonexistent-style").name, "renaissance");
        assert_eq!(catalog.resolve("").name, "renaissance");
    }

    #[test]
    fn malformed_document_is_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles_config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_matches!(StyleCatalog::load(&path), Err(CoreError::Template(_)));
    }

    #[test]
    fn missing_workflow_file_is_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = serde_json::json!([
            {"name": "G", "style": "scene-swap", "items": [
                {"name": "s", "thumbnail": "t.png", "image": "i.png", "workflow": "absent.json"}
            ]}
        ]);
        let path = dir.path().join("styles_config.json");
        std::fs::write(&path, config.to_string()).unwrap();
        assert_matches!(StyleCatalog::load(&path), Err(CoreError::Template(_)));
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles_config.json");
        std::fs::write(&path, "[]").unwrap();
        assert_matches!(StyleCatalog::load(&path), Err(CoreError::Template(_)));
    }
}
