use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use easel_core::assets::{AssetRef, Bucket};
use easel_core::error::CoreError;
use easel_core::events::{JobOutputs, ProgressEvent};
use easel_core::executor::{validate_structure, GraphExecutor, Validation};
use easel_core::graph::{Graph, NodeId};
use easel_core::types::JobId;
use easel_store::AssetStore;

/// Steps reported per sampler-like node.
const SAMPLER_STEPS: u32 = 4;

/// In-process stand-in for the real engine.
///
/// Walks the graph node by node, emitting the same event sequence a
/// real run produces, and materializes one output image per requested
/// terminal node by re-encoding the job's source image. Used for local
/// development and as the integration-test engine.
pub struct SimulatedExecutor {
    store: Arc<AssetStore>,
}

impl SimulatedExecutor {
    pub fn new(store: Arc<AssetStore>) -> Self {
        Self { store }
    }

    /// The first image referenced by the graph, or a flat placeholder
    /// when the graph loads nothing.
    async fn source_bytes(&self, graph: &Graph) -> Vec<u8> {
        for node in graph.nodes.values() {
            let Some(name) = node.inputs.get("image").and_then(|v| v.as_str()) else {
                continue;
            };
            let asset = AssetRef::new(Bucket::Input, "", name);
            match self.store.load(&asset).await {
                Ok(bytes) => return bytes,
                Err(e) => {
                    tracing::debug!(asset = %asset.display_path(), error = %e, "Source image unavailable");
                }
            }
        }
        placeholder_png()
    }
}

#[async_trait]
impl GraphExecutor for SimulatedExecutor {
    async fn validate(&self, graph: &Graph) -> Validation {
        validate_structure(graph)
    }

    async fn execute(
        &self,
        job_id: JobId,
        graph: &Graph,
        outputs_to_execute: &[NodeId],
        events: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<JobOutputs, CoreError> {
        for (node_id, node) in &graph.nodes {
            if cancel.is_cancelled() {
                return Err(CoreError::Internal("execution interrupted".to_string()));
            }
            let _ = events
                .send(ProgressEvent::Executing {
                    job_id,
                    node: Some(node_id.clone()),
                })
                .await;

            // Sampler nodes are the long-running ones; report steps.
            if node.class_type.contains("Sampler") {
                for step in 1..=SAMPLER_STEPS {
                    if cancel.is_cancelled() {
                        return Err(CoreError::Internal("execution interrupted".to_string()));
                    }
                    let _ = events
                        .send(ProgressEvent::Progress {
                            job_id,
                            value: step,
                            max: SAMPLER_STEPS,
                            node: Some(node_id.clone()),
                        })
                        .await;
                    tokio::task::yield_now().await;
                }
            }
        }

        let source = self.source_bytes(graph).await;
        let short_id = job_id.as_simple().to_string();
        let mut images = Vec::new();
        for (idx, _node_id) in outputs_to_execute.iter().enumerate() {
            let filename = format!("easel_{}_{idx:05}_.png", &short_id[..8]);
            let asset = self
                .store
                .store(Bucket::Output, "", &filename, &source, false)
                .await?;
            images.push(asset);
        }
        Ok(JobOutputs { images })
    }
}

/// A small flat PNG for graphs that reference no stored image.
fn placeholder_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(64, 64, image::Rgba([40, 40, 40, 255]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap_or_else(|e| unreachable!("PNG encode of constant image cannot fail: {e}"));
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_store::StoreRoots;
    use serde_json::json;

    async fn executor() -> (tempfile::TempDir, SimulatedExecutor) {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(StoreRoots {
            input: dir.path().join("input"),
            output: dir.path().join("output"),
            temp: dir.path().join("temp"),
        })
        .await
        .unwrap();
        (dir, SimulatedExecutor::new(Arc::new(store)))
    }

    fn sampler_graph() -> Graph {
        serde_json::from_value(json!({
            "1": {"class_type": "LoadImage", "inputs": {"image": "missing.png"}},
            "2": {"class_type": "KSampler", "inputs": {"latent": ["1", 0], "seed": 3}},
            "3": {"class_type": "SaveImage", "inputs": {"images": ["2", 0]}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn emits_executing_and_progress_then_produces_outputs() {
        let (_dir, exec) = executor().await;
        let graph = sampler_graph();
        let job_id = uuid::Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(64);

        let outputs = exec
            .execute(job_id, &graph, &["3".into()], tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outputs.images.len(), 1);
        assert_eq!(outputs.images[0].bucket, Bucket::Output);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(match event {
                ProgressEvent::Executing { .. } => "executing",
                ProgressEvent::Progress { .. } => "progress",
                other => panic!("unexpected event {other:?}"),
            });
        }
        assert_eq!(kinds.iter().filter(|k| **k == "executing").count(), 3);
        assert_eq!(
            kinds.iter().filter(|k| **k == "progress").count(),
            SAMPLER_STEPS as usize
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_execution() {
        let (_dir, exec) = executor().await;
        let graph = sampler_graph();
        let (tx, _rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = exec
            .execute(uuid::Uuid::new_v4(), &graph, &["3".into()], tx, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[tokio::test]
    async fn validate_delegates_to_structural_checks() {
        let (_dir, exec) = executor().await;
        let v = exec.validate(&sampler_graph()).await;
        assert!(v.ok);
        assert_eq!(v.outputs_to_execute, vec!["3".to_string()]);

        assert!(!exec.validate(&Graph::default()).await.ok);
    }
}
