//! Bucket roots, path containment, and asset read/write/remove.

use std::path::{Component, Path, PathBuf};

use easel_core::assets::{AssetRef, Bucket};
use easel_core::error::CoreError;

// ---------------------------------------------------------------------------
// Roots
// ---------------------------------------------------------------------------

/// The three on-disk directories assets may live under.
#[derive(Debug, Clone)]
pub struct StoreRoots {
    pub input: PathBuf,
    pub output: PathBuf,
    pub temp: PathBuf,
}

impl StoreRoots {
    pub fn root_for(&self, bucket: Bucket) -> &Path {
        match bucket {
            Bucket::Input => &self.input,
            Bucket::Output => &self.output,
            Bucket::Temp => &self.temp,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Filesystem-backed asset store sandboxed to its bucket roots.
#[derive(Debug, Clone)]
pub struct AssetStore {
    roots: StoreRoots,
}

impl AssetStore {
    /// Open a store over `roots`, creating the directories if needed.
    pub async fn open(roots: StoreRoots) -> Result<Self, CoreError> {
        for bucket in [Bucket::Input, Bucket::Output, Bucket::Temp] {
            tokio::fs::create_dir_all(roots.root_for(bucket)).await?;
        }
        Ok(Self { roots })
    }

    /// Resolve an asset reference to its on-disk path.
    ///
    /// Rejects before touching the filesystem: parent-dir and root
    /// components anywhere in the subfolder, and filenames that are not
    /// a single path component.
    pub fn resolve(&self, asset: &AssetRef) -> Result<PathBuf, CoreError> {
        let root = self.roots.root_for(asset.bucket);
        let dir = checked_join(root, &asset.subfolder)?;
        let name = checked_filename(&asset.filename)?;
        let path = dir.join(name);

        // Containment is already guaranteed by component filtering;
        // keep the invariant checkable.
        debug_assert!(path.starts_with(root));
        Ok(path)
    }

    /// Write `bytes` as a new asset, returning the reference it landed
    /// under.
    ///
    /// On a name collision the filename gets a ` (n)` counter before
    /// the extension unless `overwrite` is set, so the returned
    /// reference may differ from the requested name.
    pub async fn store(
        &self,
        bucket: Bucket,
        subfolder: &str,
        filename: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<AssetRef, CoreError> {
        let mut asset = AssetRef {
            bucket,
            subfolder: subfolder.to_string(),
            filename: checked_filename(filename)?.to_string(),
        };
        let dir = checked_join(self.roots.root_for(bucket), subfolder)?;
        tokio::fs::create_dir_all(&dir).await?;

        if !overwrite {
            asset.filename = next_free_name(&dir, &asset.filename).await?;
        }
        let path = dir.join(&asset.filename);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Asset stored");
        Ok(asset)
    }

    /// Read an asset's bytes.
    pub async fn load(&self, asset: &AssetRef) -> Result<Vec<u8>, CoreError> {
        let path = self.resolve(asset)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CoreError::asset_not_found(asset.display_path()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an asset. Returns `false` if it was already gone.
    pub async fn remove(&self, asset: &AssetRef) -> Result<bool, CoreError> {
        let path = self.resolve(asset)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Asset removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, asset: &AssetRef) -> bool {
        match self.resolve(asset) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Content type for serving an asset, from its filename extension.
pub fn content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

// ---------------------------------------------------------------------------
// Path validation
// ---------------------------------------------------------------------------

/// Join `relative` under `root`, rejecting any component that could
/// escape it.
fn checked_join(root: &Path, relative: &str) -> Result<PathBuf, CoreError> {
    let mut out = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CoreError::Security(format!(
                    "subfolder '{relative}' escapes its bucket"
                )));
            }
        }
    }
    Ok(out)
}

/// A filename must be exactly one normal path component.
fn checked_filename(filename: &str) -> Result<&str, CoreError> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if filename != "." && filename != ".." => Ok(filename),
        _ => Err(CoreError::Security(format!(
            "invalid asset filename '{filename}'"
        ))),
    }
}

/// First name in the sequence `name.ext`, `name (1).ext`, `name (2).ext`
/// ... that does not exist in `dir`.
async fn next_free_name(dir: &Path, filename: &str) -> Result<String, CoreError> {
    if !tokio::fs::try_exists(dir.join(filename)).await? {
        return Ok(filename.to_string());
    }
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let ext = path.extension().and_then(|e| e.to_str());

    for n in 1u32.. {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if !tokio::fs::try_exists(dir.join(&candidate)).await? {
            return Ok(candidate);
        }
    }
    unreachable!("counter space exhausted")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
