//! Logical storage buckets and asset references.
//!
//! A bucket is one of a small fixed set of storage areas, each rooted
//! at its own directory. An asset is addressed by bucket plus a
//! normalized relative path; the store crate enforces that the
//! resolved path never leaves the bucket root.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The fixed set of storage areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Client uploads and style reference images.
    Input,
    /// Generated results.
    Output,
    /// Scratch space for intermediate files.
    Temp,
}

impl Bucket {
    /// Parse from the wire value (`"input"`, `"output"`, `"temp"`).
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "temp" => Ok(Self::Temp),
            other => Err(CoreError::Validation(format!(
                "Unknown bucket '{other}'. Must be one of: input, output, temp"
            ))),
        }
    }

    /// Wire value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Temp => "temp",
        }
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Self::Input
    }
}

/// Reference to a stored asset: bucket plus relative location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    #[serde(rename = "type", default)]
    pub bucket: Bucket,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "name")]
    pub filename: String,
}

impl AssetRef {
    pub fn new(bucket: Bucket, subfolder: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            bucket,
            subfolder: subfolder.into(),
            filename: filename.into(),
        }
    }

    /// Relative path for logs and error messages.
    pub fn display_path(&self) -> String {
        if self.subfolder.is_empty() {
            format!("{}/{}", self.bucket.name(), self.filename)
        } else {
            format!("{}/{}/{}", self.bucket.name(), self.subfolder, self.filename)
        }
    }
}
