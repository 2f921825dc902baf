use serde::{Deserialize, Serialize};

use crate::types::FaceIndex;

/// Couples the model weights, constants and algorithms that produced an
/// index. Indices are comparable only within one version; bumping it forces
/// every client to reindex.
pub const PIPELINE_VERSION: u32 = 1;

/// User-agent-like tag identifying this producer on remote indices.
pub const CLIENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A face index keyed for the local store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalFaceIndex {
    #[serde(rename = "fileID")]
    pub file_id: i64,
    #[serde(flatten)]
    pub index: FaceIndex,
}

impl LocalFaceIndex {
    pub fn new(file_id: i64, index: FaceIndex) -> Self {
        Self { file_id, index }
    }
}

/// A face index enveloped for remote storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteFaceIndex {
    pub version: u32,
    pub client: String,
    #[serde(flatten)]
    pub index: FaceIndex,
}

impl RemoteFaceIndex {
    pub fn new(index: FaceIndex) -> Self {
        Self {
            version: PIPELINE_VERSION,
            client: CLIENT.to_string(),
            index,
        }
    }

    /// Whether a consumer supporting `supported_version` must discard this
    /// index and reindex the file locally.
    pub fn should_reindex(&self, supported_version: u32) -> bool {
        self.version < supported_version
    }
}
