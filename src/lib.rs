//! Per-image face indexing.
//!
//! Given the raw RGBA pixels of one photograph, [`index_faces`] produces a
//! deterministic, versioned [`FaceIndex`]: for every face a bounding box,
//! five landmarks, a detector confidence, a blur score, a 192-dimensional
//! embedding, and a stable identifier that survives reindexing and
//! transport. Neural inference runs behind the [`InferenceWorker`]
//! interface; everything else — tensor decoding, coordinate remapping,
//! similarity-transform alignment, warping, blur scoring, id generation —
//! is pure computation on the caller's thread.
//!
//! Coordinates cross three frames: the 640×640 model canvas the detector
//! sees, source pixels, and the unit square the index stores. Every frame
//! change is an explicit transformation; face ids are always derived from
//! the normalized source box.

pub mod envelope;
pub mod error;
pub mod face;
pub mod indexer;
pub mod inference;
pub mod types;
pub mod worker;

pub use envelope::{CLIENT, LocalFaceIndex, PIPELINE_VERSION, RemoteFaceIndex};
pub use error::{IndexError, IndexResult};
pub use indexer::index_faces;
pub use inference::InferenceWorker;
pub use types::{
    DecodedImage, Dimensions, Face, FaceBox, FaceDetection, FaceIndex, Point,
    file_id_from_face_id, make_face_id,
};
