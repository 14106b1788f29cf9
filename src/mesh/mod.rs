//! Dual vertex/face mesh topology decoding.
//!
//! The topology is never stored as an index list. Instead the encoder walks
//! the mesh and emits, for every vertex it meets, its valence and for every
//! face its degree. The decoder replays that walk:
//!
//! ```text
//! seed vertex ──► activate its faces ──► active-face queue
//!                                              │
//!                 ┌────────────────────────────┘
//!                 ▼
//!        pick face with fewest empty slots
//!                 │
//!                 ▼
//!        create missing vertices ──► activate their missing faces
//!                 │                  (degree 0 = reuse a queued face)
//!                 ▼
//!        link propagation closes shared edges
//! ```
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`dual_vf_mesh`] | arena storage with per-entity slot ranges |
//! | [`active_faces`] | queue of faces still missing vertices |
//! | [`topology`] | symbol streams and the walk itself |
//! | [`driver`] | payload layout and index emission |

pub mod active_faces;
pub mod driver;
pub mod dual_vf_mesh;
pub mod topology;


pub use active_faces::ActiveFaceQueue;
pub use driver::{DecodeOptions, DecodedMesh, MeshCoderDriver};
pub use dual_vf_mesh::{AttrMask, DualVFMesh};
pub use topology::{DecodedTopology, MeshTopologyDecoder, SymbolStreams};

use std::fmt;

/// Topology reconstruction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A face has empty vertex slots but none next to a known vertex.
    MissingVertexSlot { face: u32 },
    /// A vertex has empty face slots but none next to a known face.
    MissingFaceSlot { vertex: u32 },
    /// Linking would overwrite a slot or duplicate an incidence.
    SlotConflict { vertex: u32, face: u32 },
    /// The attribute mask sets a bit at or above the face degree.
    AttributeCountExceedsDegree { face: u32, degree: u32 },
    /// Split offset beyond the active-face queue.
    SplitOffsetOutOfRange { offset: i32, len: usize },
    /// Split position beyond the degree of the referenced face.
    SplitPositionOutOfRange { position: i32, degree: u32 },
    /// Split referenced a face already removed from the queue.
    InactiveSplitFace(u32),
    InvalidValence(i32),
    InvalidDegree(i32),
    /// A symbol stream ran out.
    StreamExhausted(&'static str),
    /// Decoding finished with symbols left over.
    StreamNotConsumed { stream: &'static str, remaining: usize },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVertexSlot { face } => {
                write!(f, "Face {} has no fillable vertex slot", face)
            }
            Self::MissingFaceSlot { vertex } => {
                write!(f, "Vertex {} has no fillable face slot", vertex)
            }
            Self::SlotConflict { vertex, face } => {
                write!(f, "Conflicting link between vertex {} and face {}", vertex, face)
            }
            Self::AttributeCountExceedsDegree { face, degree } => {
                write!(f, "Attribute mask of face {} exceeds degree {}", face, degree)
            }
            Self::SplitOffsetOutOfRange { offset, len } => {
                write!(f, "Split offset {} outside queue of {}", offset, len)
            }
            Self::SplitPositionOutOfRange { position, degree } => {
                write!(f, "Split position {} outside face of degree {}", position, degree)
            }
            Self::InactiveSplitFace(face) => write!(f, "Split references inactive face {}", face),
            Self::InvalidValence(v) => write!(f, "Invalid vertex valence: {}", v),
            Self::InvalidDegree(d) => write!(f, "Invalid face degree: {}", d),
            Self::StreamExhausted(name) => write!(f, "Symbol stream exhausted: {}", name),
            Self::StreamNotConsumed { stream, remaining } => {
                write!(f, "Symbol stream {} has {} unread values", stream, remaining)
            }
        }
    }
}

impl std::error::Error for TopologyError {}

pub type Result<T> = std::result::Result<T, TopologyError>;
