//! Error types for tessellation decoding.
//!
//! This module provides the [`JtError`] type returned by the end-to-end
//! [`MeshCoderDriver`](crate::MeshCoderDriver). Lower layers keep their own
//! narrower errors and convert into it with `?`.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Streams | [`Decode`] | Truncated data, bad codec headers, context tables |
//! | Topology | [`Topology`] | Symbol streams that do not describe a valid mesh |
//! | Payload | [`VertexCountMismatch`], [`UnknownVertexEncoding`] | Vertex data disagrees with the topology |
//!
//! A failed decode never yields partial output.
//!
//! ## Example
//!
//! ```rust,ignore
//! use jt_tess::{JtError, MeshCoderDriver};
//!
//! match MeshCoderDriver::default().decode(&payload) {
//!     Ok(mesh) => println!("{} faces", mesh.face_count()),
//!     Err(JtError::Topology(e)) => eprintln!("bad connectivity: {}", e),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! [`Decode`]: JtError::Decode
//! [`Topology`]: JtError::Topology
//! [`VertexCountMismatch`]: JtError::VertexCountMismatch
//! [`UnknownVertexEncoding`]: JtError::UnknownVertexEncoding

use std::fmt;

use crate::decode::DecodeError;
use crate::mesh::TopologyError;

/// Error type for mesh payload decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JtError {
    /// An int32 stream or vertex data header failed to decode.
    Decode(DecodeError),

    /// The topology symbol streams are inconsistent.
    Topology(TopologyError),

    /// A vertex data block holds a different number of entries than the
    /// topology needs.
    VertexCountMismatch {
        /// Which block: `"coordinates"` or `"normals"`.
        what: &'static str,
        /// Count required by the topology.
        expected: usize,
        /// Count found in the vertex data.
        actual: usize,
    },

    /// A vertex data kind byte is not valid where it appears.
    ///
    /// Coordinates accept `0` (quantized) and `1` (exponent/mantissa);
    /// normals additionally accept `2` (Deering) and `0xFF` (absent).
    UnknownVertexEncoding(u8),
}

impl fmt::Display for JtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "Stream decode failed: {}", e),
            Self::Topology(e) => write!(f, "Topology decode failed: {}", e),
            Self::VertexCountMismatch {
                what,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Vertex count mismatch in {}: topology needs {}, have {}",
                    what, expected, actual
                )
            }
            Self::UnknownVertexEncoding(kind) => {
                write!(f, "Unknown vertex encoding: 0x{:02x}", kind)
            }
        }
    }
}

impl std::error::Error for JtError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Topology(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for JtError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<TopologyError> for JtError {
    fn from(e: TopologyError) -> Self {
        Self::Topology(e)
    }
}

pub type Result<T> = std::result::Result<T, JtError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_and_source() {
        let err = JtError::from(DecodeError::UnknownCodec(7));
        assert_eq!(err.to_string(), "Stream decode failed: Unknown codec id: 7");
        assert!(err.source().is_some());

        let err = JtError::VertexCountMismatch {
            what: "normals",
            expected: 6,
            actual: 5,
        };
        assert!(err.source().is_none());
        assert!(err.to_string().contains("normals"));
    }
}
