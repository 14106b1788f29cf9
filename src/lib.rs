//! Decoder for JT tessellation payloads.
//!
//! Rebuilds polygon meshes from the compressed shape data of JT CAD files:
//! entropy-coded integer streams, quantized vertex records and a dual
//! vertex/face connectivity walk.
//!
//! ## Layers
//! - [`decode`] - bit reader, int32 codecs, probability contexts, predictors
//!   and the stream scheduler
//! - [`vertex`] - coordinate and normal dequantizers
//! - [`mesh`] - topology reconstruction and the end-to-end driver
//!
//! ## Features
//! - `parallel` (default) - decode independent streams and emit face indices
//!   on the rayon pool
//!
//! ## Example
//!
//! ```rust,ignore
//! use jt_tess::{DecodeOptions, MeshCoderDriver};
//!
//! let driver = MeshCoderDriver::new(DecodeOptions::default());
//! let mesh = driver.decode(&payload)?;
//! for face in mesh.faces() {
//!     println!("{:?}", face);
//! }
//! ```

pub mod decode;
pub mod error;
pub mod mesh;
pub mod source;
pub mod vertex;

#[cfg(test)]
mod test_util;

pub use error::{JtError, Result};
pub use source::{ByteOrder, ByteSource, SliceSource};

pub use decode::{
    CdpFormat, DecodeError, EncodedData, PredictorType, Scheduler, SchedulerConfig, SchedulerMode,
};
pub use mesh::{DecodeOptions, DecodedMesh, MeshCoderDriver, TopologyError};
pub use vertex::{VertexData, VertexEncoding};
