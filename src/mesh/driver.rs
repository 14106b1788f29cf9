//! End-to-end decoding of one tessellation payload.
//!
//! ## Payload layout
//!
//! ```text
//! 8 × degree stream                 ┐
//! valence, group, flags streams     │ topology symbols
//! mask low, mask high streams       │ (predictor: none)
//! split face, split position        ┘
//! u8 coordinate kind + vertex data  (3 components)
//! u8 normal kind + vertex data      (0xFF: no normals)
//! ```
//!
//! Every integer stream of the payload is loaded first, then decoded in one
//! [`Scheduler`] pass. Topology reconstruction runs after the join and the
//! per-face index emission fans out again over disjoint output slices.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::dual_vf_mesh::DualVFMesh;
use super::topology::{MeshTopologyDecoder, SymbolStreams, STREAM_COUNT};
use super::active_faces::DEFAULT_WINDOW;
use crate::decode::{
    CdpFormat, DecodeError, DecodeJob, EncodedData, PredictorType, Scheduler, SchedulerConfig,
    SchedulerMode,
};
use crate::error::{JtError, Result};
use crate::source::{ByteOrder, ByteSource, SliceSource};
use crate::vertex::{PendingVertexData, VertexEncoding};

/// Normal kind byte marking a payload without normals.
pub const NO_NORMALS: u8 = 0xFF;

const COMPONENTS: usize = 3;

/// Decoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Packet layout of every integer stream.
    pub format: CdpFormat,
    /// Byte order of the payload, fixed per file.
    pub byte_order: ByteOrder,
    pub scheduler: SchedulerConfig,
    /// Live queue entries compared when picking the next active face.
    pub active_face_window: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            format: CdpFormat::Cdp2,
            byte_order: ByteOrder::Little,
            scheduler: SchedulerConfig::default(),
            active_face_window: DEFAULT_WINDOW,
        }
    }
}

/// A decoded polygon mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMesh {
    /// Interleaved `x, y, z` per vertex.
    pub positions: Vec<f32>,
    /// Interleaved `x, y, z` per normal; empty without normals.
    pub normals: Vec<f32>,
    /// Corner vertex ids, face after face.
    pub vertex_indices: Vec<u32>,
    /// Corner normal ids parallel to `vertex_indices`, `-1` where a face has
    /// no normals; empty without normals.
    pub normal_indices: Vec<i32>,
    pub face_degrees: Vec<u32>,
    /// Vertex group symbol per vertex.
    pub vertex_groups: Vec<i32>,
    /// Vertex flag symbol per vertex.
    pub vertex_flags: Vec<i32>,
}

impl DecodedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / COMPONENTS
    }

    pub fn normal_count(&self) -> usize {
        self.normals.len() / COMPONENTS
    }

    pub fn face_count(&self) -> usize {
        self.face_degrees.len()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// Corner vertex ids of each face.
    pub fn faces(&self) -> impl Iterator<Item = &[u32]> + '_ {
        let mut offset = 0;
        self.face_degrees.iter().map(move |&d| {
            let face = &self.vertex_indices[offset..offset + d as usize];
            offset += d as usize;
            face
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeshCoderDriver {
    options: DecodeOptions,
}

impl MeshCoderDriver {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode a payload held in memory.
    pub fn decode(&self, payload: &[u8]) -> Result<DecodedMesh> {
        let mut source = SliceSource::new(payload, self.options.byte_order);
        self.decode_from(&mut source)
    }

    /// Decode a payload from `source`, which must use the configured byte
    /// order.
    pub fn decode_from<S: ByteSource + ?Sized>(&self, source: &mut S) -> Result<DecodedMesh> {
        let format = self.options.format;
        let mut jobs = (0..STREAM_COUNT)
            .map(|_| {
                Ok(DecodeJob::new(
                    EncodedData::load(source, format)?,
                    PredictorType::None,
                ))
            })
            .collect::<std::result::Result<Vec<_>, DecodeError>>()?;

        let coord_kind = source.read_u8()?;
        let coord_encoding = match VertexEncoding::from_u8(coord_kind) {
            Some(e @ (VertexEncoding::Quantized | VertexEncoding::ExpMant)) => e,
            _ => return Err(JtError::UnknownVertexEncoding(coord_kind)),
        };
        let mut coords = PendingVertexData::read(source, format, coord_encoding, COMPONENTS)?;

        let normal_kind = source.read_u8()?;
        let mut normals = if normal_kind == NO_NORMALS {
            None
        } else {
            let encoding = VertexEncoding::from_u8(normal_kind)
                .ok_or(JtError::UnknownVertexEncoding(normal_kind))?;
            Some(PendingVertexData::read(source, format, encoding, COMPONENTS)?)
        };

        let coord_jobs = coords.take_jobs();
        let coord_end = STREAM_COUNT + coord_jobs.len();
        jobs.extend(coord_jobs);
        if let Some(normals) = normals.as_mut() {
            jobs.extend(normals.take_jobs());
        }

        let mut streams = Scheduler::new(self.options.scheduler).decode_all(jobs)?;
        let normal_streams = streams.split_off(coord_end);
        let coord_streams = streams.split_off(STREAM_COUNT);
        let symbols = SymbolStreams::from_streams(streams)
            .ok_or(DecodeError::MalformedHeader("topology stream count"))?;

        let topology =
            MeshTopologyDecoder::with_window(symbols, self.options.active_face_window).decode()?;
        let mesh = topology.mesh;

        let positions = coords.finish(coord_streams)?;
        if positions.len() != mesh.num_vertices() {
            return Err(JtError::VertexCountMismatch {
                what: "coordinates",
                expected: mesh.num_vertices(),
                actual: positions.len(),
            });
        }
        let normals = normals.map(|n| n.finish(normal_streams)).transpose()?;
        if let Some(normals) = &normals {
            if normals.len() != topology.attribute_count as usize {
                return Err(JtError::VertexCountMismatch {
                    what: "normals",
                    expected: topology.attribute_count as usize,
                    actual: normals.len(),
                });
            }
        }

        let parallel = match self.options.scheduler.mode {
            SchedulerMode::Serial => false,
            SchedulerMode::Parallel { serial_threshold } => mesh.num_corners() >= serial_threshold,
        };
        let (vertex_indices, mut normal_indices, face_degrees) = emit_corners(&mesh, parallel);
        if normals.is_none() {
            normal_indices.clear();
        }
        let vertex_ids = 0..mesh.num_vertices() as u32;
        let vertex_groups: Vec<i32> = vertex_ids.clone().map(|v| mesh.vertex_group(v)).collect();
        let vertex_flags: Vec<i32> = vertex_ids.map(|v| mesh.vertex_flags(v)).collect();

        tracing::debug!(
            vertices = mesh.num_vertices(),
            faces = mesh.num_faces(),
            corners = vertex_indices.len(),
            normals = normals.as_ref().map_or(0, |n| n.len()),
            components = topology.components,
            "decoded mesh"
        );
        Ok(DecodedMesh {
            positions: positions.into_values(),
            normals: normals.map(|n| n.into_values()).unwrap_or_default(),
            vertex_indices,
            normal_indices,
            face_degrees,
            vertex_groups,
            vertex_flags,
        })
    }
}

/// Split `buf` into consecutive per-face slices.
fn split_by_degree<'a, T>(mut rest: &'a mut [T], degrees: &[u32]) -> Vec<&'a mut [T]> {
    let mut out = Vec::with_capacity(degrees.len());
    for &d in degrees {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(d as usize);
        out.push(head);
        rest = tail;
    }
    out
}

fn fill_face(mesh: &DualVFMesh, f: u32, vertices: &mut [u32], normals: &mut [i32]) {
    for (i, (v, n)) in vertices.iter_mut().zip(normals.iter_mut()).enumerate() {
        *v = mesh.vertex_at(f, i as i64);
        *n = mesh.vtx_face_attr(f, i as u32);
    }
}

/// Corner vertex ids, corner attribute ids and face degrees.
fn emit_corners(mesh: &DualVFMesh, parallel: bool) -> (Vec<u32>, Vec<i32>, Vec<u32>) {
    let degrees: Vec<u32> = (0..mesh.num_faces() as u32).map(|f| mesh.degree(f)).collect();
    let mut vertex_indices = vec![0u32; mesh.num_corners()];
    let mut normal_indices = vec![-1i32; mesh.num_corners()];
    let vertex_slices = split_by_degree(&mut vertex_indices, &degrees);
    let normal_slices = split_by_degree(&mut normal_indices, &degrees);

    #[cfg(feature = "parallel")]
    if parallel {
        vertex_slices
            .into_par_iter()
            .zip(normal_slices)
            .enumerate()
            .for_each(|(f, (v, n))| fill_face(mesh, f as u32, v, n));
        return (vertex_indices, normal_indices, degrees);
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    vertex_slices
        .into_iter()
        .zip(normal_slices)
        .enumerate()
        .for_each(|(f, (v, n))| fill_face(mesh, f as u32, v, n));
    (vertex_indices, normal_indices, degrees)
}
