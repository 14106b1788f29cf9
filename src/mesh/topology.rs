//! Symbol-stream driven topology reconstruction.

use super::active_faces::{ActiveFaceQueue, DEFAULT_WINDOW};
use super::dual_vf_mesh::{AttrMask, DualVFMesh, NONE};
use super::{Result, TopologyError};

/// Number of face degree compression contexts.
pub const DEGREE_CONTEXTS: usize = 8;

/// Symbol streams in payload order.
pub const STREAM_COUNT: usize = DEGREE_CONTEXTS + 7;

/// Upper bound on valence and degree; guards slot allocation.
const MAX_RING: i32 = 1 << 16;

const DEGREE_NAMES: [&str; DEGREE_CONTEXTS] = [
    "degree[0]",
    "degree[1]",
    "degree[2]",
    "degree[3]",
    "degree[4]",
    "degree[5]",
    "degree[6]",
    "degree[7]",
];

/// The decoded topology symbol streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolStreams {
    /// Face degrees per context; `0` marks a split.
    pub degrees: [Vec<i32>; DEGREE_CONTEXTS],
    pub valences: Vec<i32>,
    pub groups: Vec<i32>,
    pub flags: Vec<i32>,
    /// Attribute mask bits 0..32 of each 64-bit chunk.
    pub mask_low: Vec<i32>,
    /// Attribute mask bits 32..64 of each 64-bit chunk.
    pub mask_high: Vec<i32>,
    /// Queue offsets from the end, one per split.
    pub split_faces: Vec<i32>,
    /// Vertex slot within the split face.
    pub split_positions: Vec<i32>,
}

impl SymbolStreams {
    /// Build from [`STREAM_COUNT`] streams in payload order.
    pub fn from_streams(streams: Vec<Vec<i32>>) -> Option<Self> {
        if streams.len() != STREAM_COUNT {
            return None;
        }
        let mut it = streams.into_iter();
        let degrees: [Vec<i32>; DEGREE_CONTEXTS] =
            std::array::from_fn(|_| it.next().unwrap_or_default());
        let mut next = || it.next().unwrap_or_default();
        Some(Self {
            degrees,
            valences: next(),
            groups: next(),
            flags: next(),
            mask_low: next(),
            mask_high: next(),
            split_faces: next(),
            split_positions: next(),
        })
    }
}

/// A symbol stream with its read cursor.
#[derive(Debug)]
struct Cursor {
    name: &'static str,
    values: Vec<i32>,
    pos: usize,
}

impl Cursor {
    fn new(name: &'static str, values: Vec<i32>) -> Self {
        Self {
            name,
            values,
            pos: 0,
        }
    }

    #[inline]
    fn next(&mut self) -> Result<i32> {
        let value = *self
            .values
            .get(self.pos)
            .ok_or(TopologyError::StreamExhausted(self.name))?;
        self.pos += 1;
        Ok(value)
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= self.values.len()
    }

    fn check_consumed(&self) -> Result<()> {
        if self.is_exhausted() {
            Ok(())
        } else {
            Err(TopologyError::StreamNotConsumed {
                stream: self.name,
                remaining: self.values.len() - self.pos,
            })
        }
    }
}

/// Result of a topology decode.
#[derive(Debug, Clone)]
pub struct DecodedTopology {
    pub mesh: DualVFMesh,
    /// Attributes (normals) referenced by the face masks.
    pub attribute_count: u32,
    /// Connected components walked.
    pub components: usize,
}

/// Replays the encoder's traversal over a set of symbol streams.
#[derive(Debug)]
pub struct MeshTopologyDecoder {
    degrees: [Cursor; DEGREE_CONTEXTS],
    valences: Cursor,
    groups: Cursor,
    flags: Cursor,
    mask_low: Cursor,
    mask_high: Cursor,
    split_faces: Cursor,
    split_positions: Cursor,
    mesh: DualVFMesh,
    queue: ActiveFaceQueue,
    attribute_count: u32,
}

impl MeshTopologyDecoder {
    pub fn new(streams: SymbolStreams) -> Self {
        Self::with_window(streams, DEFAULT_WINDOW)
    }

    /// `window` bounds how many live queue entries are compared when picking
    /// the next face.
    pub fn with_window(streams: SymbolStreams, window: usize) -> Self {
        let SymbolStreams {
            degrees,
            valences,
            groups,
            flags,
            mask_low,
            mask_high,
            split_faces,
            split_positions,
        } = streams;
        let mut degrees = degrees.into_iter();
        Self {
            degrees: std::array::from_fn(|ctx| {
                Cursor::new(DEGREE_NAMES[ctx], degrees.next().unwrap_or_default())
            }),
            valences: Cursor::new("valence", valences),
            groups: Cursor::new("vertex group", groups),
            flags: Cursor::new("vertex flags", flags),
            mask_low: Cursor::new("attribute mask low", mask_low),
            mask_high: Cursor::new("attribute mask high", mask_high),
            split_faces: Cursor::new("split face", split_faces),
            split_positions: Cursor::new("split position", split_positions),
            mesh: DualVFMesh::new(),
            queue: ActiveFaceQueue::new(window),
            attribute_count: 0,
        }
    }

    pub fn decode(mut self) -> Result<DecodedTopology> {
        let mut components = 0;
        while self.init_component()? {
            components += 1;
            self.run_component()?;
        }
        self.check_consumed()?;
        if !self.mesh.is_complete() {
            return Err(self.first_incomplete());
        }

        tracing::debug!(
            vertices = self.mesh.num_vertices(),
            faces = self.mesh.num_faces(),
            components,
            attributes = self.attribute_count,
            "decoded mesh topology"
        );
        Ok(DecodedTopology {
            mesh: self.mesh,
            attribute_count: self.attribute_count,
            components,
        })
    }

    /// Start a component from a fresh seed vertex; `false` once the valence
    /// stream runs out.
    fn init_component(&mut self) -> Result<bool> {
        if self.valences.is_exhausted() {
            return Ok(false);
        }
        let v = self.new_vertex()?;
        for j in 0..self.mesh.valence(v) {
            if self.mesh.face_at(v, i64::from(j)) == NONE {
                self.activate_face(v, j)?;
            }
        }
        tracing::trace!(seed = v, "started component");
        Ok(true)
    }

    fn run_component(&mut self) -> Result<()> {
        loop {
            let mesh = &self.mesh;
            let Some(face) = self.queue.next_face(|f| mesh.face_empty_slots(f)) else {
                return Ok(());
            };
            self.complete_face(face)?;
            self.queue.mark_removed(face);
        }
    }

    /// Fill every vertex slot of `f`, completing each new vertex in turn.
    fn complete_face(&mut self, f: u32) -> Result<()> {
        while self.mesh.face_empty_slots(f) > 0 {
            let degree = self.mesh.degree(f);
            let slot = (0..degree)
                .find(|&i| {
                    self.mesh.vertex_at(f, i64::from(i)) == NONE
                        && self.mesh.vertex_at(f, i64::from(i) - 1) != NONE
                })
                .ok_or(TopologyError::MissingVertexSlot { face: f })?;
            let v = self.activate_vertex(f, slot)?;
            self.complete_vertex(v)?;
        }
        Ok(())
    }

    /// Fill every face slot of `v`.
    fn complete_vertex(&mut self, v: u32) -> Result<()> {
        while self.mesh.vertex_empty_slots(v) > 0 {
            let valence = self.mesh.valence(v);
            let slot = (0..valence)
                .find(|&j| {
                    self.mesh.face_at(v, i64::from(j)) == NONE
                        && self.mesh.face_at(v, i64::from(j) - 1) != NONE
                })
                .ok_or(TopologyError::MissingFaceSlot { vertex: v })?;
            self.activate_face(v, slot)?;
        }
        Ok(())
    }

    fn new_vertex(&mut self) -> Result<u32> {
        let valence = self.valences.next()?;
        if !(1..=MAX_RING).contains(&valence) {
            return Err(TopologyError::InvalidValence(valence));
        }
        let group = self.groups.next()?;
        let flags = self.flags.next()?;
        Ok(self.mesh.add_vertex(valence as u32, group, flags))
    }

    fn activate_vertex(&mut self, f: u32, i: u32) -> Result<u32> {
        let v = self.new_vertex()?;
        self.mesh.link(v, 0, f, i)?;
        Ok(v)
    }

    /// Fill face slot `j` of `v` with a new face, or a queued one on split.
    fn activate_face(&mut self, v: u32, j: u32) -> Result<()> {
        let ctx = self.degree_context(v);
        let degree = self.degrees[ctx].next()?;
        if degree == 0 {
            return self.split(v, j);
        }
        if !(1..=MAX_RING).contains(&degree) {
            return Err(TopologyError::InvalidDegree(degree));
        }

        let degree = degree as u32;
        let mask = self.read_mask(degree)?;
        let attributes = mask.count_ones();
        let f = self.mesh.add_face(degree, mask, self.attribute_count)?;
        self.attribute_count = self.attribute_count.saturating_add(attributes);
        self.queue.push(f);
        self.mesh.link(v, j, f, 0)
    }

    fn split(&mut self, v: u32, j: u32) -> Result<()> {
        let offset = self.split_faces.next()?;
        let position = self.split_positions.next()?;
        let face = self.queue.from_end(offset)?;
        let degree = self.mesh.degree(face);
        let slot = u32::try_from(position)
            .ok()
            .filter(|&p| p < degree)
            .ok_or(TopologyError::SplitPositionOutOfRange { position, degree })?;
        tracing::trace!(vertex = v, face, slot, "split onto queued face");
        self.mesh.link(v, j, face, slot)
    }

    /// Degree context from the valence of `v` and its known faces.
    fn degree_context(&self, v: u32) -> usize {
        let (sum, known) = self
            .mesh
            .faces_of(v)
            .iter()
            .filter(|&&f| f != NONE)
            .fold((0u64, 0u64), |(sum, n), &f| {
                (sum + u64::from(self.mesh.degree(f)), n + 1)
            });
        let by_regular = |regular: u64, base: usize| match sum.cmp(&(regular * known)) {
            std::cmp::Ordering::Less => base,
            std::cmp::Ordering::Equal => base + 1,
            std::cmp::Ordering::Greater => base + 2,
        };
        match self.mesh.valence(v) {
            3 => by_regular(6, 0),
            4 => by_regular(4, 3),
            5 => 6,
            _ => 7,
        }
    }

    fn read_mask(&mut self, degree: u32) -> Result<AttrMask> {
        let low = self.mask_low.next()? as u32;
        if degree <= 32 {
            return Ok(AttrMask::Inline(u64::from(low)));
        }
        let high = self.mask_high.next()? as u32;
        let first = u64::from(low) | (u64::from(high) << 32);
        if degree <= 64 {
            return Ok(AttrMask::Inline(first));
        }

        let mut words = vec![first];
        for _ in 1..degree.div_ceil(64) {
            let low = self.mask_low.next()? as u32;
            let high = self.mask_high.next()? as u32;
            words.push(u64::from(low) | (u64::from(high) << 32));
        }
        Ok(AttrMask::from_words(words))
    }

    fn check_consumed(&self) -> Result<()> {
        self.degrees.iter().try_for_each(Cursor::check_consumed)?;
        [
            &self.valences,
            &self.groups,
            &self.flags,
            &self.mask_low,
            &self.mask_high,
            &self.split_faces,
            &self.split_positions,
        ]
        .into_iter()
        .try_for_each(Cursor::check_consumed)
    }

    fn first_incomplete(&self) -> TopologyError {
        (0..self.mesh.num_faces() as u32)
            .find(|&f| self.mesh.face_empty_slots(f) > 0)
            .map(|face| TopologyError::MissingVertexSlot { face })
            .unwrap_or_else(|| {
                let vertex = (0..self.mesh.num_vertices() as u32)
                    .find(|&v| self.mesh.vertex_empty_slots(v) > 0)
                    .unwrap_or(0);
                TopologyError::MissingFaceSlot { vertex }
            })
    }
}
