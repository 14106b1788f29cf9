//! Arena storage for the dual vertex/face mesh.
//!
//! Vertices and faces live in two arenas. Each owns a contiguous range in a
//! shared slot table: vertex `v` has `valence(v)` face slots listing its
//! incident faces counter-clockwise, face `f` has `degree(f)` vertex slots
//! listing its corners counter-clockwise. Slots start out as [`NONE`].
//!
//! Slots are always written in pairs by [`DualVFMesh::link`]: `v.f[j] = f`
//! holds exactly when `f.v[i] = v` for some `i`. For a corner `(v, j, f, i)`
//! the neighbouring corners are fixed by orientation:
//!
//! ```text
//!   g = v.f[j+1] contains u = f.v[i-1] right after v
//!   h = v.f[j-1] contains w = f.v[i+1] right before v
//! ```
//!
//! `link` applies these rules until nothing new can be inferred.

use super::{Result, TopologyError};

/// Empty slot marker.
pub const NONE: u32 = u32::MAX;

/// Which corners of a face carry their own attribute (normal).
///
/// Bit `i` set means corner `i` starts a new attribute; corners without a bit
/// reuse the attribute of the nearest set corner before them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrMask {
    /// Faces of degree up to 64.
    Inline(u64),
    /// One word per 64 corners.
    Wide(Vec<u64>),
}

impl Default for AttrMask {
    fn default() -> Self {
        Self::Inline(0)
    }
}

impl AttrMask {
    pub fn from_words(mut words: Vec<u64>) -> Self {
        match words.len() {
            0 => Self::Inline(0),
            1 => Self::Inline(words[0]),
            _ => {
                while words.len() > 1 && words.last() == Some(&0) {
                    words.pop();
                }
                Self::Wide(words)
            }
        }
    }

    fn words(&self) -> &[u64] {
        match self {
            Self::Inline(w) => std::slice::from_ref(w),
            Self::Wide(words) => words,
        }
    }

    pub fn bit(&self, index: usize) -> bool {
        self.words()
            .get(index / 64)
            .is_some_and(|w| (w >> (index % 64)) & 1 == 1)
    }

    pub fn count_ones(&self) -> u32 {
        self.words().iter().map(|w| w.count_ones()).sum()
    }

    /// Set bits strictly below `index`.
    pub fn count_below(&self, index: usize) -> u32 {
        let words = self.words();
        let full = (index / 64).min(words.len());
        let mut count: u32 = words[..full].iter().map(|w| w.count_ones()).sum();
        if let Some(w) = words.get(index / 64) {
            let partial = index % 64;
            if partial > 0 {
                count += (w & ((1u64 << partial) - 1)).count_ones();
            }
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.words().iter().all(|&w| w == 0)
    }

    /// Index of the highest set bit.
    pub fn highest_bit(&self) -> Option<usize> {
        self.words()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &w)| w != 0)
            .map(|(k, w)| k * 64 + 63 - w.leading_zeros() as usize)
    }
}

#[derive(Debug, Clone)]
struct VertexRecord {
    valence: u32,
    empty: u32,
    group: i32,
    flags: i32,
    start: usize,
}

#[derive(Debug, Clone)]
struct FaceRecord {
    degree: u32,
    empty: u32,
    attr_base: u32,
    mask: AttrMask,
    start: usize,
}

#[inline]
fn wrap(index: i64, len: u32) -> u32 {
    index.rem_euclid(i64::from(len)) as u32
}

/// Pending corner link: `(vertex, face slot, face, vertex slot)`.
type Corner = (u32, u32, u32, u32);

#[derive(Debug, Clone, Default)]
pub struct DualVFMesh {
    vertices: Vec<VertexRecord>,
    faces: Vec<FaceRecord>,
    vertex_faces: Vec<u32>,
    face_vertices: Vec<u32>,
}

impl DualVFMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, valence: u32, group: i32, flags: i32) -> u32 {
        let id = self.vertices.len() as u32;
        let start = self.vertex_faces.len();
        self.vertex_faces.resize(start + valence as usize, NONE);
        self.vertices.push(VertexRecord {
            valence,
            empty: valence,
            group,
            flags,
            start,
        });
        id
    }

    /// Add a face whose attributes start at `attr_base`.
    pub fn add_face(&mut self, degree: u32, mask: AttrMask, attr_base: u32) -> Result<u32> {
        let id = self.faces.len() as u32;
        if mask.highest_bit().is_some_and(|b| b >= degree as usize) {
            return Err(TopologyError::AttributeCountExceedsDegree { face: id, degree });
        }
        let start = self.face_vertices.len();
        self.face_vertices.resize(start + degree as usize, NONE);
        self.faces.push(FaceRecord {
            degree,
            empty: degree,
            attr_base,
            mask,
            start,
        });
        Ok(id)
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Sum of all face degrees.
    pub fn num_corners(&self) -> usize {
        self.face_vertices.len()
    }

    pub fn valence(&self, v: u32) -> u32 {
        self.vertices[v as usize].valence
    }

    pub fn degree(&self, f: u32) -> u32 {
        self.faces[f as usize].degree
    }

    pub fn vertex_group(&self, v: u32) -> i32 {
        self.vertices[v as usize].group
    }

    pub fn vertex_flags(&self, v: u32) -> i32 {
        self.vertices[v as usize].flags
    }

    pub fn attr_mask(&self, f: u32) -> &AttrMask {
        &self.faces[f as usize].mask
    }

    pub fn attr_base(&self, f: u32) -> u32 {
        self.faces[f as usize].attr_base
    }

    /// Unfilled face slots of `v`.
    pub fn vertex_empty_slots(&self, v: u32) -> u32 {
        self.vertices[v as usize].empty
    }

    /// Unfilled vertex slots of `f`.
    pub fn face_empty_slots(&self, f: u32) -> u32 {
        self.faces[f as usize].empty
    }

    pub fn faces_of(&self, v: u32) -> &[u32] {
        let r = &self.vertices[v as usize];
        &self.vertex_faces[r.start..r.start + r.valence as usize]
    }

    pub fn vertices_of(&self, f: u32) -> &[u32] {
        let r = &self.faces[f as usize];
        &self.face_vertices[r.start..r.start + r.degree as usize]
    }

    /// Face in slot `j` (taken modulo the valence) of `v`.
    pub fn face_at(&self, v: u32, j: i64) -> u32 {
        let r = &self.vertices[v as usize];
        self.vertex_faces[r.start + wrap(j, r.valence) as usize]
    }

    /// Vertex in slot `i` (taken modulo the degree) of `f`.
    pub fn vertex_at(&self, f: u32, i: i64) -> u32 {
        let r = &self.faces[f as usize];
        self.face_vertices[r.start + wrap(i, r.degree) as usize]
    }

    pub fn face_slot_of(&self, v: u32, f: u32) -> Option<u32> {
        self.faces_of(v).iter().position(|&x| x == f).map(|p| p as u32)
    }

    pub fn vertex_slot_of(&self, f: u32, v: u32) -> Option<u32> {
        self.vertices_of(f).iter().position(|&x| x == v).map(|p| p as u32)
    }

    fn require_face_slot(&self, v: u32, f: u32) -> Result<u32> {
        self.face_slot_of(v, f)
            .ok_or(TopologyError::MissingFaceSlot { vertex: v })
    }

    fn require_vertex_slot(&self, f: u32, v: u32) -> Result<u32> {
        self.vertex_slot_of(f, v)
            .ok_or(TopologyError::MissingVertexSlot { face: f })
    }

    /// Every slot of every entity is filled.
    pub fn is_complete(&self) -> bool {
        self.vertices.iter().all(|v| v.empty == 0) && self.faces.iter().all(|f| f.empty == 0)
    }

    /// Link corner `v.f[j] = f`, `f.v[i] = v` and everything it implies.
    pub fn link(&mut self, v: u32, j: u32, f: u32, i: u32) -> Result<()> {
        let mut pending: Vec<Corner> = vec![(v, j, f, i)];
        while let Some((v, j, f, i)) = pending.pop() {
            if self.set_corner(v, j, f, i)? {
                self.propagate(v, j, f, i, &mut pending)?;
            }
        }
        Ok(())
    }

    /// Write both slots; `false` if they already held this corner.
    fn set_corner(&mut self, v: u32, j: u32, f: u32, i: u32) -> Result<bool> {
        let vs = self.vertices[v as usize].start + j as usize;
        let fs = self.faces[f as usize].start + i as usize;
        let (cur_f, cur_v) = (self.vertex_faces[vs], self.face_vertices[fs]);
        if cur_f == f && cur_v == v {
            return Ok(false);
        }

        let conflict = TopologyError::SlotConflict { vertex: v, face: f };
        if (cur_f != NONE && cur_f != f) || (cur_v != NONE && cur_v != v) {
            return Err(conflict);
        }
        if (cur_f == NONE && self.face_slot_of(v, f).is_some())
            || (cur_v == NONE && self.vertex_slot_of(f, v).is_some())
        {
            return Err(conflict);
        }

        if cur_f == NONE {
            self.vertex_faces[vs] = f;
            self.vertices[v as usize].empty -= 1;
        }
        if cur_v == NONE {
            self.face_vertices[fs] = v;
            self.faces[f as usize].empty -= 1;
        }
        Ok(true)
    }

    fn push_corner(&self, pending: &mut Vec<Corner>, v: u32, j: i64, f: u32, i: i64) {
        pending.push((v, wrap(j, self.valence(v)), f, wrap(i, self.degree(f))));
    }

    fn propagate(&self, v: u32, j: u32, f: u32, i: u32, pending: &mut Vec<Corner>) -> Result<()> {
        let (j, i) = (i64::from(j), i64::from(i));
        let u = self.vertex_at(f, i - 1);
        let w = self.vertex_at(f, i + 1);
        let g = self.face_at(v, j + 1);
        let h = self.face_at(v, j - 1);

        // Edge (v, u): shared by f and g.
        match (g != NONE, u != NONE) {
            (true, true) => {
                let a = self.require_face_slot(u, f)?;
                let gs = self.require_vertex_slot(g, v)?;
                self.push_corner(pending, u, i64::from(a) - 1, g, i64::from(gs) + 1);
            }
            (true, false) => {
                let gs = self.require_vertex_slot(g, v)?;
                let x = self.vertex_at(g, i64::from(gs) + 1);
                if x != NONE {
                    let c = self.require_face_slot(x, g)?;
                    self.push_corner(pending, x, i64::from(c) + 1, f, i - 1);
                }
            }
            (false, true) => {
                let a = self.require_face_slot(u, f)?;
                let k = self.face_at(u, i64::from(a) - 1);
                if k != NONE {
                    let s = self.require_vertex_slot(k, u)?;
                    self.push_corner(pending, v, j + 1, k, i64::from(s) - 1);
                }
            }
            (false, false) => {}
        }

        // Edge (w, v): shared by f and h.
        match (h != NONE, w != NONE) {
            (true, true) => {
                let b = self.require_face_slot(w, f)?;
                let hs = self.require_vertex_slot(h, v)?;
                self.push_corner(pending, w, i64::from(b) + 1, h, i64::from(hs) - 1);
            }
            (true, false) => {
                let hs = self.require_vertex_slot(h, v)?;
                let y = self.vertex_at(h, i64::from(hs) - 1);
                if y != NONE {
                    let c = self.require_face_slot(y, h)?;
                    self.push_corner(pending, y, i64::from(c) - 1, f, i + 1);
                }
            }
            (false, true) => {
                let b = self.require_face_slot(w, f)?;
                let k = self.face_at(w, i64::from(b) + 1);
                if k != NONE {
                    let s = self.require_vertex_slot(k, w)?;
                    self.push_corner(pending, v, j - 1, k, i64::from(s) + 1);
                }
            }
            (false, false) => {}
        }
        Ok(())
    }

    /// Attribute index of corner `i` of `f`, or `-1` if `f` has none.
    ///
    /// Walks backwards from the corner to the nearest corner with its own
    /// attribute and counts the attributes before it.
    pub fn vtx_face_attr(&self, f: u32, i: u32) -> i32 {
        let face = &self.faces[f as usize];
        if face.mask.is_empty() {
            return -1;
        }
        (0..face.degree)
            .map(|back| wrap(i64::from(i) - i64::from(back), face.degree) as usize)
            .find(|&slot| face.mask.bit(slot))
            .map_or(-1, |slot| (face.attr_base + face.mask.count_below(slot)) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_mask_inline() {
        let mask = AttrMask::from_words(vec![0b1010]);

        assert_eq!(mask, AttrMask::Inline(0b1010));
        assert_eq!(mask.count_ones(), 2);
        assert_eq!(mask.count_below(3), 1);
        assert_eq!(mask.count_below(4), 2);
        assert_eq!(mask.highest_bit(), Some(3));
        assert!(!mask.bit(0));
        assert!(AttrMask::default().is_empty());
    }

    #[test]
    fn test_attr_mask_wide() {
        let mask = AttrMask::from_words(vec![1, 0, 1 << 5]);

        assert!(mask.bit(0));
        assert!(mask.bit(133));
        assert_eq!(mask.count_below(133), 1);
        assert_eq!(mask.count_below(200), 2);
        assert_eq!(mask.highest_bit(), Some(133));
    }

    #[test]
    fn test_mask_above_degree_rejected() {
        let mut mesh = DualVFMesh::new();
        assert_eq!(
            mesh.add_face(3, AttrMask::Inline(0b1000), 0),
            Err(TopologyError::AttributeCountExceedsDegree { face: 0, degree: 3 })
        );
    }

    #[test]
    fn test_vtx_face_attr_rotates_backwards() {
        let mut mesh = DualVFMesh::new();
        let f = mesh.add_face(4, AttrMask::Inline(0b0110), 10).unwrap();
        let bare = mesh.add_face(3, AttrMask::default(), 12).unwrap();

        // corner 0 inherits from corner 3, which inherits from corner 2
        assert_eq!(mesh.vtx_face_attr(f, 0), 11);
        assert_eq!(mesh.vtx_face_attr(f, 1), 10);
        assert_eq!(mesh.vtx_face_attr(f, 2), 11);
        assert_eq!(mesh.vtx_face_attr(f, 3), 11);
        assert_eq!(mesh.vtx_face_attr(bare, 1), -1);
    }

    #[test]
    fn test_link_closes_shared_edge() {
        let mut mesh = DualVFMesh::new();
        let v = mesh.add_vertex(3, 0, 0);
        let f0 = mesh.add_face(3, AttrMask::default(), 0).unwrap();
        let f1 = mesh.add_face(3, AttrMask::default(), 0).unwrap();
        mesh.link(v, 0, f0, 0).unwrap();
        mesh.link(v, 1, f1, 0).unwrap();

        let u = mesh.add_vertex(3, 0, 0);
        mesh.link(u, 0, f0, 2).unwrap();

        // edge (v, u) of f0 is v → u in f1
        assert_eq!(mesh.vertices_of(f1), &[v, u, NONE]);
        assert_eq!(mesh.faces_of(u), &[f0, NONE, f1]);
        assert_eq!(mesh.face_empty_slots(f1), 1);
        assert_eq!(mesh.vertex_empty_slots(u), 1);
        assert_eq!(mesh.vertex_empty_slots(v), 1);
    }

    #[test]
    fn test_link_conflict() {
        let mut mesh = DualVFMesh::new();
        let v = mesh.add_vertex(3, 0, 0);
        let other = mesh.add_vertex(3, 0, 0);
        let f = mesh.add_face(3, AttrMask::default(), 0).unwrap();
        mesh.link(v, 0, f, 0).unwrap();

        // relinking the same corner is a no-op
        mesh.link(v, 0, f, 0).unwrap();
        assert_eq!(
            mesh.link(other, 0, f, 0),
            Err(TopologyError::SlotConflict { vertex: other, face: f })
        );
        // f is already incident to v
        assert_eq!(
            mesh.link(v, 1, f, 1),
            Err(TopologyError::SlotConflict { vertex: v, face: f })
        );
    }
}
