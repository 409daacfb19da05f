//! Mesh data structures handed from the mesher to the renderer.
//!
//! A `Mesh` is immutable once built: remeshing a chunk produces a new `Mesh` that
//! replaces the old one wholesale.

use cgmath::Point3;

use crate::engine_state::rendering::vertex::PackedVertex;

/// Vertices and triangle indices of one render stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshData {
    pub vertices: Vec<PackedVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Copies the used part of scratch buffers into exactly sized vectors.
    pub fn from_scratch(vertices: &[PackedVertex], indices: &[u32]) -> Self {
        MeshData {
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of quads (4 vertices, 6 indices each).
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// The vertex data as raw bytes, ready for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// The renderable geometry of one chunk.
///
/// Opaque and transparent faces are kept in separate streams so the renderer can draw
/// them in separate passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mesh {
    /// The chunk this mesh belongs to.
    pub coordinate: Point3<i32>,
    pub opaque: MeshData,
    pub transparent: MeshData,
}

impl Mesh {
    /// The mesh of a chunk without rendered blocks.
    pub fn empty(coordinate: Point3<i32>) -> Self {
        Mesh {
            coordinate,
            opaque: MeshData::default(),
            transparent: MeshData::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.opaque.face_count() + self.transparent.face_count()
    }
}
