//! Rendering side of the chunk pipeline.
//!
//! This module turns chunk data into meshes (`meshing`), runs meshing on workers
//! (`tasks`) and hands finished meshes to a `Renderer`. GPU upload and drawing live
//! behind the `Renderer` trait; `MeshRegistry` is an in-memory implementation that
//! simply keeps the latest mesh of every chunk.

use std::collections::HashMap;

use cgmath::Point3;
use log::trace;

pub mod meshing;
pub mod tasks;
pub mod vertex;

pub use meshing::mesh::{Mesh, MeshData};
pub use vertex::PackedVertex;

/// Receives finished meshes on the main thread.
pub trait Renderer {
    /// Replaces the mesh of `mesh.coordinate` (or adds it).
    fn upsert(&mut self, mesh: Mesh);

    /// Drops the mesh of an unloaded chunk. Removing an unknown chunk is a no-op.
    fn remove(&mut self, coordinate: Point3<i32>);
}

/// Keeps the current mesh of every chunk in memory.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    meshes: HashMap<Point3<i32>, Mesh>,
    upserts: u64,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coordinate: Point3<i32>) -> Option<&Mesh> {
        self.meshes.get(&coordinate)
    }

    pub fn contains(&self, coordinate: Point3<i32>) -> bool {
        self.meshes.contains_key(&coordinate)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Total number of `upsert` calls so far.
    pub fn upsert_count(&self) -> u64 {
        self.upserts
    }

    /// Sum of vertex and index bytes over all meshes.
    pub fn total_bytes(&self) -> usize {
        self.meshes
            .values()
            .flat_map(|mesh| [&mesh.opaque, &mesh.transparent])
            .map(|data| data.vertex_bytes().len() + data.index_bytes().len())
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mesh> {
        self.meshes.values()
    }
}

impl Renderer for MeshRegistry {
    fn upsert(&mut self, mesh: Mesh) {
        trace!(
            "Mesh for chunk {:?} updated ({} faces)",
            mesh.coordinate,
            mesh.face_count()
        );
        self.upserts += 1;
        self.meshes.insert(mesh.coordinate, mesh);
    }

    fn remove(&mut self, coordinate: Point3<i32>) {
        self.meshes.remove(&coordinate);
    }
}
