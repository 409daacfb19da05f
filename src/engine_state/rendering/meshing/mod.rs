//! Mesh generation for voxel chunks.
//!
//! This module turns a chunk's block data into bit-packed triangle geometry. The key
//! goals are:
//! 1. Never emit a face that cannot be seen
//! 2. Bake per-vertex ambient occlusion into the vertex
//! 3. Never allocate while meshing
//!
//! # Architecture
//! - `MeshingDataCache`: padded copy of the chunk and its neighbors' border cells
//! - `MeshBuilder`: culls faces, computes AO and packs vertices into scratch buffers
//! - `Mesh`: the exact-size result handed to the renderer
//!
//! # Face culling
//! A face is emitted when the block on the other side is not opaque. Two transparent
//! blocks facing each other emit nothing, so each cell boundary carries at most one
//! face and `MAX_VISIBLE_FACES` bounds any chunk.
//!
//! # Ambient occlusion
//! For each face corner the mesher samples the two edge cells and the diagonal cell
//! in the layer in front of the face and counts opaque ones (see `ambient_occlusion`).
//! Quads whose occlusion differs across the default diagonal are split along the other
//! one so the darker corners are not smeared across the face.

use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;
use crate::engine_state::voxels::block::{BlockRegistry, BlockState, RenderCategory};
use crate::engine_state::voxels::chunk::{CHUNK_DIMENSION, CHUNK_PLANE_SIZE};

use super::vertex::{PackedVertex, VertexAttributes};
use mesh::{Mesh, MeshData};
use meshing_data_cache::MeshingDataCache;

pub mod mesh;
pub mod meshing_data_cache;

/// Worst-case number of faces in one chunk: one per cell boundary along each axis.
pub const MAX_VISIBLE_FACES: usize = 3 * CHUNK_PLANE_SIZE * (CHUNK_DIMENSION + 1);

const VERTICES_PER_FACE: usize = 4;
const INDICES_PER_FACE: usize = 6;

/// Occlusion value of a face corner.
///
/// # Arguments
/// * `side1`, `side2` - Whether the two edge-adjacent cells are opaque
/// * `corner` - Whether the diagonal cell is opaque
///
/// # Returns
/// 0 (darkest) to 3 (unoccluded). Two opaque edges fully occlude the corner whatever the
/// diagonal holds.
#[inline]
pub fn ambient_occlusion(side1: bool, side2: bool, corner: bool) -> u32 {
    if side1 && side2 {
        return 0;
    }
    3 - (side1 as u32 + side2 as u32 + corner as u32)
}

/// Whether `block`'s face towards `neighbor` can be seen.
#[inline]
fn face_visible(block: BlockState, neighbor: BlockState) -> bool {
    match neighbor.category {
        RenderCategory::None => true,
        RenderCategory::Opaque => false,
        RenderCategory::Transparent => block.category != RenderCategory::Transparent,
    }
}

/// The two axes spanning a face perpendicular to `axis`.
#[inline]
fn tangent_axes(axis: usize) -> (usize, usize) {
    match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Reusable scratch buffers for meshing one chunk at a time.
///
/// Each worker owns one builder. The buffers are sized for `MAX_VISIBLE_FACES` up
/// front and only ever cleared, so meshing never reallocates.
pub struct MeshBuilder {
    opaque_vertices: Vec<PackedVertex>,
    opaque_indices: Vec<u32>,
    transparent_vertices: Vec<PackedVertex>,
    transparent_indices: Vec<u32>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        MeshBuilder {
            opaque_vertices: Vec::with_capacity(MAX_VISIBLE_FACES * VERTICES_PER_FACE),
            opaque_indices: Vec::with_capacity(MAX_VISIBLE_FACES * INDICES_PER_FACE),
            transparent_vertices: Vec::with_capacity(MAX_VISIBLE_FACES * VERTICES_PER_FACE),
            transparent_indices: Vec::with_capacity(MAX_VISIBLE_FACES * INDICES_PER_FACE),
        }
    }

    /// Current capacities of the scratch buffers, in the order opaque vertices, opaque
    /// indices, transparent vertices, transparent indices.
    pub fn scratch_capacity(&self) -> [usize; 4] {
        [
            self.opaque_vertices.capacity(),
            self.opaque_indices.capacity(),
            self.transparent_vertices.capacity(),
            self.transparent_indices.capacity(),
        ]
    }

    /// Empties the scratch buffers, keeping their allocation.
    pub fn clear(&mut self) {
        self.opaque_vertices.clear();
        self.opaque_indices.clear();
        self.transparent_vertices.clear();
        self.transparent_indices.clear();
    }

    /// Meshes the chunk held in `cache`.
    ///
    /// # Arguments
    /// * `coordinate` - The chunk being meshed
    /// * `cache` - The chunk's blocks plus the neighbor shell
    /// * `registry` - Texture lookup for block ids
    ///
    /// # Returns
    /// An exactly sized `Mesh`.
    pub fn build(
        &mut self,
        coordinate: Point3<i32>,
        cache: &MeshingDataCache,
        registry: &BlockRegistry,
    ) -> Mesh {
        self.clear();
        let size = CHUNK_DIMENSION as i32;

        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let block = cache.get(x, y, z);
                    if !block.is_rendered() {
                        continue;
                    }

                    for side in BlockSide::all() {
                        let normal = side.normal();
                        let neighbor = cache.get(x + normal.x, y + normal.y, z + normal.z);
                        if face_visible(block, neighbor) {
                            self.push_face(cache, registry, [x, y, z], block, side);
                        }
                    }
                }
            }
        }

        self.create_mesh(coordinate)
    }

    fn push_face(
        &mut self,
        cache: &MeshingDataCache,
        registry: &BlockRegistry,
        position: [i32; 3],
        block: BlockState,
        side: BlockSide,
    ) {
        let normal = side.normal();
        let front = [
            position[0] + normal.x,
            position[1] + normal.y,
            position[2] + normal.z,
        ];
        let (t1, t2) = tangent_axes(side.axis());
        let opaque_at = |cell: [i32; 3]| cache.get(cell[0], cell[1], cell[2]).is_opaque();
        let texture_index = registry.texture_index(block.id, side) as u32;

        let mut ao = [0u32; 4];
        let mut vertices = [PackedVertex::default(); 4];
        for (uv_corner, corner) in side.corners().iter().enumerate() {
            let s1 = 2 * corner[t1] - 1;
            let s2 = 2 * corner[t2] - 1;

            let mut edge1 = front;
            edge1[t1] += s1;
            let mut edge2 = front;
            edge2[t2] += s2;
            let mut diagonal = edge1;
            diagonal[t2] += s2;

            ao[uv_corner] =
                ambient_occlusion(opaque_at(edge1), opaque_at(edge2), opaque_at(diagonal));

            let vertex_position = [
                (position[0] + corner.x) as u32,
                (position[1] + corner.y) as u32,
                (position[2] + corner.z) as u32,
            ];
            vertices[uv_corner] = PackedVertex::pack(&VertexAttributes::unlit(
                vertex_position,
                texture_index,
                side,
                uv_corner as u32,
                ao[uv_corner],
            ));
        }

        let (target_vertices, target_indices) = match block.category {
            RenderCategory::Transparent => {
                (&mut self.transparent_vertices, &mut self.transparent_indices)
            }
            _ => (&mut self.opaque_vertices, &mut self.opaque_indices),
        };
        debug_assert!(target_vertices.len() + VERTICES_PER_FACE <= target_vertices.capacity());

        let base = target_vertices.len() as u32;
        target_vertices.extend_from_slice(&vertices);

        // corners are ll = 0, lr = 1, ul = 2, ur = 3
        let quad = if ao[0] + ao[3] < ao[1] + ao[2] {
            [0, 1, 2, 1, 3, 2]
        } else {
            [0, 1, 3, 0, 3, 2]
        };
        target_indices.extend(quad.iter().map(|offset| base + offset));
    }

    /// Copies the scratch buffers into an exactly sized `Mesh`.
    pub fn create_mesh(&self, coordinate: Point3<i32>) -> Mesh {
        Mesh {
            coordinate,
            opaque: MeshData::from_scratch(&self.opaque_vertices, &self.opaque_indices),
            transparent: MeshData::from_scratch(
                &self.transparent_vertices,
                &self.transparent_indices,
            ),
        }
    }
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}
