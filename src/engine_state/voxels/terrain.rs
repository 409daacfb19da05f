//! # Terrain Generation
//!
//! `TerrainGenerator` fills a freshly loaded chunk with blocks. Generators run inside a
//! generation job on a worker thread while the job holds the chunk's write lock, so they
//! must be `Send + Sync` and should not block.
//!
//! Multiple terrain generation strategies are provided:
//! - `PerlinTerrain`: 3D Perlin noise for caves and overhangs
//! - `FlatTerrain`: solid ground below a fixed height
//! - `CheckerboardTerrain`: alternating blocks, the worst case for meshing
//! - `SolidTerrain`: every block filled
//! - `EmptyTerrain`: all air

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::block::BlockState;
use crate::engine_state::voxels::chunk::storage::{BlockContainer, BlockStorage};
use crate::engine_state::voxels::chunk::{CHUNK_DIMENSION, CHUNK_DIMENSION_I32};

/// Threshold above which Perlin noise is considered solid for terrain generation.
pub const PERLIN_POSITIVE_THRESHOLD: f64 = 0.2;
/// Threshold below which Perlin noise is considered solid for terrain generation.
pub const PERLIN_NEGATIVE_THRESHOLD: f64 = -0.2;
/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;

/// Write access to one chunk's blocks during generation.
pub struct TerrainChunk<'a> {
    coordinate: Point3<i32>,
    storage: &'a mut BlockStorage,
}

impl<'a> TerrainChunk<'a> {
    pub fn new(coordinate: Point3<i32>, storage: &'a mut BlockStorage) -> Self {
        TerrainChunk {
            coordinate,
            storage,
        }
    }

    /// The chunk coordinate being generated.
    pub fn coordinate(&self) -> Point3<i32> {
        self.coordinate
    }

    /// World position of the chunk's local block (0, 0, 0).
    pub fn world_origin(&self) -> Point3<i32> {
        Point3::new(
            self.coordinate.x * CHUNK_DIMENSION_I32,
            self.coordinate.y * CHUNK_DIMENSION_I32,
            self.coordinate.z * CHUNK_DIMENSION_I32,
        )
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> BlockState {
        self.storage.get(x, y, z)
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, block: BlockState) {
        self.storage.set(x, y, z, block);
    }

    pub fn fill(&mut self, block: BlockState) {
        self.storage.fill(block);
    }

    /// Calls `f` for every local coordinate in storage order and stores the block it
    /// returns, if any.
    pub fn fill_with(&mut self, mut f: impl FnMut(Point3<i32>) -> Option<BlockState>) {
        let origin = self.world_origin();
        for z in 0..CHUNK_DIMENSION {
            for y in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    let world = Point3::new(
                        origin.x + x as i32,
                        origin.y + y as i32,
                        origin.z + z as i32,
                    );
                    if let Some(block) = f(world) {
                        self.storage.set(x, y, z, block);
                    }
                }
            }
        }
    }
}

/// Fills chunks with their initial blocks.
pub trait TerrainGenerator: Send + Sync {
    /// Populates an all-air chunk.
    fn populate(&self, chunk: &mut TerrainChunk<'_>);
}

/// Noise-based terrain. Blocks where the noise leaves the `[-0.2, 0.2]` band are solid;
/// the block type is picked deterministically per chunk.
pub struct PerlinTerrain {
    perlin: Perlin,
    seed: u32,
    scale: f64,
}

impl PerlinTerrain {
    const SOLID_TYPES: [BlockType; 4] = [
        BlockType::DIRT,
        BlockType::GRASS,
        BlockType::WOOD,
        BlockType::STONE,
    ];

    pub fn new(seed: u32) -> Self {
        PerlinTerrain {
            perlin: Perlin::new(seed),
            seed,
            scale: PERLIN_SCALE_FACTOR,
        }
    }

    /// Converts world block coordinates to scaled coordinates for Perlin noise sampling.
    fn to_perlin_pos(&self, position: Point3<i32>) -> [f64; 3] {
        [
            position.x as f64 * self.scale,
            position.y as f64 * self.scale,
            position.z as f64 * self.scale,
        ]
    }

    fn chunk_seed(&self, coordinate: Point3<i32>) -> u64 {
        let mut hash = self.seed as u64 ^ 0x9E37_79B9_7F4A_7C15;
        for component in [coordinate.x, coordinate.y, coordinate.z] {
            hash = (hash ^ component as u32 as u64).wrapping_mul(0x1000_0000_01B3);
        }
        hash
    }
}

impl Default for PerlinTerrain {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TerrainGenerator for PerlinTerrain {
    fn populate(&self, chunk: &mut TerrainChunk<'_>) {
        let mut rng = fastrand::Rng::with_seed(self.chunk_seed(chunk.coordinate()));
        chunk.fill_with(|world| {
            let sample = self.perlin.get(self.to_perlin_pos(world));
            if (PERLIN_NEGATIVE_THRESHOLD..=PERLIN_POSITIVE_THRESHOLD).contains(&sample) {
                None
            } else {
                let index = rng.usize(..Self::SOLID_TYPES.len());
                Some(Self::SOLID_TYPES[index].state())
            }
        });
    }
}

/// Solid ground up to (excluding) a world height, with grass on top.
pub struct FlatTerrain {
    pub ground_height: i32,
}

impl TerrainGenerator for FlatTerrain {
    fn populate(&self, chunk: &mut TerrainChunk<'_>) {
        let height = self.ground_height;
        chunk.fill_with(|world| {
            if world.y < height - 1 {
                Some(BlockType::DIRT.state())
            } else if world.y == height - 1 {
                Some(BlockType::GRASS.state())
            } else {
                None
            }
        });
    }
}

/// Alternates `block` and air on every axis. Neighboring chunks continue the pattern.
pub struct CheckerboardTerrain {
    pub block: BlockState,
}

impl TerrainGenerator for CheckerboardTerrain {
    fn populate(&self, chunk: &mut TerrainChunk<'_>) {
        let block = self.block;
        chunk.fill_with(|world| {
            if (world.x + world.y + world.z).rem_euclid(2) == 0 {
                Some(block)
            } else {
                None
            }
        });
    }
}

/// Fills every block.
pub struct SolidTerrain {
    pub block: BlockState,
}

impl TerrainGenerator for SolidTerrain {
    fn populate(&self, chunk: &mut TerrainChunk<'_>) {
        chunk.fill(self.block);
    }
}

/// Leaves chunks empty.
pub struct EmptyTerrain;

impl TerrainGenerator for EmptyTerrain {
    fn populate(&self, _chunk: &mut TerrainChunk<'_>) {}
}
