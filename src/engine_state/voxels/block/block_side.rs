//! # Block Side Module
//!
//! This module defines the six faces of a voxel block, their outward normals and the
//! unit-cube corners each face is built from.

use cgmath::Vector3;
use num_derive::FromPrimitive;

/// Represents the six possible faces of a voxel block.
///
/// Each variant is assigned a unique integer value which doubles as the face normal id
/// stored in packed vertices (3 bits).
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, FromPrimitive)]
pub enum BlockSide {
    /// The face pointing towards negative X
    FRONT = 0,

    /// The face pointing towards positive X
    BACK = 1,

    /// The face pointing towards negative Y
    BOTTOM = 2,

    /// The face pointing towards positive Y
    TOP = 3,

    /// The face pointing towards negative Z
    LEFT = 4,

    /// The face pointing towards positive Z
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    ///
    /// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Decodes a face normal id as stored in a packed vertex.
    pub fn from_normal_id(id: u32) -> Option<BlockSide> {
        num::FromPrimitive::from_u32(id)
    }

    /// The outward unit normal of this face.
    pub fn normal(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(-1, 0, 0),
            BlockSide::BACK => Vector3::new(1, 0, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::LEFT => Vector3::new(0, 0, -1),
            BlockSide::RIGHT => Vector3::new(0, 0, 1),
        }
    }

    /// The index (0 = x, 1 = y, 2 = z) of the axis this face is perpendicular to.
    pub fn axis(self) -> usize {
        match self {
            BlockSide::FRONT | BlockSide::BACK => 0,
            BlockSide::BOTTOM | BlockSide::TOP => 1,
            BlockSide::LEFT | BlockSide::RIGHT => 2,
        }
    }

    /// The four corners of this face on the unit cube, in the order
    /// lower-left, lower-right, upper-left, upper-right.
    ///
    /// Triangles `(0, 1, 3)` and `(0, 3, 2)` (or `(0, 1, 2)` and `(1, 3, 2)`) are
    /// counter-clockwise when seen from outside the block.
    pub fn corners(self) -> [Vector3<i32>; 4] {
        match self {
            BlockSide::FRONT => [
                Vector3::new(0, 0, 0),
                Vector3::new(0, 0, 1),
                Vector3::new(0, 1, 0),
                Vector3::new(0, 1, 1),
            ],
            BlockSide::BACK => [
                Vector3::new(1, 0, 1),
                Vector3::new(1, 0, 0),
                Vector3::new(1, 1, 1),
                Vector3::new(1, 1, 0),
            ],
            BlockSide::BOTTOM => [
                Vector3::new(0, 0, 1),
                Vector3::new(0, 0, 0),
                Vector3::new(1, 0, 1),
                Vector3::new(1, 0, 0),
            ],
            BlockSide::TOP => [
                Vector3::new(0, 1, 0),
                Vector3::new(0, 1, 1),
                Vector3::new(1, 1, 0),
                Vector3::new(1, 1, 1),
            ],
            BlockSide::LEFT => [
                Vector3::new(1, 0, 0),
                Vector3::new(0, 0, 0),
                Vector3::new(1, 1, 0),
                Vector3::new(0, 1, 0),
            ],
            BlockSide::RIGHT => [
                Vector3::new(0, 0, 1),
                Vector3::new(1, 0, 1),
                Vector3::new(0, 1, 1),
                Vector3::new(1, 1, 1),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    fn cross(a: Vector3<i32>, b: Vector3<i32>) -> Vector3<i32> {
        Vector3::new(
            a.y * b.z - a.z * b.y,
            a.z * b.x - a.x * b.z,
            a.x * b.y - a.y * b.x,
        )
    }

    #[test]
    fn corner_winding_faces_outwards() {
        for side in BlockSide::all() {
            let [ll, lr, ul, ur] = side.corners();
            assert_eq!(cross(lr - ll, ur - ll), side.normal(), "{:?}", side);
            assert_eq!(cross(ur - ll, ul - ll), side.normal(), "{:?}", side);
            assert_eq!(cross(lr - ll, ul - ll), side.normal(), "{:?}", side);
            assert_eq!(cross(ur - lr, ul - lr), side.normal(), "{:?}", side);
        }
    }

    #[test]
    fn normal_ids_round_trip() {
        for side in BlockSide::all() {
            assert_eq!(BlockSide::from_normal_id(side as u32), Some(side));
        }
        assert_eq!(BlockSide::from_normal_id(6), None);
    }
}
