//! Neighbor offsets and the flags used to track which neighbors an edit touches.

use std::fmt;

use cgmath::Vector3;

use super::CHUNK_DIMENSION;

/// The 26 offsets of a chunk's neighbors: 6 faces, then 12 edges, then 8 corners.
///
/// Bit `i` of a `NeighborFlags` value refers to `NEIGHBOR_OFFSETS[i]`.
pub const NEIGHBOR_OFFSETS: [Vector3<i32>; 26] = [
    // faces
    Vector3::new(-1, 0, 0),
    Vector3::new(1, 0, 0),
    Vector3::new(0, -1, 0),
    Vector3::new(0, 1, 0),
    Vector3::new(0, 0, -1),
    Vector3::new(0, 0, 1),
    // edges
    Vector3::new(-1, -1, 0),
    Vector3::new(-1, 1, 0),
    Vector3::new(1, -1, 0),
    Vector3::new(1, 1, 0),
    Vector3::new(-1, 0, -1),
    Vector3::new(-1, 0, 1),
    Vector3::new(1, 0, -1),
    Vector3::new(1, 0, 1),
    Vector3::new(0, -1, -1),
    Vector3::new(0, -1, 1),
    Vector3::new(0, 1, -1),
    Vector3::new(0, 1, 1),
    // corners
    Vector3::new(-1, -1, -1),
    Vector3::new(-1, -1, 1),
    Vector3::new(-1, 1, -1),
    Vector3::new(-1, 1, 1),
    Vector3::new(1, -1, -1),
    Vector3::new(1, -1, 1),
    Vector3::new(1, 1, -1),
    Vector3::new(1, 1, 1),
];

/// Returns the position of `offset` in `NEIGHBOR_OFFSETS`.
pub fn neighbor_index(offset: Vector3<i32>) -> Option<usize> {
    NEIGHBOR_OFFSETS.iter().position(|candidate| *candidate == offset)
}

/// A set of neighbors, one bit per entry of `NEIGHBOR_OFFSETS`.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct NeighborFlags(u32);

impl NeighborFlags {
    const MASK: u32 = (1 << 26) - 1;

    pub const EMPTY: NeighborFlags = NeighborFlags(0);
    pub const ALL: NeighborFlags = NeighborFlags(Self::MASK);

    pub fn from_bits(bits: u32) -> Self {
        NeighborFlags(bits & Self::MASK)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn insert(&mut self, index: usize) {
        assert!(index < 26, "neighbor index {} out of range", index);
        self.0 |= 1 << index;
    }

    pub fn contains(self, index: usize) -> bool {
        index < 26 && self.0 & (1 << index) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// The offsets of every neighbor in the set, in `NEIGHBOR_OFFSETS` order.
    pub fn offsets(self) -> impl Iterator<Item = Vector3<i32>> {
        NEIGHBOR_OFFSETS
            .into_iter()
            .enumerate()
            .filter(move |(index, _)| self.contains(*index))
            .map(|(_, offset)| offset)
    }
}

impl std::ops::BitOr for NeighborFlags {
    type Output = NeighborFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        NeighborFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for NeighborFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for NeighborFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NeighborFlags({:#028b})", self.0)
    }
}

/// Which neighboring chunks must be remeshed after an edit at a local block coordinate.
///
/// Per axis the sign is -1 on the low border, +1 on the high border and 0 elsewhere.
/// Every non-zero combination of those signs is an affected neighbor, so a corner block
/// touches 7 neighbors, an edge block 3, a face block 1 and an interior block none.
///
/// # Panics
/// Panics if the coordinate is outside the chunk.
pub fn affected_neighbors(x: usize, y: usize, z: usize) -> NeighborFlags {
    assert!(
        x < CHUNK_DIMENSION && y < CHUNK_DIMENSION && z < CHUNK_DIMENSION,
        "local block coordinate ({}, {}, {}) outside the chunk",
        x,
        y,
        z
    );

    let sign = |coordinate: usize| -> i32 {
        if coordinate == 0 {
            -1
        } else if coordinate == CHUNK_DIMENSION - 1 {
            1
        } else {
            0
        }
    };
    let signs = [sign(x), sign(y), sign(z)];

    let mut flags = NeighborFlags::EMPTY;
    for (index, offset) in NEIGHBOR_OFFSETS.iter().enumerate() {
        let matches = (0..3).all(|axis| offset[axis] == 0 || offset[axis] == signs[axis]);
        if matches {
            flags.insert(index);
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LAST: usize = CHUNK_DIMENSION - 1;

    #[test]
    fn offsets_are_unique_and_grouped() {
        for (i, a) in NEIGHBOR_OFFSETS.iter().enumerate() {
            for b in &NEIGHBOR_OFFSETS[i + 1..] {
                assert_ne!(a, b);
            }
            let non_zero = (0..3).filter(|&axis| a[axis] != 0).count();
            let expected = match i {
                0..=5 => 1,
                6..=17 => 2,
                _ => 3,
            };
            assert_eq!(non_zero, expected, "offset {} {:?}", i, a);
        }
    }

    #[test]
    fn fan_out_by_position() {
        assert_eq!(affected_neighbors(5, 5, 5).len(), 0);
        assert_eq!(affected_neighbors(0, 5, 5).len(), 1);
        assert_eq!(affected_neighbors(0, LAST, 5).len(), 3);
        assert_eq!(affected_neighbors(0, 0, 0).len(), 7);
        assert_eq!(affected_neighbors(LAST, LAST, LAST).len(), 7);
    }

    #[test]
    fn corner_edit_sets_faces_edges_and_corner() {
        let flags = affected_neighbors(LAST, 0, LAST);
        let offsets: Vec<_> = flags.offsets().collect();
        assert!(offsets.contains(&Vector3::new(1, 0, 0)));
        assert!(offsets.contains(&Vector3::new(0, -1, 0)));
        assert!(offsets.contains(&Vector3::new(0, 0, 1)));
        assert!(offsets.contains(&Vector3::new(1, -1, 0)));
        assert!(offsets.contains(&Vector3::new(1, 0, 1)));
        assert!(offsets.contains(&Vector3::new(0, -1, 1)));
        assert!(offsets.contains(&Vector3::new(1, -1, 1)));
    }

    #[test]
    fn neighbor_index_matches_table() {
        assert_eq!(neighbor_index(Vector3::new(-1, 0, 0)), Some(0));
        assert_eq!(neighbor_index(Vector3::new(1, 1, 1)), Some(25));
        assert_eq!(neighbor_index(Vector3::new(0, 0, 0)), None);
    }

    proptest! {
        #[test]
        fn affected_offsets_point_out_of_the_chunk(
            x in 0..CHUNK_DIMENSION,
            y in 0..CHUNK_DIMENSION,
            z in 0..CHUNK_DIMENSION,
        ) {
            let flags = affected_neighbors(x, y, z);
            let border_axes = [x, y, z]
                .iter()
                .filter(|&&c| c == 0 || c == LAST)
                .count() as u32;
            prop_assert_eq!(flags.len(), (1usize << border_axes) - 1);

            let position = [x as i32, y as i32, z as i32];
            for offset in flags.offsets() {
                for axis in 0..3 {
                    let moved = position[axis] + offset[axis];
                    if offset[axis] != 0 {
                        prop_assert!(moved < 0 || moved >= CHUNK_DIMENSION as i32);
                    }
                }
            }
        }
    }
}
