use proptest::prelude::*;

use voxel_streamer::engine_state::rendering::vertex::{PackedVertex, VertexAttributes};
use voxel_streamer::engine_state::voxels::block::block_side::BlockSide;

fn side() -> impl Strategy<Value = BlockSide> {
    prop::sample::select(BlockSide::all().to_vec())
}

fn attributes() -> impl Strategy<Value = VertexAttributes> {
    (
        [0u32..=32, 0u32..=32, 0u32..=32],
        0u32..512,
        0u32..32,
        0u32..4096,
        0u32..32,
        side(),
        0u32..4,
        0u32..4,
    )
        .prop_map(
            |(position, light_color, light_level, texture_index, skylight, normal, uv_corner, ao)| {
                VertexAttributes {
                    position,
                    light_color,
                    light_level,
                    texture_index,
                    skylight,
                    normal,
                    uv_corner,
                    ao,
                }
            },
        )
}

proptest! {
    #[test]
    fn packing_round_trips(attributes in attributes()) {
        prop_assert_eq!(PackedVertex::pack(&attributes).unpack(), attributes);
    }
}

#[test]
fn boundary_values_round_trip() {
    let attributes = VertexAttributes {
        position: [32, 32, 32],
        light_color: 511,
        light_level: 31,
        texture_index: 4095,
        skylight: 31,
        normal: BlockSide::from_normal_id(5).unwrap(),
        uv_corner: 3,
        ao: 3,
    };
    let packed = PackedVertex::pack(&attributes);
    assert_eq!(packed.unpack(), attributes);
    // every field at its maximum leaves the unused top bits of word 1 clear
    assert_eq!(packed.words[1] >> 24, 0);

    let zero = VertexAttributes {
        position: [0, 0, 0],
        light_color: 0,
        light_level: 0,
        texture_index: 0,
        skylight: 0,
        normal: BlockSide::from_normal_id(0).unwrap(),
        uv_corner: 0,
        ao: 0,
    };
    assert_eq!(PackedVertex::pack(&zero).words, [0, 0]);
}

#[test]
#[should_panic(expected = "light_level")]
fn light_level_overflow_panics() {
    let mut attributes = VertexAttributes::unlit([0, 0, 0], 0, BlockSide::TOP, 0, 0);
    attributes.light_level = 32;
    PackedVertex::pack(&attributes);
}
