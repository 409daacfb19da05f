//! # Chunk Lifecycle
//!
//! Every chunk walks the same sequence of generation states. All legal moves are listed
//! in `transition`; the caller performs the returned `ChunkAction`.
//!
//! ```text
//! Uninitialized -> GeneratingTerrain -> GeneratingDecoration -> GeneratingLighting
//!               -> WaitingForNeighbors -> Meshing -> Ready
//! ```
//!
//! `Ready` is the only state in which a chunk's mesh is current. Edits and arriving
//! neighbors send `Meshing` and `Ready` chunks back to `WaitingForNeighbors`.

use crate::core::error::EngineError;

/// The lifecycle state of a chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenerationState {
    Uninitialized,
    GeneratingTerrain,
    GeneratingDecoration,
    GeneratingLighting,
    WaitingForNeighbors,
    Meshing,
    Ready,
}

impl GenerationState {
    pub const ALL: [GenerationState; 7] = [
        GenerationState::Uninitialized,
        GenerationState::GeneratingTerrain,
        GenerationState::GeneratingDecoration,
        GenerationState::GeneratingLighting,
        GenerationState::WaitingForNeighbors,
        GenerationState::Meshing,
        GenerationState::Ready,
    ];

    /// Whether the chunk's block data is final enough for neighbors to mesh against.
    #[inline]
    pub fn is_terrain_ready(self) -> bool {
        self >= GenerationState::WaitingForNeighbors
    }
}

/// Something that happened to a chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChunkEvent {
    Load,
    /// The generation job could not take the write lock in time.
    GenerationFailed,
    TerrainGenerated,
    DecorationComplete,
    LightingComplete,
    /// The chunk has no rendered blocks.
    FoundEmpty,
    NeighborsReady,
    MeshingComplete,
    /// The meshing job could not take every read lock in time.
    MeshingFailed,
    /// The chunk or one of its neighbors changed and the mesh is out of date.
    Dirtied,
    Unload,
}

/// The side effect the caller must perform after a transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkAction {
    None,
    DispatchGeneration,
    DispatchMeshing,
    PublishEmptyMesh,
    PublishMesh,
    RemoveMesh,
}

/// The chunk transition table.
///
/// # Arguments
/// * `state` - The current state of the chunk
/// * `event` - The event to apply
///
/// # Returns
/// The next state and the action to perform, or `EngineError::IllegalTransition` when the
/// pair has no entry. Illegal pairs include re-entering the current state, such as
/// loading an already loaded chunk or unloading an uninitialized one.
pub fn transition(
    state: GenerationState,
    event: ChunkEvent,
) -> Result<(GenerationState, ChunkAction), EngineError> {
    use ChunkAction as A;
    use ChunkEvent as E;
    use GenerationState as S;

    let next = match (state, event) {
        (S::Uninitialized, E::Load) => (S::GeneratingTerrain, A::DispatchGeneration),
        (S::GeneratingTerrain, E::GenerationFailed) => {
            (S::GeneratingTerrain, A::DispatchGeneration)
        }
        (S::GeneratingTerrain, E::TerrainGenerated) => (S::GeneratingDecoration, A::None),
        (S::GeneratingDecoration, E::DecorationComplete) => (S::GeneratingLighting, A::None),
        (S::GeneratingLighting, E::LightingComplete) => (S::WaitingForNeighbors, A::None),
        (S::WaitingForNeighbors, E::FoundEmpty) => (S::Ready, A::PublishEmptyMesh),
        (S::WaitingForNeighbors, E::NeighborsReady) => (S::Meshing, A::DispatchMeshing),
        (S::Meshing, E::MeshingComplete) => (S::Ready, A::PublishMesh),
        (S::Meshing, E::MeshingFailed) => (S::WaitingForNeighbors, A::None),
        (S::Meshing | S::Ready, E::Dirtied) => (S::WaitingForNeighbors, A::None),
        (S::Uninitialized, E::Unload) => {
            return Err(EngineError::IllegalTransition { state, event })
        }
        (_, E::Unload) => (S::Uninitialized, A::RemoveMesh),
        _ => return Err(EngineError::IllegalTransition { state, event }),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: [ChunkEvent; 11] = [
        ChunkEvent::Load,
        ChunkEvent::GenerationFailed,
        ChunkEvent::TerrainGenerated,
        ChunkEvent::DecorationComplete,
        ChunkEvent::LightingComplete,
        ChunkEvent::FoundEmpty,
        ChunkEvent::NeighborsReady,
        ChunkEvent::MeshingComplete,
        ChunkEvent::MeshingFailed,
        ChunkEvent::Dirtied,
        ChunkEvent::Unload,
    ];

    fn walk(events: &[ChunkEvent]) -> GenerationState {
        events
            .iter()
            .fold(GenerationState::Uninitialized, |state, &event| {
                transition(state, event).unwrap().0
            })
    }

    #[test]
    fn full_lifecycle_reaches_ready() {
        let state = walk(&[
            ChunkEvent::Load,
            ChunkEvent::TerrainGenerated,
            ChunkEvent::DecorationComplete,
            ChunkEvent::LightingComplete,
            ChunkEvent::NeighborsReady,
            ChunkEvent::MeshingComplete,
        ]);
        assert_eq!(state, GenerationState::Ready);
    }

    #[test]
    fn generation_retry_redispatches() {
        assert_eq!(
            transition(GenerationState::GeneratingTerrain, ChunkEvent::GenerationFailed).unwrap(),
            (GenerationState::GeneratingTerrain, ChunkAction::DispatchGeneration)
        );
    }

    #[test]
    fn empty_chunk_skips_meshing() {
        assert_eq!(
            transition(GenerationState::WaitingForNeighbors, ChunkEvent::FoundEmpty).unwrap(),
            (GenerationState::Ready, ChunkAction::PublishEmptyMesh)
        );
    }

    #[test]
    fn unload_is_legal_from_every_loaded_state() {
        for state in GenerationState::ALL {
            let result = transition(state, ChunkEvent::Unload);
            if state == GenerationState::Uninitialized {
                assert!(result.is_err());
            } else {
                assert_eq!(
                    result.unwrap(),
                    (GenerationState::Uninitialized, ChunkAction::RemoveMesh)
                );
            }
        }
    }

    #[test]
    fn loading_twice_is_illegal() {
        let result = transition(GenerationState::Ready, ChunkEvent::Load);
        assert!(matches!(
            result,
            Err(EngineError::IllegalTransition {
                state: GenerationState::Ready,
                event: ChunkEvent::Load
            })
        ));
    }

    #[test]
    fn dirtying_only_applies_to_meshed_states() {
        for state in GenerationState::ALL {
            let result = transition(state, ChunkEvent::Dirtied);
            match state {
                GenerationState::Meshing | GenerationState::Ready => {
                    assert_eq!(result.unwrap().0, GenerationState::WaitingForNeighbors)
                }
                _ => assert!(result.is_err(), "{:?}", state),
            }
        }
    }

    #[test]
    fn table_has_exactly_the_listed_entries() {
        let legal = GenerationState::ALL
            .iter()
            .flat_map(|&state| EVENTS.iter().map(move |&event| (state, event)))
            .filter(|&(state, event)| transition(state, event).is_ok())
            .count();
        // nine single entries, Dirtied from two states, Unload from six
        assert_eq!(legal, 9 + 2 + 6);
    }

    #[test]
    fn terrain_readiness() {
        assert!(!GenerationState::GeneratingLighting.is_terrain_ready());
        assert!(GenerationState::WaitingForNeighbors.is_terrain_ready());
        assert!(GenerationState::Meshing.is_terrain_ready());
        assert!(GenerationState::Ready.is_terrain_ready());
    }
}
