//! Read-only per-step trajectory cache.
//!
//! Each appended step keeps its raw dump text as an independent zstd frame,
//! so random access to one step never touches the others. The store is
//! built once from a completed run's dump and is immutable afterwards; the
//! natoms/field-set invariant is enforced at append time, so readers never
//! see a mismatched step.

use crate::core::models::structure::Structure;
use crate::parse::trajectory::{TrajectoryError, TrajectoryStep, parse_step_block, parse_trajectory};
use thiserror::Error;
use tracing::debug;

const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
    #[error("step {index} has {found} atoms, the store holds steps of {expected}")]
    AtomCountMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("step {index} carries fields [{found}], the store holds [{expected}]")]
    FieldSetMismatch {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("step index {index} out of range, store holds {len} steps")]
    OutOfRange { index: usize, len: usize },
    #[error("step compression failed: {0}")]
    Compression(#[source] std::io::Error),
}

#[derive(Debug)]
struct CompressedStep {
    timestep: i64,
    frame: Vec<u8>,
}

/// An ordered, independently addressable sequence of trajectory steps.
#[derive(Debug)]
pub struct TrajectoryStore {
    steps: Vec<CompressedStep>,
    natoms: usize,
    field_names: Vec<String>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            natoms: 0,
            field_names: Vec::new(),
        }
    }

    /// Builds a store from a whole dump file, enforcing the cross-step
    /// invariants as each step is appended.
    pub fn from_dump_text(text: &str) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for step in parse_trajectory(text) {
            let (raw, step) = step?;
            store.append(raw, &step)?;
        }
        debug!(steps = store.len(), natoms = store.natoms, "trajectory store built");
        Ok(store)
    }

    /// Appends one already parsed step together with its raw text.
    pub fn append(&mut self, raw: &str, step: &TrajectoryStep) -> Result<(), StoreError> {
        let index = self.steps.len();
        if index == 0 {
            self.natoms = step.natoms;
            self.field_names = step.field_names.clone();
        } else {
            if step.natoms != self.natoms {
                return Err(StoreError::AtomCountMismatch {
                    index,
                    expected: self.natoms,
                    found: step.natoms,
                });
            }
            if step.field_names != self.field_names {
                return Err(StoreError::FieldSetMismatch {
                    index,
                    expected: self.field_names.join(" "),
                    found: step.field_names.join(" "),
                });
            }
        }
        let frame = zstd::encode_all(raw.as_bytes(), COMPRESSION_LEVEL)
            .map_err(StoreError::Compression)?;
        self.steps.push(CompressedStep {
            timestep: step.timestep,
            frame,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn natoms(&self) -> usize {
        self.natoms
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Timestep numbers of all stored steps, in order.
    pub fn timesteps(&self) -> Vec<i64> {
        self.steps.iter().map(|step| step.timestep).collect()
    }

    fn frame(&self, index: usize) -> Result<&CompressedStep, StoreError> {
        self.steps.get(index).ok_or(StoreError::OutOfRange {
            index,
            len: self.steps.len(),
        })
    }

    /// Raw dump text of one step.
    pub fn step_text(&self, index: usize) -> Result<String, StoreError> {
        let frame = self.frame(index)?;
        let bytes = zstd::decode_all(frame.frame.as_slice()).map_err(StoreError::Compression)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Parsed step at `index`.
    pub fn step(&self, index: usize) -> Result<TrajectoryStep, StoreError> {
        let text = self.step_text(index)?;
        Ok(parse_step_block(&text, index)?)
    }

    /// Structure snapshot at `index`; see
    /// [`TrajectoryStep::to_structure`] for the role of `original`.
    pub fn structure(
        &self,
        index: usize,
        original: Option<&Structure>,
    ) -> Result<Structure, StoreError> {
        Ok(self.step(index)?.to_structure(original)?)
    }
}

impl Default for TrajectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::fixtures::binary_cell;

    const DUMP: &str = "\
ITEM: TIMESTEP
0
ITEM: NUMBER OF ATOMS
3
ITEM: BOX BOUNDS pp pp pp
0.0 2.8
0.0 2.8
0.0 2.8
ITEM: ATOMS id type element x y z
1 1 Fe 0.0 0.0 0.0
2 1 Fe 1.4 1.4 0.0
3 2 C 1.4 0.0 1.4
ITEM: TIMESTEP
10
ITEM: NUMBER OF ATOMS
3
ITEM: BOX BOUNDS pp pp pp
0.0 2.8
0.0 2.8
0.0 2.8
ITEM: ATOMS id type element x y z
1 1 Fe 0.2 0.0 0.0
2 1 Fe 1.6 1.4 0.0
3 2 C 1.6 0.0 1.4
";

    #[test]
    fn from_dump_text_round_trips_every_step() {
        let store = TrajectoryStore::from_dump_text(DUMP).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.natoms(), 3);
        assert_eq!(store.timesteps(), vec![0, 10]);
        assert_eq!(
            store.field_names(),
            &["id", "type", "element", "x", "y", "z"]
        );

        let step = store.step(1).unwrap();
        assert_eq!(step.timestep, 10);
        assert_eq!(step.numeric_field("x").unwrap()[0], 0.2);
        for field in store.field_names() {
            assert_eq!(step.field(field).unwrap().len(), store.natoms());
        }

        let text = store.step_text(0).unwrap();
        assert!(text.starts_with("ITEM: TIMESTEP"));
        assert!(text.contains("1 1 Fe 0.0 0.0 0.0"));
    }

    #[test]
    fn append_rejects_a_diverging_atom_count() {
        let diverging = DUMP.replacen("ITEM: NUMBER OF ATOMS\n3\nITEM: BOX BOUNDS pp pp pp\n0.0 2.8\n0.0 2.8\n0.0 2.8\nITEM: ATOMS id type element x y z\n1 1 Fe 0.2 0.0 0.0\n2 1 Fe 1.6 1.4 0.0\n3 2 C 1.6 0.0 1.4\n", "ITEM: NUMBER OF ATOMS\n2\nITEM: BOX BOUNDS pp pp pp\n0.0 2.8\n0.0 2.8\n0.0 2.8\nITEM: ATOMS id type element x y z\n1 1 Fe 0.2 0.0 0.0\n2 1 Fe 1.6 1.4 0.0\n", 1);
        let err = TrajectoryStore::from_dump_text(&diverging).unwrap_err();
        assert!(matches!(
            err,
            StoreError::AtomCountMismatch {
                index: 1,
                expected: 3,
                found: 2,
            }
        ));
    }

    #[test]
    fn append_rejects_a_diverging_field_set() {
        let diverging = DUMP.replacen(
            "ITEM: ATOMS id type element x y z\n1 1 Fe 0.2",
            "ITEM: ATOMS id element x y z\n1 Fe 0.2",
            1,
        );
        // drop one token from the remaining rows of the second step
        let diverging = diverging
            .replacen("2 1 Fe 1.6 1.4 0.0", "2 Fe 1.6 1.4 0.0", 1)
            .replacen("3 2 C 1.6 0.0 1.4", "3 C 1.6 0.0 1.4", 1);
        let err = TrajectoryStore::from_dump_text(&diverging).unwrap_err();
        assert!(matches!(err, StoreError::FieldSetMismatch { index: 1, .. }));
    }

    #[test]
    fn structure_snapshot_inherits_the_original_kinds() {
        let store = TrajectoryStore::from_dump_text(DUMP).unwrap();
        let original = binary_cell();
        let snapshot = store.structure(1, Some(&original)).unwrap();
        assert_eq!(snapshot.kind_symbols(), original.kind_symbols());
        assert_eq!(snapshot.sites()[0].position.x, 0.2);

        let fresh = store.structure(0, None).unwrap();
        assert_eq!(fresh.masses()["C"], 12.011);
    }

    #[test]
    fn out_of_range_index_is_reported_with_the_store_size() {
        let store = TrajectoryStore::from_dump_text(DUMP).unwrap();
        let err = store.step(5).unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange { index: 5, len: 2 }));
    }
}
