use nalgebra::{Matrix3, Point3};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StructureError {
    #[error("structure contains no atom sites")]
    Empty,
    #[error("no mass defined for kind '{0}'")]
    MissingMass(String),
}

/// One atom site: the kind (species) name and its cartesian position.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomSite {
    pub kind: String,
    pub position: Point3<f64>,
}

impl AtomSite {
    pub fn new(kind: impl Into<String>, position: Point3<f64>) -> Self {
        Self {
            kind: kind.into(),
            position,
        }
    }
}

/// An immutable simulation cell: atom sites, a 3×3 cell matrix whose rows
/// are the lattice vectors, per-axis periodic-boundary flags and a
/// kind → mass map.
///
/// Kind ids are assigned by first appearance in the site sequence, 1-based,
/// matching the numbering the data-file writer emits and the engine reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    sites: Vec<AtomSite>,
    cell: Matrix3<f64>,
    pbc: [bool; 3],
    masses: BTreeMap<String, f64>,
}

impl Structure {
    pub fn new(
        sites: Vec<AtomSite>,
        cell: Matrix3<f64>,
        pbc: [bool; 3],
        masses: BTreeMap<String, f64>,
    ) -> Result<Self, StructureError> {
        if sites.is_empty() {
            return Err(StructureError::Empty);
        }
        for site in &sites {
            if !masses.contains_key(&site.kind) {
                return Err(StructureError::MissingMass(site.kind.clone()));
            }
        }
        Ok(Self {
            sites,
            cell,
            pbc,
            masses,
        })
    }

    pub fn sites(&self) -> &[AtomSite] {
        &self.sites
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    pub fn masses(&self) -> &BTreeMap<String, f64> {
        &self.masses
    }

    /// Kind names in first-appearance order, paired with their 1-based ids.
    pub fn kind_ids(&self) -> Vec<(String, usize)> {
        let mut kinds: Vec<(String, usize)> = Vec::new();
        for site in &self.sites {
            if !kinds.iter().any(|(kind, _)| kind == &site.kind) {
                kinds.push((site.kind.clone(), kinds.len() + 1));
            }
        }
        kinds
    }

    /// Kind names in id order.
    pub fn kind_symbols(&self) -> Vec<String> {
        self.kind_ids().into_iter().map(|(kind, _)| kind).collect()
    }

    pub fn kind_id(&self, kind: &str) -> Option<usize> {
        self.kind_ids()
            .into_iter()
            .find(|(name, _)| name == kind)
            .map(|(_, id)| id)
    }

    /// Dimensionality of the cell, counted as the number of periodic axes.
    pub fn dimensionality(&self) -> usize {
        self.pbc.iter().filter(|&&periodic| periodic).count()
    }

    /// Returns a copy with only the cell and the site positions replaced,
    /// preserving kind identity and masses. The caller guarantees that
    /// `positions` follows the original site order.
    pub fn with_snapshot(&self, cell: Matrix3<f64>, positions: &[Point3<f64>]) -> Self {
        debug_assert_eq!(positions.len(), self.sites.len());
        let sites = self
            .sites
            .iter()
            .zip(positions)
            .map(|(site, &position)| AtomSite::new(site.kind.clone(), position))
            .collect();
        Self {
            sites,
            cell,
            pbc: self.pbc,
            masses: self.masses.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Two-kind FCC-ish cell used across the script and parser tests.
    pub fn binary_cell() -> Structure {
        let sites = vec![
            AtomSite::new("Fe", Point3::new(0.0, 0.0, 0.0)),
            AtomSite::new("Fe", Point3::new(1.4, 1.4, 0.0)),
            AtomSite::new("C", Point3::new(1.4, 0.0, 1.4)),
        ];
        let cell = Matrix3::new(2.8, 0.0, 0.0, 0.0, 2.8, 0.0, 0.0, 0.0, 2.8);
        let masses = BTreeMap::from([("Fe".to_string(), 55.845), ("C".to_string(), 12.011)]);
        Structure::new(sites, cell, [true; 3], masses).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_ids_follow_first_appearance_order() {
        let structure = fixtures::binary_cell();
        assert_eq!(
            structure.kind_ids(),
            vec![("Fe".to_string(), 1), ("C".to_string(), 2)]
        );
        assert_eq!(structure.kind_id("C"), Some(2));
        assert_eq!(structure.kind_id("O"), None);
    }

    #[test]
    fn new_rejects_sites_without_a_mass() {
        let sites = vec![AtomSite::new("Xx", Point3::origin())];
        let err = Structure::new(sites, Matrix3::identity(), [true; 3], BTreeMap::new())
            .unwrap_err();
        assert_eq!(err, StructureError::MissingMass("Xx".to_string()));
    }

    #[test]
    fn dimensionality_counts_periodic_axes() {
        let mut structure = fixtures::binary_cell();
        assert_eq!(structure.dimensionality(), 3);
        structure.pbc = [true, true, false];
        assert_eq!(structure.dimensionality(), 2);
    }

    #[test]
    fn with_snapshot_replaces_cell_and_positions_only() {
        let structure = fixtures::binary_cell();
        let cell = Matrix3::new(3.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 3.0);
        let positions: Vec<_> = structure
            .sites()
            .iter()
            .map(|site| site.position + nalgebra::Vector3::new(0.1, 0.0, 0.0))
            .collect();
        let moved = structure.with_snapshot(cell, &positions);
        assert_eq!(moved.kind_symbols(), structure.kind_symbols());
        assert_eq!(moved.masses(), structure.masses());
        assert_eq!(moved.cell()[(0, 0)], 3.0);
        assert_eq!(moved.sites()[0].position.x, 0.1);
    }
}
