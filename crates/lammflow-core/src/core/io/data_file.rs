//! Writer for the LAMMPS `read_data` structure file.
//!
//! The format is a fixed-section text file: a counts header, box bounds, an
//! optional tilt line, a `Masses` section and an `Atoms` table with 1-based
//! ids. LAMMPS requires the cell matrix in lower-triangular form with
//! positive diagonal; cells that are not are canonicalized from their
//! lengths and angles, with the site positions remapped through fractional
//! coordinates so the geometry is preserved.

use crate::core::models::potential::AtomStyle;
use crate::core::models::structure::Structure;
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

const TILT_EPS: f64 = 1e-10;

#[derive(Debug, Error, PartialEq)]
pub enum DataFileError {
    #[error("cell is degenerate and cannot be written as a LAMMPS box: {0:?}")]
    DegenerateCell(Box<Matrix3<f64>>),
}

fn is_lower_triangular(cell: &Matrix3<f64>) -> bool {
    cell[(0, 1)].abs() < TILT_EPS && cell[(0, 2)].abs() < TILT_EPS && cell[(1, 2)].abs() < TILT_EPS
}

/// Rebuilds a cell in the canonical LAMMPS orientation (a along x, b in the
/// xy plane) from the lattice lengths and angles.
fn canonical_cell(cell: &Matrix3<f64>) -> Matrix3<f64> {
    let a_vec = Vector3::new(cell[(0, 0)], cell[(0, 1)], cell[(0, 2)]);
    let b_vec = Vector3::new(cell[(1, 0)], cell[(1, 1)], cell[(1, 2)]);
    let c_vec = Vector3::new(cell[(2, 0)], cell[(2, 1)], cell[(2, 2)]);

    let a = a_vec.norm();
    let b = b_vec.norm();
    let c = c_vec.norm();
    let cos_alpha = b_vec.dot(&c_vec) / (b * c);
    let cos_beta = a_vec.dot(&c_vec) / (a * c);
    let cos_gamma = a_vec.dot(&b_vec) / (a * b);

    let xy = b * cos_gamma;
    let xz = c * cos_beta;
    let yy = (b * b - xy * xy).sqrt();
    let yz = (b * c * cos_alpha - xy * xz) / yy;
    let zz = (c * c - xz * xz - yz * yz).sqrt();

    Matrix3::new(a, 0.0, 0.0, xy, yy, 0.0, xz, yz, zz)
}

/// Converts a cartesian position to fractional coordinates of `cell` (rows
/// are lattice vectors).
fn to_fractional(cell: &Matrix3<f64>, position: &Point3<f64>) -> Option<Vector3<f64>> {
    // p = A^T f  =>  f = (A^T)^-1 p
    cell.transpose()
        .try_inverse()
        .map(|inverse| inverse * position.coords)
}

/// Renders the `read_data` file content for a structure.
///
/// `charges` supplies the per-kind charge column when the atom style is
/// `charge`; kinds without an entry default to 0.
pub fn write_structure_data(
    structure: &Structure,
    atom_style: AtomStyle,
    charges: &BTreeMap<String, f64>,
    comment: &str,
) -> Result<String, DataFileError> {
    let original_cell = *structure.cell();
    let (cell, positions): (Matrix3<f64>, Vec<Point3<f64>>) = if is_lower_triangular(&original_cell)
    {
        (
            original_cell,
            structure.sites().iter().map(|site| site.position).collect(),
        )
    } else {
        let canonical = canonical_cell(&original_cell);
        let mut remapped = Vec::with_capacity(structure.sites().len());
        for site in structure.sites() {
            let fractional = to_fractional(&original_cell, &site.position)
                .ok_or(DataFileError::DegenerateCell(Box::new(original_cell)))?;
            remapped.push(Point3::from(canonical.transpose() * fractional));
        }
        (canonical, remapped)
    };

    if !cell[(0, 0)].is_finite()
        || !cell[(1, 1)].is_finite()
        || !cell[(2, 2)].is_finite()
        || cell[(0, 0)] < TILT_EPS
        || cell[(1, 1)] < TILT_EPS
        || cell[(2, 2)] < TILT_EPS
    {
        return Err(DataFileError::DegenerateCell(Box::new(original_cell)));
    }

    let kind_ids = structure.kind_ids();
    let masses = structure.masses();

    let mut content = String::new();
    let _ = writeln!(content, "# {comment}\n");
    let _ = writeln!(content, "{} atoms", structure.sites().len());
    let _ = writeln!(content, "{} atom types\n", kind_ids.len());

    let _ = writeln!(content, "0.0 {:20.10} xlo xhi", cell[(0, 0)]);
    let _ = writeln!(content, "0.0 {:20.10} ylo yhi", cell[(1, 1)]);
    let _ = writeln!(content, "0.0 {:20.10} zlo zhi", cell[(2, 2)]);

    let (xy, xz, yz) = (cell[(1, 0)], cell[(2, 0)], cell[(2, 1)]);
    if xy.abs() > TILT_EPS || xz.abs() > TILT_EPS || yz.abs() > TILT_EPS {
        let _ = writeln!(content, "{xy:20.10} {xz:20.10} {yz:20.10} xy xz yz");
    }

    let _ = writeln!(content, "\nMasses\n");
    for (kind, id) in &kind_ids {
        // kinds were validated against the mass map at construction
        let _ = writeln!(content, "{id} {:20.10}", masses[kind]);
    }

    let _ = writeln!(content, "\nAtoms\n");
    for (index, (site, position)) in structure.sites().iter().zip(&positions).enumerate() {
        let kind_id = kind_ids
            .iter()
            .find(|(kind, _)| kind == &site.kind)
            .map(|(_, id)| *id)
            .unwrap_or(0);
        match atom_style {
            AtomStyle::Atomic => {
                let _ = writeln!(
                    content,
                    "{} {} {:20.10} {:20.10} {:20.10}",
                    index + 1,
                    kind_id,
                    position.x,
                    position.y,
                    position.z
                );
            }
            AtomStyle::Charge => {
                let charge = charges.get(&site.kind).copied().unwrap_or(0.0);
                let _ = writeln!(
                    content,
                    "{} {} {} {:20.10} {:20.10} {:20.10}",
                    index + 1,
                    kind_id,
                    charge,
                    position.x,
                    position.y,
                    position.z
                );
            }
        }
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::fixtures::binary_cell;
    use crate::core::models::structure::{AtomSite, Structure};

    #[test]
    fn orthogonal_cell_writes_counts_bounds_masses_and_atoms() {
        let content =
            write_structure_data(&binary_cell(), AtomStyle::Atomic, &BTreeMap::new(), "test")
                .unwrap();

        assert!(content.starts_with("# test\n"));
        assert!(content.contains("3 atoms"));
        assert!(content.contains("2 atom types"));
        assert!(content.contains("xlo xhi"));
        assert!(!content.contains("xy xz yz"));
        assert!(content.contains("Masses"));
        assert!(content.contains("Atoms"));
        // first site: id 1, kind 1, at the origin
        assert!(content.lines().any(|line| line.starts_with("1 1 ")));
    }

    #[test]
    fn charge_atom_style_inserts_the_charge_column() {
        let charges = BTreeMap::from([("Fe".to_string(), 1.5), ("C".to_string(), -0.5)]);
        let content =
            write_structure_data(&binary_cell(), AtomStyle::Charge, &charges, "test").unwrap();
        let atoms_line = content
            .lines()
            .find(|line| line.starts_with("1 1 "))
            .unwrap();
        assert!(atoms_line.starts_with("1 1 1.5 "));
    }

    #[test]
    fn lower_triangular_cell_keeps_its_tilt_factors() {
        let mut structure = binary_cell();
        let tilted = Matrix3::new(2.8, 0.0, 0.0, 0.9, 2.8, 0.0, 0.0, 0.0, 2.8);
        structure = Structure::new(
            structure.sites().to_vec(),
            tilted,
            structure.pbc(),
            structure.masses().clone(),
        )
        .unwrap();
        let content =
            write_structure_data(&structure, AtomStyle::Atomic, &BTreeMap::new(), "test").unwrap();
        assert!(content.contains("xy xz yz"));
    }

    #[test]
    fn upper_triangular_cell_is_canonicalized() {
        // b has a component along x stored in the "wrong" triangle
        let cell = Matrix3::new(2.8, 0.9, 0.0, 0.0, 2.8, 0.0, 0.0, 0.0, 2.8);
        let sites = vec![AtomSite::new("Fe", Point3::new(0.5, 0.5, 0.5))];
        let masses = BTreeMap::from([("Fe".to_string(), 55.845)]);
        let structure = Structure::new(sites, cell, [true; 3], masses).unwrap();

        let content =
            write_structure_data(&structure, AtomStyle::Atomic, &BTreeMap::new(), "test").unwrap();
        // lengths survive the rotation: |a| = sqrt(2.8^2 + 0.9^2)
        let expected_a = (2.8f64 * 2.8 + 0.9 * 0.9).sqrt();
        let xhi_line = content
            .lines()
            .find(|line| line.contains("xlo xhi"))
            .unwrap();
        let xhi: f64 = xhi_line.split_whitespace().nth(1).unwrap().parse().unwrap();
        assert!((xhi - expected_a).abs() < 1e-9);
        assert!(content.contains("xy xz yz"));
    }

    #[test]
    fn degenerate_cell_is_rejected() {
        let cell = Matrix3::new(2.8, 0.1, 0.0, 2.8, 0.1, 0.0, 0.0, 0.0, 2.8);
        let sites = vec![AtomSite::new("Fe", Point3::origin())];
        let masses = BTreeMap::from([("Fe".to_string(), 55.845)]);
        let structure = Structure::new(sites, cell, [true; 3], masses).unwrap();
        let err = write_structure_data(&structure, AtomStyle::Atomic, &BTreeMap::new(), "test")
            .unwrap_err();
        assert!(matches!(err, DataFileError::DegenerateCell(_)));
    }
}
