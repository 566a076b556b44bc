//! Strict parser for the per-step trajectory dump.
//!
//! The dump is machine-written with a fixed 9-line header skeleton per
//! step, so unlike the console log every deviation is a structural error.
//! Steps are exposed through a lazy iterator; a store can compress each
//! step's raw text independently without materializing the whole file.

use crate::core::models::structure::{AtomSite, Structure, StructureError};
use crate::core::tables::ATOMIC_MASSES;
use nalgebra::{Matrix3, Point3};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TrajectoryError {
    #[error("step {index}: missing header line '{expected}'")]
    MissingHeader { index: usize, expected: &'static str },
    #[error("step {index}: malformed value in '{section}': {text}")]
    Malformed {
        index: usize,
        section: &'static str,
        text: String,
    },
    #[error("step {index}: expected {expected} atom lines, found {found}")]
    AtomCount {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("field '{0}' is not present in this step")]
    UnknownField(String),
    #[error("field '{0}' holds non-numeric values")]
    NonNumericField(String),
    #[error("step species sequence does not match the original structure at site {index}")]
    SpeciesMismatch { index: usize },
    #[error("no mass known for element '{0}'")]
    UnknownElement(String),
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// One parsed snapshot of the trajectory dump.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryStep {
    pub timestep: i64,
    pub natoms: usize,
    /// Canonical lower-triangular cell, rows are lattice vectors.
    pub cell: Matrix3<f64>,
    /// Per-axis two-letter boundary codes, e.g. `pp`.
    pub pbc: [String; 3],
    /// Dump field names in column order.
    pub field_names: Vec<String>,
    /// Raw per-atom columns keyed by field name, each of length `natoms`.
    /// Values stay as text since fields mix numbers (`x`) and symbols
    /// (`element`).
    pub atom_fields: BTreeMap<String, Vec<String>>,
}

impl TrajectoryStep {
    pub fn field(&self, name: &str) -> Result<&[String], TrajectoryError> {
        self.atom_fields
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| TrajectoryError::UnknownField(name.to_string()))
    }

    /// A field parsed as floats.
    pub fn numeric_field(&self, name: &str) -> Result<Vec<f64>, TrajectoryError> {
        self.field(name)?
            .iter()
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| TrajectoryError::NonNumericField(name.to_string()))
            })
            .collect()
    }

    /// Whether axis `i` is periodic (`p` boundary code).
    pub fn periodic(&self) -> [bool; 3] {
        [
            self.pbc[0].starts_with('p'),
            self.pbc[1].starts_with('p'),
            self.pbc[2].starts_with('p'),
        ]
    }

    fn positions(&self) -> Result<Vec<Point3<f64>>, TrajectoryError> {
        let x = self.numeric_field("x")?;
        let y = self.numeric_field("y")?;
        let z = self.numeric_field("z")?;
        Ok(x.iter()
            .zip(&y)
            .zip(&z)
            .map(|((&x, &y), &z)| Point3::new(x, y, z))
            .collect())
    }

    /// Derives a structure from this snapshot.
    ///
    /// With an `original` structure, the step's `element` sequence must
    /// match the original's species sequence exactly; the result is a copy
    /// of the original with only cell and positions replaced, preserving
    /// kind and mass identity. Without one, a fresh structure is built from
    /// the `element`/`x y z` fields with standard atomic masses.
    pub fn to_structure(
        &self,
        original: Option<&Structure>,
    ) -> Result<Structure, TrajectoryError> {
        let elements = self.field("element")?;
        let positions = self.positions()?;

        if let Some(original) = original {
            for (index, (site, element)) in original.sites().iter().zip(elements).enumerate() {
                if &site.kind != element {
                    return Err(TrajectoryError::SpeciesMismatch { index });
                }
            }
            if original.sites().len() != elements.len() {
                return Err(TrajectoryError::SpeciesMismatch {
                    index: original.sites().len().min(elements.len()),
                });
            }
            return Ok(original.with_snapshot(self.cell, &positions));
        }

        let mut masses = BTreeMap::new();
        for element in elements {
            if !masses.contains_key(element) {
                let mass = ATOMIC_MASSES
                    .get(element.as_str())
                    .ok_or_else(|| TrajectoryError::UnknownElement(element.clone()))?;
                masses.insert(element.clone(), *mass);
            }
        }
        let sites = elements
            .iter()
            .zip(&positions)
            .map(|(element, &position)| AtomSite::new(element.clone(), position))
            .collect();
        Ok(Structure::new(sites, self.cell, self.periodic(), masses)?)
    }
}

/// Lazy iterator over the steps of a dump file.
///
/// Yields `(raw_block, parsed_step)` pairs so a caller can persist the raw
/// text of each step without re-rendering it. Parsing stops at the first
/// structural error; the error is yielded once and the iterator then ends.
pub struct StepIter<'a> {
    remaining: &'a str,
    index: usize,
    failed: bool,
}

const STEP_MARKER: &str = "ITEM: TIMESTEP";

/// Splits dump text into lazily parsed steps.
pub fn parse_trajectory(text: &str) -> StepIter<'_> {
    // skip anything before the first step marker
    let start = text.find(STEP_MARKER).unwrap_or(text.len());
    StepIter {
        remaining: &text[start..],
        index: 0,
        failed: false,
    }
}

impl<'a> Iterator for StepIter<'a> {
    type Item = Result<(&'a str, TrajectoryStep), TrajectoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }
        let block_end = self.remaining[STEP_MARKER.len()..]
            .find(STEP_MARKER)
            .map(|offset| offset + STEP_MARKER.len())
            .unwrap_or(self.remaining.len());
        let block = &self.remaining[..block_end];
        self.remaining = &self.remaining[block_end..];

        let index = self.index;
        self.index += 1;
        match parse_step_block(block, index) {
            Ok(step) => Some(Ok((block, step))),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn header_value<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    index: usize,
    expected: &'static str,
) -> Result<&'a str, TrajectoryError> {
    let line = lines
        .next()
        .ok_or(TrajectoryError::MissingHeader { index, expected })?;
    if !line.trim_start().starts_with(expected) {
        return Err(TrajectoryError::MissingHeader { index, expected });
    }
    lines
        .next()
        .ok_or(TrajectoryError::MissingHeader { index, expected })
}

/// Parses one step block against the fixed header skeleton.
pub fn parse_step_block(block: &str, index: usize) -> Result<TrajectoryStep, TrajectoryError> {
    let malformed = |section: &'static str, text: &str| TrajectoryError::Malformed {
        index,
        section,
        text: text.to_string(),
    };

    let mut lines = block.lines().filter(|line| !line.trim().is_empty());

    let timestep: i64 = header_value(&mut lines, index, "ITEM: TIMESTEP")?
        .trim()
        .parse()
        .map_err(|_| malformed("TIMESTEP", block))?;

    // peek NUMBER OF ATOMS header manually, its value line follows
    let natoms_header = lines.next().ok_or(TrajectoryError::MissingHeader {
        index,
        expected: "ITEM: NUMBER OF ATOMS",
    })?;
    if !natoms_header.trim_start().starts_with("ITEM: NUMBER OF ATOMS") {
        return Err(TrajectoryError::MissingHeader {
            index,
            expected: "ITEM: NUMBER OF ATOMS",
        });
    }
    let natoms: usize = lines
        .next()
        .ok_or(TrajectoryError::MissingHeader {
            index,
            expected: "ITEM: NUMBER OF ATOMS",
        })?
        .trim()
        .parse()
        .map_err(|_| malformed("NUMBER OF ATOMS", block))?;

    let bounds_header = lines.next().ok_or(TrajectoryError::MissingHeader {
        index,
        expected: "ITEM: BOX BOUNDS",
    })?;
    if !bounds_header.trim_start().starts_with("ITEM: BOX BOUNDS") {
        return Err(TrajectoryError::MissingHeader {
            index,
            expected: "ITEM: BOX BOUNDS",
        });
    }
    let mut tokens: Vec<&str> = bounds_header
        .trim_start()
        .strip_prefix("ITEM: BOX BOUNDS")
        .unwrap_or("")
        .split_whitespace()
        .collect();
    let triclinic = tokens.starts_with(&["xy", "xz", "yz"]);
    if triclinic {
        tokens.drain(..3);
    }
    // exactly one two-letter boundary code per axis, p/f/s/m
    let is_code = |token: &str| {
        token.len() == 2 && token.chars().all(|ch| matches!(ch, 'p' | 'f' | 's' | 'm'))
    };
    if tokens.len() != 3 || !tokens.iter().all(|token| is_code(token)) {
        return Err(malformed("BOX BOUNDS", bounds_header));
    }
    let pbc = [
        tokens[0].to_string(),
        tokens[1].to_string(),
        tokens[2].to_string(),
    ];

    let mut bounds = [[0.0f64; 3]; 3];
    for axis_bounds in &mut bounds {
        let line = lines.next().ok_or(TrajectoryError::MissingHeader {
            index,
            expected: "BOX BOUNDS",
        })?;
        let values: Vec<f64> = line
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| malformed("BOX BOUNDS", line))?;
        match (values.len(), triclinic) {
            (3, true) => axis_bounds.copy_from_slice(&values),
            (2, false) => {
                axis_bounds[0] = values[0];
                axis_bounds[1] = values[1];
            }
            _ => return Err(malformed("BOX BOUNDS", line)),
        }
    }
    let cell = cell_from_bounds(&bounds);

    let atoms_header = lines.next().ok_or(TrajectoryError::MissingHeader {
        index,
        expected: "ITEM: ATOMS",
    })?;
    let field_names: Vec<String> = atoms_header
        .trim_start()
        .strip_prefix("ITEM: ATOMS")
        .ok_or(TrajectoryError::MissingHeader {
            index,
            expected: "ITEM: ATOMS",
        })?
        .split_whitespace()
        .map(String::from)
        .collect();

    let mut atom_fields: BTreeMap<String, Vec<String>> = field_names
        .iter()
        .map(|name| (name.clone(), Vec::with_capacity(natoms)))
        .collect();
    let mut found = 0usize;
    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != field_names.len() {
            return Err(malformed("ATOMS", line));
        }
        for (name, token) in field_names.iter().zip(tokens) {
            if let Some(column) = atom_fields.get_mut(name) {
                column.push(token.to_string());
            }
        }
        found += 1;
    }
    if found != natoms {
        return Err(TrajectoryError::AtomCount {
            index,
            expected: natoms,
            found,
        });
    }

    Ok(TrajectoryStep {
        timestep,
        natoms,
        cell,
        pbc,
        field_names,
        atom_fields,
    })
}

/// Recovers the true cell from the skewed bounding-box convention: the
/// reported x/y bounds include padding by the tilt factors, undone by
/// subtracting the min/max of `{0, xy, xz, xy+xz}` (x) and `{0, yz}` (y)
/// before taking edge lengths.
fn cell_from_bounds(bounds: &[[f64; 3]; 3]) -> Matrix3<f64> {
    let [xlo_bound, xhi_bound, xy] = bounds[0];
    let [ylo_bound, yhi_bound, xz] = bounds[1];
    let [zlo, zhi, yz] = bounds[2];

    let x_shifts = [0.0, xy, xz, xy + xz];
    let xlo = xlo_bound - x_shifts.iter().cloned().fold(f64::INFINITY, f64::min);
    let xhi = xhi_bound - x_shifts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let ylo = ylo_bound - yz.min(0.0);
    let yhi = yhi_bound - yz.max(0.0);

    Matrix3::new(
        xhi - xlo,
        0.0,
        0.0,
        xy,
        yhi - ylo,
        0.0,
        xz,
        yz,
        zhi - zlo,
    )
}
