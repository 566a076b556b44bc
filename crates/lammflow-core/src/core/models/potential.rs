use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PotentialError {
    #[error("atom style '{given}' conflicts with '{required}' required by pair style '{pair_style}'")]
    AtomStyleMismatch {
        pair_style: String,
        given: String,
        required: String,
    },
    #[error("unit system '{given}' conflicts with '{required}' required by pair style '{pair_style}'")]
    UnitsMismatch {
        pair_style: String,
        given: String,
        required: String,
    },
    #[error(
        "pair style '{pair_style}' reads its coefficients from a file, but inline data was given"
    )]
    ExpectedStoredCoefficients { pair_style: String },
    #[error("pair style '{pair_style}' takes inline coefficients, but a stored file was given")]
    ExpectedInlineCoefficients { pair_style: String },
}

/// Unit system a potential was parameterized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStyle {
    Si,
    Lj,
    Real,
    Metal,
    Cgs,
    Electron,
    Micro,
    Nano,
}

impl UnitStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStyle::Si => "si",
            UnitStyle::Lj => "lj",
            UnitStyle::Real => "real",
            UnitStyle::Metal => "metal",
            UnitStyle::Cgs => "cgs",
            UnitStyle::Electron => "electron",
            UnitStyle::Micro => "micro",
            UnitStyle::Nano => "nano",
        }
    }

    /// Default `timestep` for this unit system.
    pub fn default_timestep(&self) -> f64 {
        crate::core::tables::DEFAULT_TIMESTEP[self.as_str()]
    }
}

impl fmt::Display for UnitStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-atom data layout requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomStyle {
    Atomic,
    Charge,
}

impl AtomStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtomStyle::Atomic => "atomic",
            AtomStyle::Charge => "charge",
        }
    }
}

impl fmt::Display for AtomStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requirements a pair style imposes on the rest of the calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairStyleSpec {
    pub atom_style: AtomStyle,
    pub units: UnitStyle,
    /// Whether `pair_coeff` points at an external coefficient file instead
    /// of carrying the coefficients inline.
    pub reads_coefficients_from_file: bool,
}

/// The closed set of supported interatomic pair styles.
///
/// Each variant knows its required atom style, unit system and coefficient
/// source; the potential block is generated from this table alone, never by
/// inspecting the coefficient data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairStyle {
    #[serde(rename = "eam")]
    Eam,
    #[serde(rename = "eam/alloy")]
    EamAlloy,
    #[serde(rename = "eam/fs")]
    EamFs,
    #[serde(rename = "lj/cut")]
    LjCut,
    #[serde(rename = "morse")]
    Morse,
    #[serde(rename = "tersoff")]
    Tersoff,
    #[serde(rename = "sw")]
    StillingerWeber,
    #[serde(rename = "meam")]
    Meam,
    #[serde(rename = "reaxff")]
    ReaxFf,
}

impl PairStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairStyle::Eam => "eam",
            PairStyle::EamAlloy => "eam/alloy",
            PairStyle::EamFs => "eam/fs",
            PairStyle::LjCut => "lj/cut",
            PairStyle::Morse => "morse",
            PairStyle::Tersoff => "tersoff",
            PairStyle::StillingerWeber => "sw",
            PairStyle::Meam => "meam",
            PairStyle::ReaxFf => "reaxff",
        }
    }

    pub fn spec(&self) -> PairStyleSpec {
        match self {
            PairStyle::Eam | PairStyle::EamAlloy | PairStyle::EamFs => PairStyleSpec {
                atom_style: AtomStyle::Atomic,
                units: UnitStyle::Metal,
                reads_coefficients_from_file: true,
            },
            PairStyle::LjCut => PairStyleSpec {
                atom_style: AtomStyle::Atomic,
                units: UnitStyle::Lj,
                reads_coefficients_from_file: false,
            },
            PairStyle::Morse => PairStyleSpec {
                atom_style: AtomStyle::Atomic,
                units: UnitStyle::Metal,
                reads_coefficients_from_file: false,
            },
            PairStyle::Tersoff | PairStyle::StillingerWeber | PairStyle::Meam => PairStyleSpec {
                atom_style: AtomStyle::Atomic,
                units: UnitStyle::Metal,
                reads_coefficients_from_file: true,
            },
            PairStyle::ReaxFf => PairStyleSpec {
                atom_style: AtomStyle::Charge,
                units: UnitStyle::Real,
                reads_coefficients_from_file: true,
            },
        }
    }
}

impl fmt::Display for PairStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the coefficient data of a potential lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoefficientData {
    /// Raw `pair_coeff` argument text, inlined into the script. Comment
    /// lines (`#`) are stripped at emission.
    Inline(String),
    /// An externally persisted coefficient file, referenced by the opaque
    /// handle under which the persistence layer stored it.
    Stored { handle: String },
}

/// A validated potential descriptor: pair style, atom style, unit system and
/// coefficient source, guaranteed consistent with the pair-style table.
#[derive(Debug, Clone, PartialEq)]
pub struct Potential {
    pair_style: PairStyle,
    atom_style: AtomStyle,
    units: UnitStyle,
    coefficients: CoefficientData,
}

impl Potential {
    /// Builds a potential, validating the caller-supplied atom style and
    /// unit system against the pair style's declared requirements. Omitted
    /// values fall back to the table defaults; mismatched ones are a
    /// validation error, never silently corrected.
    pub fn new(
        pair_style: PairStyle,
        atom_style: Option<AtomStyle>,
        units: Option<UnitStyle>,
        coefficients: CoefficientData,
    ) -> Result<Self, PotentialError> {
        let spec = pair_style.spec();

        let atom_style = match atom_style {
            Some(given) if given != spec.atom_style => {
                return Err(PotentialError::AtomStyleMismatch {
                    pair_style: pair_style.to_string(),
                    given: given.to_string(),
                    required: spec.atom_style.to_string(),
                });
            }
            Some(given) => given,
            None => spec.atom_style,
        };

        let units = match units {
            Some(given) if given != spec.units => {
                return Err(PotentialError::UnitsMismatch {
                    pair_style: pair_style.to_string(),
                    given: given.to_string(),
                    required: spec.units.to_string(),
                });
            }
            Some(given) => given,
            None => spec.units,
        };

        match (&coefficients, spec.reads_coefficients_from_file) {
            (CoefficientData::Inline(_), true) => {
                return Err(PotentialError::ExpectedStoredCoefficients {
                    pair_style: pair_style.to_string(),
                });
            }
            (CoefficientData::Stored { .. }, false) => {
                return Err(PotentialError::ExpectedInlineCoefficients {
                    pair_style: pair_style.to_string(),
                });
            }
            _ => {}
        }

        Ok(Self {
            pair_style,
            atom_style,
            units,
            coefficients,
        })
    }

    pub fn pair_style(&self) -> PairStyle {
        self.pair_style
    }

    pub fn atom_style(&self) -> AtomStyle {
        self.atom_style
    }

    pub fn units(&self) -> UnitStyle {
        self.units
    }

    pub fn coefficients(&self) -> &CoefficientData {
        &self.coefficients
    }
}
