//! Static lookup tables for LAMMPS unit systems and keyword registries.
//!
//! Everything the compiler and the parsers need to know about LAMMPS
//! semantics that is not carried by the job description itself lives here:
//! per-unit-system default timesteps and physical-quantity unit names, the
//! registry of supported computes, and the set of time-integrator fix styles.

use phf::{Map, Set, phf_map, phf_set};

/// Default `timestep` per unit system, applied when the control section does
/// not set one explicitly.
pub static DEFAULT_TIMESTEP: Map<&'static str, f64> = phf_map! {
    "si" => 1.0e-8,
    "lj" => 5.0e-3,
    "real" => 1.0,
    "metal" => 1.0e-3,
    "cgs" => 1.0e-8,
    "electron" => 1.0e-3,
    "micro" => 2.0,
    "nano" => 4.5e-4,
};

static UNITS_REAL: Map<&'static str, &'static str> = phf_map! {
    "mass" => "grams/mole",
    "distance" => "Angstroms",
    "time" => "femtoseconds",
    "energy" => "Kcal/mole",
    "velocity" => "Angstroms/femtosecond",
    "force" => "Kcal/mole-Angstrom",
    "temperature" => "Kelvin",
    "pressure" => "atmospheres",
};

static UNITS_METAL: Map<&'static str, &'static str> = phf_map! {
    "mass" => "grams/mole",
    "distance" => "Angstroms",
    "time" => "picoseconds",
    "energy" => "eV",
    "velocity" => "Angstroms/picosecond",
    "force" => "eV/Angstrom",
    "temperature" => "Kelvin",
    "pressure" => "bars",
};

static UNITS_SI: Map<&'static str, &'static str> = phf_map! {
    "mass" => "kilograms",
    "distance" => "meters",
    "time" => "seconds",
    "energy" => "Joules",
    "velocity" => "meters/second",
    "force" => "Newtons",
    "temperature" => "Kelvin",
    "pressure" => "Pascals",
};

static UNITS_CGS: Map<&'static str, &'static str> = phf_map! {
    "mass" => "grams",
    "distance" => "centimeters",
    "time" => "seconds",
    "energy" => "ergs",
    "velocity" => "centimeters/second",
    "force" => "dynes",
    "temperature" => "Kelvin",
    "pressure" => "dyne/cm^2",
};

static UNITS_ELECTRON: Map<&'static str, &'static str> = phf_map! {
    "mass" => "amu",
    "distance" => "Bohr",
    "time" => "femtoseconds",
    "energy" => "Hartrees",
    "velocity" => "Bohr/atu",
    "force" => "Hartrees/Bohr",
    "temperature" => "Kelvin",
    "pressure" => "Pascals",
};

static UNITS_MICRO: Map<&'static str, &'static str> = phf_map! {
    "mass" => "picograms",
    "distance" => "micrometers",
    "time" => "microseconds",
    "energy" => "picogram-micrometer^2/microsecond^2",
    "velocity" => "micrometers/microsecond",
    "force" => "picogram-micrometer/microsecond^2",
    "temperature" => "Kelvin",
    "pressure" => "picogram/(micrometer-microsecond^2)",
};

static UNITS_NANO: Map<&'static str, &'static str> = phf_map! {
    "mass" => "attograms",
    "distance" => "nanometers",
    "time" => "nanoseconds",
    "energy" => "attogram-nanometer^2/nanosecond^2",
    "velocity" => "nanometers/nanosecond",
    "force" => "attogram-nanometer/nanosecond^2",
    "temperature" => "Kelvin",
    "pressure" => "attogram/(nanometer-nanosecond^2)",
};

static UNITS_LJ: Map<&'static str, &'static str> = phf_map! {
    "mass" => "dimensionless",
    "distance" => "dimensionless",
    "time" => "dimensionless",
    "energy" => "dimensionless",
    "velocity" => "dimensionless",
    "force" => "dimensionless",
    "temperature" => "dimensionless",
    "pressure" => "dimensionless",
};

/// Returns the physical-quantity → unit-name table for a unit system, or
/// `None` for an unrecognized system name.
pub fn unit_names(units: &str) -> Option<&'static Map<&'static str, &'static str>> {
    match units {
        "real" => Some(&UNITS_REAL),
        "metal" => Some(&UNITS_METAL),
        "si" => Some(&UNITS_SI),
        "cgs" => Some(&UNITS_CGS),
        "electron" => Some(&UNITS_ELECTRON),
        "micro" => Some(&UNITS_MICRO),
        "nano" => Some(&UNITS_NANO),
        "lj" => Some(&UNITS_LJ),
        _ => None,
    }
}

/// Where a compute's result lives: a global scalar/vector reported via
/// `thermo_style`, or a per-atom quantity reported via `dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    Global,
    Local,
}

/// Shape of a compute's printable result, used to expand its id tag into
/// concrete `c_<tag>[i]` thermo/dump references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeKind {
    /// A single value: `c_<tag>`.
    Scalar,
    /// A fixed-length vector: `c_<tag>[1] .. c_<tag>[n]`, or `c_<tag>[*]`
    /// when the length is zero (runtime-sized).
    Vector(usize),
    /// A scalar plus a vector: `c_<tag> c_<tag>[1] .. c_<tag>[n]`.
    Mixed(usize),
    /// A 2D array; referenced whole, never expanded.
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeSpec {
    pub locality: Locality,
    pub printable: bool,
    pub kind: ComputeKind,
}

/// Registry of supported compute styles.
///
/// The locality entry decides whether a requested compute is appended to the
/// thermo columns (global) or to the dump fields (local); the kind entry
/// decides how its id tag is expanded into printable references.
pub static COMPUTES: Map<&'static str, ComputeSpec> = phf_map! {
    "temp" => ComputeSpec { locality: Locality::Global, printable: true, kind: ComputeKind::Scalar },
    "pe" => ComputeSpec { locality: Locality::Global, printable: true, kind: ComputeKind::Scalar },
    "ke" => ComputeSpec { locality: Locality::Global, printable: true, kind: ComputeKind::Scalar },
    "pressure" => ComputeSpec { locality: Locality::Global, printable: true, kind: ComputeKind::Mixed(6) },
    "com" => ComputeSpec { locality: Locality::Global, printable: true, kind: ComputeKind::Vector(3) },
    "msd" => ComputeSpec { locality: Locality::Global, printable: true, kind: ComputeKind::Vector(4) },
    "gyration" => ComputeSpec { locality: Locality::Global, printable: true, kind: ComputeKind::Scalar },
    "rdf" => ComputeSpec { locality: Locality::Global, printable: false, kind: ComputeKind::Array },
    "pe/atom" => ComputeSpec { locality: Locality::Local, printable: true, kind: ComputeKind::Scalar },
    "ke/atom" => ComputeSpec { locality: Locality::Local, printable: true, kind: ComputeKind::Scalar },
    "stress/atom" => ComputeSpec { locality: Locality::Local, printable: true, kind: ComputeKind::Vector(6) },
    "cna/atom" => ComputeSpec { locality: Locality::Local, printable: true, kind: ComputeKind::Scalar },
    "coord/atom" => ComputeSpec { locality: Locality::Local, printable: true, kind: ComputeKind::Scalar },
    "ackland/atom" => ComputeSpec { locality: Locality::Local, printable: true, kind: ComputeKind::Scalar },
};

/// Standard atomic masses in grams/mole, used when deriving a structure
/// from a trajectory snapshot without an original structure to inherit
/// masses from.
pub static ATOMIC_MASSES: Map<&'static str, f64> = phf_map! {
    "H" => 1.008, "He" => 4.0026,
    "Li" => 6.94, "Be" => 9.0122, "B" => 10.81, "C" => 12.011,
    "N" => 14.007, "O" => 15.999, "F" => 18.998, "Ne" => 20.180,
    "Na" => 22.990, "Mg" => 24.305, "Al" => 26.982, "Si" => 28.085,
    "P" => 30.974, "S" => 32.06, "Cl" => 35.45, "Ar" => 39.948,
    "K" => 39.098, "Ca" => 40.078, "Sc" => 44.956, "Ti" => 47.867,
    "V" => 50.942, "Cr" => 51.996, "Mn" => 54.938, "Fe" => 55.845,
    "Co" => 58.933, "Ni" => 58.693, "Cu" => 63.546, "Zn" => 65.38,
    "Ga" => 69.723, "Ge" => 72.630, "As" => 74.922, "Se" => 78.971,
    "Br" => 79.904, "Kr" => 83.798, "Rb" => 85.468, "Sr" => 87.62,
    "Y" => 88.906, "Zr" => 91.224, "Nb" => 92.906, "Mo" => 95.95,
    "Ru" => 101.07, "Rh" => 102.91, "Pd" => 106.42, "Ag" => 107.87,
    "Cd" => 112.41, "In" => 114.82, "Sn" => 118.71, "Sb" => 121.76,
    "Te" => 127.60, "I" => 126.90, "Xe" => 131.29, "Cs" => 132.91,
    "Ba" => 137.33, "La" => 138.91, "Ce" => 140.12, "Nd" => 144.24,
    "Gd" => 157.25, "Hf" => 178.49, "Ta" => 180.95, "W" => 183.84,
    "Re" => 186.21, "Os" => 190.23, "Ir" => 192.22, "Pt" => 195.08,
    "Au" => 196.97, "Hg" => 200.59, "Tl" => 204.38, "Pb" => 207.2,
    "Bi" => 208.98, "Th" => 232.04, "U" => 238.03,
};

/// Fix styles that perform time integration. MD mode refuses to compile
/// unless at least one fix in the fix section uses one of these.
pub static INTEGRATOR_STYLES: Set<&'static str> = phf_set! {
    "nve", "nve/limit", "nve/noforce", "nve/sphere",
    "nvt", "nvt/asphere", "nvt/body", "nvt/eff", "nvt/sllod", "nvt/sphere", "nvt/uef",
    "npt", "npt/asphere", "npt/body", "npt/cauchy", "npt/eff", "npt/sphere", "npt/uef",
    "nph", "nph/asphere", "nph/body", "nph/eff", "nph/sphere", "nphug",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timestep_covers_all_unit_systems() {
        for units in ["si", "lj", "real", "metal", "cgs", "electron", "micro", "nano"] {
            assert!(DEFAULT_TIMESTEP.contains_key(units), "missing {units}");
        }
        assert_eq!(DEFAULT_TIMESTEP["metal"], 1.0e-3);
        assert_eq!(DEFAULT_TIMESTEP["micro"], 2.0);
    }

    #[test]
    fn unit_names_resolves_known_systems_and_rejects_unknown() {
        let metal = unit_names("metal").unwrap();
        assert_eq!(metal["energy"], "eV");
        assert_eq!(unit_names("real").unwrap()["pressure"], "atmospheres");
        assert!(unit_names("imperial").is_none());
    }

    #[test]
    fn lj_units_are_dimensionless() {
        let lj = unit_names("lj").unwrap();
        for quantity in ["mass", "energy", "pressure"] {
            assert_eq!(lj[quantity], "dimensionless");
        }
    }

    #[test]
    fn compute_registry_separates_global_and_local_styles() {
        assert_eq!(COMPUTES["temp"].locality, Locality::Global);
        assert_eq!(COMPUTES["pe/atom"].locality, Locality::Local);
        assert!(!COMPUTES["rdf"].printable);
        assert_eq!(COMPUTES["stress/atom"].kind, ComputeKind::Vector(6));
    }

    #[test]
    fn integrator_set_contains_the_nve_family() {
        assert!(INTEGRATOR_STYLES.contains("nve"));
        assert!(INTEGRATOR_STYLES.contains("npt/cauchy"));
        assert!(!INTEGRATOR_STYLES.contains("box/relax"));
    }
}
