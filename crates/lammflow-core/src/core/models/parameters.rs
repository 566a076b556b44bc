use super::args::Arg;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("exactly one of 'minimize' or 'md' must be present, found neither")]
    MissingRunMode,
    #[error("exactly one of 'minimize' or 'md' must be present, found both")]
    AmbiguousRunMode,
    #[error("failed to deserialize parameters: {0}")]
    Deserialize(String),
}

/// Which run command the script ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Minimize,
    MolecularDynamics,
}

/// Global options affecting the whole simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlParameters {
    /// Unit system override; must agree with the potential's default when set.
    pub units: Option<String>,
    /// `newton` pairwise setting, emitted as on/off. Defaults to on.
    pub newton: Option<bool>,
    /// Processor grid, passed through as `processors <args…>`.
    pub processors: Option<Vec<Arg>>,
    /// Integration timestep; defaults to the unit system's table value.
    pub timestep: Option<f64>,
}

/// A named atom group and its LAMMPS selector arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDefinition {
    pub name: String,
    pub args: Vec<Arg>,
}

/// Structure-section options: tilt handling, dimensionality and boundary
/// overrides, and the group definitions later fixes/computes may reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructureParameters {
    pub box_tilt: Option<String>,
    pub dimension: Option<u8>,
    /// Per-axis boundary override, e.g. `["p", "p", "f"]`. Derived from the
    /// structure's periodic flags when absent.
    pub boundary: Option<Vec<String>>,
    #[serde(default)]
    pub groups: Vec<GroupDefinition>,
}

/// Potential-section options that are not part of the potential descriptor
/// itself: extra pair-style arguments and neighbor-list tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PotentialParameters {
    pub potential_style_options: Option<Vec<Arg>>,
    pub neighbor: Option<Vec<Arg>>,
    pub neighbor_modify: Option<Vec<Arg>>,
}

/// One requested fix or compute: a style applied to a group with arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleRequest {
    pub style: String,
    /// Group the style is scoped to; defaults to the built-in `all`.
    pub group: Option<String>,
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl StyleRequest {
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or("all")
    }
}

/// Thermo-section options: which columns to print and how often.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThermoParameters {
    /// Steps between thermo rows; defaults to 1000.
    pub printing_rate: Option<u32>,
    /// Column selection; keys with a true value are printed. `step` is
    /// always forced first and `etotal` last.
    pub thermo_printing: Option<BTreeMap<String, bool>>,
}

/// Dump-section options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DumpParameters {
    /// Steps between trajectory snapshots; defaults to 10.
    pub dump_rate: Option<u32>,
}

/// Minimization run options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinimizeParameters {
    pub style: Option<String>,
    pub energy_tolerance: Option<f64>,
    pub force_tolerance: Option<f64>,
    pub max_iterations: Option<u32>,
    pub max_evaluations: Option<u32>,
}

impl MinimizeParameters {
    pub fn style(&self) -> &str {
        self.style.as_deref().unwrap_or("cg")
    }

    pub fn energy_tolerance(&self) -> f64 {
        self.energy_tolerance.unwrap_or(1e-4)
    }

    pub fn force_tolerance(&self) -> f64 {
        self.force_tolerance.unwrap_or(1e-4)
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations.unwrap_or(1000)
    }

    pub fn max_evaluations(&self) -> u32 {
        self.max_evaluations.unwrap_or(1000)
    }
}

/// Molecular-dynamics run options. The time integrator itself is one of the
/// fixes in the fix section; its presence is checked at compile time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MdParameters {
    pub max_number_steps: Option<u32>,
    pub run_style: Option<String>,
    pub respa_options: Option<Vec<Arg>>,
    /// Timestep counter value the run starts from; set by the recovery
    /// machinery when resuming. Defaults to 0.
    pub reset_timestep: Option<i64>,
}

impl MdParameters {
    pub fn max_number_steps(&self) -> u32 {
        self.max_number_steps.unwrap_or(100)
    }

    pub fn run_style(&self) -> &str {
        self.run_style.as_deref().unwrap_or("verlet")
    }
}

/// The five velocity-initialization commands, each rendered as one
/// `velocity` line with style-specific argument ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VelocityStyle {
    Create {
        temp: f64,
        seed: Option<u64>,
    },
    Set {
        vx: Option<f64>,
        vy: Option<f64>,
        vz: Option<f64>,
    },
    Scale(f64),
    Ramp {
        vdim: String,
        vlo: f64,
        vhi: f64,
        dim: String,
        clo: f64,
        chi: f64,
    },
    /// `linear` or `angular`.
    Zero(String),
}

/// One velocity-initialization directive, scoped to a group, with optional
/// trailing keyword options (`dist`, `mom`, `units`, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityDirective {
    pub group: Option<String>,
    #[serde(flatten)]
    pub style: VelocityStyle,
    #[serde(default)]
    pub options: BTreeMap<String, Arg>,
}

impl VelocityDirective {
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or("all")
    }
}

/// Restart-file printing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestartParameters {
    /// Write a single restart file after the run finishes.
    #[serde(default)]
    pub print_final: bool,
    /// Write periodic restart files during the run.
    #[serde(default)]
    pub print_intermediate: bool,
    /// Steps between intermediate restart files; defaults to a tenth of the
    /// run's total step count.
    pub num_steps: Option<u32>,
}

/// The complete declarative description of one LAMMPS run.
///
/// Exactly one of `minimize` or `md` must be present; everything else is
/// optional. The recovery state machine never mutates a `ParameterSet` in
/// place: each restart attempt clones and adjusts a fresh copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSet {
    #[serde(default)]
    pub control: ControlParameters,
    #[serde(default)]
    pub structure: StructureParameters,
    #[serde(default)]
    pub potential: PotentialParameters,
    #[serde(default)]
    pub fix: Vec<StyleRequest>,
    #[serde(default)]
    pub compute: Vec<StyleRequest>,
    #[serde(default)]
    pub thermo: ThermoParameters,
    #[serde(default)]
    pub dump: DumpParameters,
    pub minimize: Option<MinimizeParameters>,
    pub md: Option<MdParameters>,
    pub restart: Option<RestartParameters>,
    #[serde(default)]
    pub velocity: Vec<VelocityDirective>,
}

impl ParameterSet {
    /// Parses a job description from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ParameterError> {
        toml::from_str(text).map_err(|err| ParameterError::Deserialize(err.to_string()))
    }

    /// Resolves the run-mode selector, enforcing the minimize/md exclusivity
    /// invariant.
    pub fn run_mode(&self) -> Result<RunMode, ParameterError> {
        match (&self.minimize, &self.md) {
            (Some(_), None) => Ok(RunMode::Minimize),
            (None, Some(_)) => Ok(RunMode::MolecularDynamics),
            (None, None) => Err(ParameterError::MissingRunMode),
            (Some(_), Some(_)) => Err(ParameterError::AmbiguousRunMode),
        }
    }

    /// Total step budget of the run, used for restart-interval defaults.
    pub fn max_number_steps(&self) -> u32 {
        match (&self.minimize, &self.md) {
            (Some(minimize), _) => minimize.max_iterations(),
            (_, Some(md)) => md.max_number_steps(),
            _ => 0,
        }
    }
}
