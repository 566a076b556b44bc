//! Compilation of a job description into a LAMMPS input script.
//!
//! The compiler assembles the script from pure block generators in a fixed
//! order, threading an immutable [`CompilationContext`] between them. All
//! validation happens here; once a [`CompiledScript`] exists, rendering it
//! to disk cannot fail.

pub mod blocks;
pub mod context;

use crate::core::models::parameters::{ParameterError, ParameterSet, RunMode};
use crate::core::models::potential::Potential;
use crate::core::models::structure::Structure;
use context::CompilationContext;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error("unit system '{requested}' conflicts with '{required}' required by the potential")]
    UnitsConflict { requested: String, required: String },
    #[error("unsupported compute style '{0}'")]
    UnknownCompute(String),
    #[error("group '{group}' selects atom type {id}, but the structure has {count} kinds")]
    UnknownKindId { group: String, id: i64, count: usize },
    #[error("style '{style}' is scoped to group '{group}', which no group definition declares")]
    UndeclaredGroup { style: String, group: String },
    #[error("md mode requires a time-integrator fix (nve/nvt/npt/nph family) in the fix section")]
    MissingIntegrator,
}

/// Names of the files the generated script reads and writes, relative to the
/// engine's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFilenames {
    pub structure: String,
    pub potential: String,
    pub trajectory: String,
    pub restart: String,
    pub variables: String,
}

impl Default for ScriptFilenames {
    fn default() -> Self {
        Self {
            structure: "structure.dat".to_string(),
            potential: "potential.dat".to_string(),
            trajectory: "lammflow.trajectory.dump".to_string(),
            restart: "lammps.restart".to_string(),
            variables: "lammflow.variables.dat".to_string(),
        }
    }
}

/// A fully validated input script plus the names the output parsers need to
/// interpret the run's results.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScript {
    pub text: String,
    /// Ordered thermo columns, including expanded compute references.
    pub thermo_columns: Vec<String>,
    /// Groups declared by the structure section.
    pub groups: Vec<String>,
}

/// Compiles a job description into a LAMMPS input script.
///
/// When `restart_source` names a restart artifact the structure block is
/// replaced by a `read_restart` command; the declared groups survive inside
/// the restart file, so they are carried in the context for validation but
/// not re-emitted.
pub fn compile(
    params: &ParameterSet,
    potential: &Potential,
    structure: &Structure,
    filenames: &ScriptFilenames,
    restart_source: Option<&str>,
) -> Result<CompiledScript, CompileError> {
    let run_mode = params.run_mode()?;

    let units = potential.units();
    if let Some(requested) = &params.control.units
        && requested != units.as_str()
    {
        return Err(CompileError::UnitsConflict {
            requested: requested.clone(),
            required: units.to_string(),
        });
    }

    let context = CompilationContext::new(
        structure.kind_symbols(),
        potential.atom_style(),
        units,
    )
    .with_max_steps(params.max_number_steps());

    let mut text = String::new();
    text.push_str(&blocks::write_control_block(&params.control, units));

    let (structure_block, groups) = blocks::write_structure_block(
        &params.structure,
        &context,
        structure.pbc(),
        &filenames.structure,
    )?;
    match restart_source {
        Some(artifact) => text.push_str(&blocks::write_read_restart_block(artifact)),
        None => text.push_str(&structure_block),
    }
    let context = context.with_groups(groups.clone());

    text.push_str(&blocks::write_potential_block(
        &params.potential,
        potential,
        &context,
        &filenames.potential,
    ));
    text.push_str(&blocks::write_fix_block(&params.fix, &context)?);
    text.push_str(&blocks::write_compute_block(&params.compute, &context)?);

    let (thermo_block, thermo_columns) =
        blocks::write_thermo_block(&params.thermo, &params.compute)?;
    let context = context.with_thermo_columns(thermo_columns);
    text.push_str(&thermo_block);
    text.push_str(&blocks::write_dump_block(
        &params.dump,
        &params.compute,
        &context,
        &filenames.trajectory,
    )?);

    let restart_params = params.restart.clone().unwrap_or_default();
    let restart_blocks =
        blocks::write_restart_blocks(&restart_params, &filenames.restart, context.max_steps);
    text.push_str(&restart_blocks.intermediate);

    match run_mode {
        RunMode::Minimize => {
            // run_mode() guarantees the section is present
            if let Some(minimize) = &params.minimize {
                text.push_str(&blocks::write_minimize_block(minimize));
            }
        }
        RunMode::MolecularDynamics => {
            if let Some(md) = &params.md {
                text.push_str(&blocks::write_md_block(md, &params.velocity, &params.fix)?);
            }
        }
    }

    text.push_str(&blocks::write_final_variables_block(
        &context.thermo_columns,
        &filenames.variables,
    ));
    text.push_str(&restart_blocks.final_block);

    debug!(
        columns = context.thermo_columns.len(),
        groups = groups.len(),
        restart = restart_source.is_some(),
        "compiled input script"
    );

    Ok(CompiledScript {
        text,
        thermo_columns: context.thermo_columns,
        groups,
    })
}
