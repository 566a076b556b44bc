//! Script block generators.
//!
//! One pure function per logical input-script section. Each returns a text
//! fragment delimited by start/end marker comments; generators that declare
//! names the rest of the script depends on (groups, thermo columns) return
//! them alongside the text so the compiler can thread them forward.

use super::CompileError;
use super::context::CompilationContext;
use crate::core::models::args::{Arg, join_args};
use crate::core::models::parameters::{
    ControlParameters, DumpParameters, MdParameters, MinimizeParameters, PotentialParameters,
    RestartParameters, StructureParameters, StyleRequest, ThermoParameters, VelocityDirective,
    VelocityStyle,
};
use crate::core::models::potential::{AtomStyle, CoefficientData, Potential, UnitStyle};
use crate::core::tables::{COMPUTES, ComputeKind, ComputeSpec, INTEGRATOR_STYLES, Locality};
use std::fmt::Write as _;

/// Seed used for `velocity create` when the job does not set one. Fixed so
/// that compiling the same parameters twice yields byte-identical scripts.
pub const DEFAULT_VELOCITY_SEED: u64 = 4928459;

/// Identifier of the trajectory dump command, shared with `dump_modify`.
const DUMP_ID: &str = "aiida";

/// Start/end marker line delimiting one script block.
pub fn block_header(title: &str) -> String {
    format!("#{title:-^80}#\n")
}

/// Deterministic identifier for a `(style, group)` fix/compute pair.
///
/// Slashes in the style are replaced by underscores and the group plus a
/// fixed suffix appended, so output parsing can reverse the mapping without
/// extra bookkeeping: `("box/relax", "all")` → `box_relax_all_aiida`.
pub fn generate_id_tag(style: &str, group: &str) -> String {
    format!("{}_{}_aiida", style.replace('/', "_"), group)
}

/// Replaces every character outside `[a-zA-Z0-9_]` with `__`, making a
/// thermo column name usable as a LAMMPS variable identifier.
pub fn sanitize_variable_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            sanitized.push(ch);
        } else {
            sanitized.push_str("__");
        }
    }
    sanitized
}

/// Expands a compute reference into the concrete `c_<tag>[i]` tokens the
/// thermo/dump commands print, according to the compute's declared shape.
fn compute_references(style: &str, group: &str, spec: &ComputeSpec) -> Vec<String> {
    let tag = generate_id_tag(style, group);
    match spec.kind {
        ComputeKind::Scalar | ComputeKind::Array => vec![format!("c_{tag}")],
        ComputeKind::Vector(0) => vec![format!("c_{tag}[*]")],
        ComputeKind::Vector(size) => (1..=size).map(|i| format!("c_{tag}[{i}]")).collect(),
        ComputeKind::Mixed(size) => {
            let mut refs = vec![format!("c_{tag}")];
            if size == 0 {
                refs.push(format!("c_{tag}[*]"));
            } else {
                refs.extend((1..=size).map(|i| format!("c_{tag}[{i}]")));
            }
            refs
        }
    }
}

fn compute_spec(style: &str) -> Result<&'static ComputeSpec, CompileError> {
    COMPUTES
        .get(style)
        .ok_or_else(|| CompileError::UnknownCompute(style.to_string()))
}

/// Global control options: unit system, newton setting, processor grid and
/// the timestep (table default when unset).
pub fn write_control_block(control: &ControlParameters, units: UnitStyle) -> String {
    let mut block = block_header("Start of the Control information");
    block.push_str("clear\n");
    let _ = writeln!(block, "units {units}");
    let newton = if control.newton.unwrap_or(true) {
        "on"
    } else {
        "off"
    };
    let _ = writeln!(block, "newton {newton}");
    if let Some(processors) = &control.processors {
        let _ = writeln!(block, "processors {}", join_args(processors));
    }
    let timestep = control.timestep.unwrap_or_else(|| units.default_timestep());
    let _ = writeln!(block, "timestep {timestep}");
    block.push_str(&block_header("End of the Control information"));
    block
}

/// Structure setup: tilt/dimension/boundary settings, the `read_data`
/// command and the group declarations. Returns the declared group names.
///
/// Any `type <ids…>` selector inside a group definition is validated
/// against the kind ids actually present in the structure.
pub fn write_structure_block(
    params: &StructureParameters,
    context: &CompilationContext,
    pbc: [bool; 3],
    structure_filename: &str,
) -> Result<(String, Vec<String>), CompileError> {
    let n_kinds = context.kind_symbols.len();
    let mut group_names = Vec::new();

    let mut block = block_header("Start of the Structure information");
    let _ = writeln!(
        block,
        "box tilt {}",
        params.box_tilt.as_deref().unwrap_or("small")
    );
    let dimension = params
        .dimension
        .unwrap_or_else(|| pbc.iter().filter(|&&p| p).count() as u8);
    let _ = writeln!(block, "dimension {dimension}");
    let boundary: Vec<String> = match &params.boundary {
        Some(flags) => flags.clone(),
        None => pbc
            .iter()
            .map(|&periodic| if periodic { "p" } else { "f" }.to_string())
            .collect(),
    };
    let _ = writeln!(block, "boundary {}", boundary.join(" "));
    let _ = writeln!(block, "atom_style {}", context.atom_style);
    let _ = writeln!(block, "read_data {structure_filename}");

    for group in &params.groups {
        validate_type_selector(&group.name, &group.args, n_kinds)?;
        let _ = writeln!(block, "group {} {}", group.name, join_args(&group.args));
        group_names.push(group.name.clone());
    }

    block.push_str(&block_header("End of the Structure information"));
    Ok((block, group_names))
}

fn validate_type_selector(group: &str, args: &[Arg], n_kinds: usize) -> Result<(), CompileError> {
    let Some(position) = args.iter().position(|arg| arg.as_text() == Some("type")) else {
        return Ok(());
    };
    for arg in &args[position + 1..] {
        let Some(id) = arg.as_int() else { break };
        if id < 1 || id as usize > n_kinds {
            return Err(CompileError::UnknownKindId {
                group: group.to_string(),
                id,
                count: n_kinds,
            });
        }
    }
    Ok(())
}

/// Potential setup: `pair_style`, the coefficient source and neighbor-list
/// tuning. Whether coefficients are inlined or read from the stored file is
/// decided by the pair-style table, never by inspecting the data.
pub fn write_potential_block(
    params: &PotentialParameters,
    potential: &Potential,
    context: &CompilationContext,
    potential_filename: &str,
) -> String {
    let mut block = block_header("Start of Potential information");
    match &params.potential_style_options {
        Some(options) => {
            let _ = writeln!(
                block,
                "pair_style {} {}",
                potential.pair_style(),
                join_args(options)
            );
        }
        None => {
            let _ = writeln!(block, "pair_style {}", potential.pair_style());
        }
    }

    match potential.coefficients() {
        CoefficientData::Stored { .. } => {
            let _ = writeln!(
                block,
                "pair_coeff * * {} {}",
                potential_filename,
                context.kind_symbols.join(" ")
            );
        }
        CoefficientData::Inline(text) => {
            let data = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(block, "pair_coeff * * {data}");
        }
    }

    if let Some(neighbor) = &params.neighbor {
        let _ = writeln!(block, "neighbor {}", join_args(neighbor));
    }
    if let Some(neighbor_modify) = &params.neighbor_modify {
        let _ = writeln!(block, "neigh_modify {}", join_args(neighbor_modify));
    }
    block.push_str(&block_header("End of Potential information"));
    block
}

/// Fix declarations, one per requested `(style, group)` pair, with the
/// deterministic id tags the thermo/dump blocks rely on.
pub fn write_fix_block(
    fixes: &[StyleRequest],
    context: &CompilationContext,
) -> Result<String, CompileError> {
    let mut block = block_header("Start of the Fix information");
    for fix in fixes {
        let group = fix.group();
        if !context.has_group(group) {
            return Err(CompileError::UndeclaredGroup {
                style: fix.style.clone(),
                group: group.to_string(),
            });
        }
        let _ = writeln!(
            block,
            "fix {} {} {} {}",
            generate_id_tag(&fix.style, group),
            group,
            fix.style,
            join_args(&fix.args)
        );
    }
    block.push_str(&block_header("End of the Fix information"));
    Ok(block)
}

/// Compute declarations, mirroring the fix block.
pub fn write_compute_block(
    computes: &[StyleRequest],
    context: &CompilationContext,
) -> Result<String, CompileError> {
    let mut block = block_header("Start of the Compute information");
    for compute in computes {
        compute_spec(&compute.style)?;
        let group = compute.group();
        if !context.has_group(group) {
            return Err(CompileError::UndeclaredGroup {
                style: compute.style.clone(),
                group: group.to_string(),
            });
        }
        let _ = writeln!(
            block,
            "compute {} {} {} {}",
            generate_id_tag(&compute.style, group),
            group,
            compute.style,
            join_args(&compute.args)
        );
    }
    block.push_str(&block_header("End of the Compute information"));
    Ok(block)
}

/// Thermo output: the printed column set (always `step` first and `etotal`
/// last) plus any global printable computes. Returns the full ordered
/// column list so the final-variables block and the output parser agree on
/// column semantics.
pub fn write_thermo_block(
    thermo: &ThermoParameters,
    computes: &[StyleRequest],
) -> Result<(String, Vec<String>), CompileError> {
    let mut compute_tokens = Vec::new();
    for compute in computes {
        let spec = compute_spec(&compute.style)?;
        if spec.locality == Locality::Global && spec.printable {
            compute_tokens.extend(compute_references(&compute.style, compute.group(), spec));
        }
    }

    let mut columns: Vec<String> = match &thermo.thermo_printing {
        Some(selection) if !selection.is_empty() => selection
            .iter()
            .filter(|&(_, &enabled)| enabled)
            .map(|(name, _)| name.clone())
            .collect(),
        _ => ["step", "temp", "epair", "emol", "etotal", "press"]
            .map(String::from)
            .to_vec(),
    };
    columns.retain(|name| name != "step");
    columns.insert(0, "step".to_string());
    if let Some(position) = columns.iter().position(|name| name == "etotal") {
        columns.remove(position);
    }
    columns.push("etotal".to_string());

    let mut printed = columns.clone();
    printed.extend(compute_tokens);

    let mut block = block_header("Start of the Thermo information");
    let _ = writeln!(block, "thermo_style custom {}", printed.join(" "));
    let _ = writeln!(block, "thermo {}", thermo.printing_rate.unwrap_or(1000));
    block.push_str(&block_header("End of the Thermo information"));
    Ok((block, printed))
}

/// Trajectory dump: always `id type element x y z`, plus `q` for the charge
/// atom style and any atom-local printable computes. Formats are pinned so
/// the dump parses without column sniffing.
pub fn write_dump_block(
    dump: &DumpParameters,
    computes: &[StyleRequest],
    context: &CompilationContext,
    trajectory_filename: &str,
) -> Result<String, CompileError> {
    let mut compute_tokens = Vec::new();
    for compute in computes {
        let spec = compute_spec(&compute.style)?;
        if spec.locality == Locality::Local && spec.printable {
            compute_tokens.extend(compute_references(&compute.style, compute.group(), spec));
        }
    }

    let mut fields = vec!["id", "type", "element", "x", "y", "z"]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    if context.atom_style == AtomStyle::Charge {
        fields.push("q".to_string());
    }
    fields.extend(compute_tokens);

    let mut block = block_header("Start of the Dump information");
    let _ = writeln!(
        block,
        "dump {} all custom {} {} {}",
        DUMP_ID,
        dump.dump_rate.unwrap_or(10),
        trajectory_filename,
        fields.join(" ")
    );
    let _ = writeln!(block, "dump_modify {DUMP_ID} sort id");
    let _ = writeln!(
        block,
        "dump_modify {} element {}",
        DUMP_ID,
        context.kind_symbols.join(" ")
    );
    let _ = writeln!(block, "dump_modify {DUMP_ID} format int ' %d '");
    let _ = writeln!(block, "dump_modify {DUMP_ID} format float ' %16.10e '");
    block.push_str(&block_header("End of the Dump information"));
    Ok(block)
}

/// Minimization run: `min_style` plus the single `minimize` command.
pub fn write_minimize_block(minimize: &MinimizeParameters) -> String {
    let mut block = block_header("Start of the Minimization information");
    let _ = writeln!(block, "min_style {}", minimize.style());
    let _ = writeln!(
        block,
        "minimize {} {} {} {}",
        minimize.energy_tolerance(),
        minimize.force_tolerance(),
        minimize.max_iterations(),
        minimize.max_evaluations()
    );
    block.push_str(&block_header("End of the Minimization information"));
    block
}

/// MD run: velocity initialization, timestep-counter reset, run style and
/// the `run` command. Requires a time-integrator fix to already exist in
/// the fix section; emitting `run` without one would make the engine
/// silently integrate nothing.
pub fn write_md_block(
    md: &MdParameters,
    velocity: &[VelocityDirective],
    fixes: &[StyleRequest],
) -> Result<String, CompileError> {
    if !fixes
        .iter()
        .any(|fix| INTEGRATOR_STYLES.contains(fix.style.as_str()))
    {
        return Err(CompileError::MissingIntegrator);
    }

    let mut block = block_header("Start of the MD information");
    for directive in velocity {
        block.push_str(&render_velocity(directive));
    }
    let _ = writeln!(block, "reset_timestep {}", md.reset_timestep.unwrap_or(0));
    if md.run_style() == "respa" {
        let _ = writeln!(
            block,
            "run_style respa {}",
            md.respa_options.as_deref().map(join_args).unwrap_or_default()
        );
    } else {
        let _ = writeln!(block, "run_style {}", md.run_style());
    }
    let _ = writeln!(block, "run {}", md.max_number_steps());
    block.push_str(&block_header("End of the MD information"));
    Ok(block)
}

/// Renders one velocity directive as a single `velocity` command with the
/// style-specific argument ordering.
fn render_velocity(directive: &VelocityDirective) -> String {
    let group = directive.group();
    let mut line = match &directive.style {
        VelocityStyle::Create { temp, seed } => {
            format!(
                "velocity {group} create {temp} {}",
                seed.unwrap_or(DEFAULT_VELOCITY_SEED)
            )
        }
        VelocityStyle::Set { vx, vy, vz } => {
            let component = |value: &Option<f64>| {
                value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "NULL".to_string())
            };
            format!(
                "velocity {group} set {} {} {}",
                component(vx),
                component(vy),
                component(vz)
            )
        }
        VelocityStyle::Scale(factor) => format!("velocity {group} scale {factor}"),
        VelocityStyle::Ramp {
            vdim,
            vlo,
            vhi,
            dim,
            clo,
            chi,
        } => format!("velocity {group} ramp {vdim} {vlo} {vhi} {dim} {clo} {chi}"),
        VelocityStyle::Zero(mode) => format!("velocity {group} zero {mode}"),
    };

    // global options share one fixed emission order across all styles
    const OPTION_ORDER: [&str; 9] = [
        "dist", "sum", "mom", "rot", "temp", "bias", "loop", "rigid", "units",
    ];
    for option in OPTION_ORDER {
        if let Some(value) = directive.options.get(option) {
            let _ = write!(line, " {option} {value}");
        }
    }
    line.push('\n');
    line
}

/// The two restart-output fragments: a periodic `restart` command placed
/// before the run and a final `write_restart` placed after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestartBlocks {
    pub intermediate: String,
    pub final_block: String,
}

pub fn write_restart_blocks(
    restart: &RestartParameters,
    restart_filename: &str,
    max_steps: u32,
) -> RestartBlocks {
    let mut blocks = RestartBlocks::default();

    if restart.print_intermediate {
        let interval = restart.num_steps.unwrap_or_else(|| (max_steps / 10).max(1));
        blocks.intermediate =
            block_header("Start of the intermediate write restart information");
        let _ = writeln!(
            blocks.intermediate,
            "restart {interval} {restart_filename}"
        );
        blocks
            .intermediate
            .push_str(&block_header("End of the intermediate write restart information"));
    }

    if restart.print_final {
        blocks.final_block = block_header("Start of the write restart information");
        let _ = writeln!(blocks.final_block, "write_restart {restart_filename}");
        blocks
            .final_block
            .push_str(&block_header("End of the write restart information"));
    }

    blocks
}

/// `read_restart` fragment replacing the structure block when resuming from
/// a restart artifact.
pub fn write_read_restart_block(restart_filename: &str) -> String {
    let mut block = block_header("Start of the read restart information");
    let _ = writeln!(block, "read_restart {restart_filename}");
    block.push_str(&block_header("End of the read restart information"));
    block
}

/// Final-variables block: aliases every thermo column to a variable and
/// prints `final_<name>: <value>` lines to the side file, decoupling final
/// scalar results from last-row table parsing.
pub fn write_final_variables_block(thermo_columns: &[String], variables_filename: &str) -> String {
    let sanitized: Vec<String> = thermo_columns
        .iter()
        .map(|name| sanitize_variable_name(name))
        .collect();

    let mut block = block_header("Start of the Final Variables information");
    for (name, column) in sanitized.iter().zip(thermo_columns) {
        let _ = writeln!(block, "variable final_{name} equal {column}");
    }
    block.push_str(&block_header("End of the Final Variables information"));

    block.push_str(&block_header(
        "Start of the Printing Final Variables information",
    ));
    let _ = writeln!(block, "print \"#Final results\" file {variables_filename}");
    for name in &sanitized {
        let _ = writeln!(
            block,
            "print \"final_{name}: ${{final_{name}}}\" append {variables_filename}"
        );
    }
    block.push_str(&block_header(
        "End of the Printing Final Variables information",
    ));
    block
}
