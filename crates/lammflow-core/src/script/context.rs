use crate::core::models::potential::{AtomStyle, UnitStyle};

/// Shared, immutable information threaded between block generators.
///
/// Blocks never mutate a context they receive; the compiler installs the
/// values a later block needs (declared groups, thermo columns) by building
/// an updated copy. This keeps every generator a pure function of its
/// arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationContext {
    pub kind_symbols: Vec<String>,
    pub atom_style: AtomStyle,
    pub units: UnitStyle,
    /// Group names declared by the structure block.
    pub groups: Vec<String>,
    /// Ordered thermo column names produced by the thermo block.
    pub thermo_columns: Vec<String>,
    /// Total step budget of the run, for restart-interval defaults.
    pub max_steps: u32,
}

impl CompilationContext {
    pub fn new(kind_symbols: Vec<String>, atom_style: AtomStyle, units: UnitStyle) -> Self {
        Self {
            kind_symbols,
            atom_style,
            units,
            groups: Vec::new(),
            thermo_columns: Vec::new(),
            max_steps: 0,
        }
    }

    /// Whether `name` is a declared group or the built-in `all`.
    pub fn has_group(&self, name: &str) -> bool {
        name == "all" || self.groups.iter().any(|group| group == name)
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_thermo_columns(mut self, columns: Vec<String>) -> Self {
        self.thermo_columns = columns;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }
}
