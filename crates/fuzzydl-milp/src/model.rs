//! MILP model bookkeeping: variables, constraints and the solver seam

use crate::expression::{Expression, VarId};
use crate::MilpError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// Domain of a MILP variable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VariableKind {
    /// 0 or 1
    Binary,
    /// Continuous in [0, 1] (truth degrees)
    SemiContinuous,
    /// Continuous in [lower, upper]
    Continuous { lower: f64, upper: f64 },
    /// Integral in [lower, upper]
    Integer { lower: f64, upper: f64 },
}

impl VariableKind {
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            VariableKind::Binary | VariableKind::SemiContinuous => (0.0, 1.0),
            VariableKind::Continuous { lower, upper } | VariableKind::Integer { lower, upper } => {
                (*lower, *upper)
            }
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, VariableKind::Binary | VariableKind::Integer { .. })
    }
}

/// A named MILP variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub kind: VariableKind,
}

/// Relation between an expression and zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inequality {
    LessEqual,
    GreaterEqual,
    Equal,
}

impl fmt::Display for Inequality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inequality::LessEqual => write!(f, "<="),
            Inequality::GreaterEqual => write!(f, ">="),
            Inequality::Equal => write!(f, "="),
        }
    }
}

/// `expression ⋈ 0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub expression: Expression,
    pub kind: Inequality,
}

impl Constraint {
    pub fn is_satisfied<F>(&self, value_of: F, tolerance: f64) -> bool
    where
        F: Fn(VarId) -> f64,
    {
        let value = self.expression.evaluate(value_of);
        match self.kind {
            Inequality::LessEqual => value <= tolerance,
            Inequality::GreaterEqual => value >= -tolerance,
            Inequality::Equal => value.abs() <= tolerance,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} 0", self.expression, self.kind)
    }
}

/// Optimisation direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Objective {
    Minimize(Expression),
    Maximize(Expression),
}

/// Result of an optimisation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Solution {
    pub feasible: bool,
    pub objective: f64,
    pub values: HashMap<String, f64>,
}

impl Solution {
    pub fn infeasible() -> Self {
        Self::default()
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Solver tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Maximum branch-and-bound nodes explored per optimisation
    pub max_nodes: usize,
    /// Distance to the nearest integer under which a value counts as integral
    pub integrality_tolerance: f64,
    /// Constraint violation tolerated in a reported solution
    pub feasibility_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_nodes: 200_000,
            integrality_tolerance: 1e-6,
            feasibility_tolerance: 1e-6,
        }
    }
}

/// Backend that optimises a [`MilpModel`]
pub trait MilpSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solves the model. Infeasibility is reported through [`Solution::feasible`],
    /// not as an error.
    fn solve(&self, model: &MilpModel, objective: Option<&Objective>) -> Result<Solution, MilpError>;
}

/// Session-scoped MILP bookkeeping.
///
/// All counters live here, so two models never share variable numbering.
#[derive(Debug, Clone, Default)]
pub struct MilpModel {
    variables: Vec<Variable>,
    by_name: HashMap<String, VarId>,
    constraints: Vec<Constraint>,
    contradiction: bool,
    fresh_counter: usize,
}

impl MilpModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the variable called `name`, creating it if needed
    pub fn variable(&mut self, name: &str, kind: VariableKind) -> VarId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = VarId(self.variables.len());
        trace!(variable = %name, ?kind, "new MILP variable");
        self.variables.push(Variable {
            id,
            name: name.to_string(),
            kind,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Creates an anonymous variable with a fresh name
    pub fn new_variable(&mut self, kind: VariableKind) -> VarId {
        loop {
            let name = format!("y{}", self.fresh_counter);
            self.fresh_counter += 1;
            if !self.by_name.contains_key(&name) {
                return self.variable(&name, kind);
            }
        }
    }

    pub fn find_variable(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    pub fn variable_info(&self, id: VarId) -> Result<&Variable, MilpError> {
        self.variables
            .get(id.0)
            .ok_or_else(|| MilpError::UnknownVariable(id.to_string()))
    }

    /// Replaces the domain of an existing variable
    pub fn set_kind(&mut self, id: VarId, kind: VariableKind) -> Result<(), MilpError> {
        let (lower, upper) = kind.bounds();
        if lower > upper {
            return Err(MilpError::InvalidBounds(format!("[{lower}, {upper}] for {id}")));
        }
        let variable = self
            .variables
            .get_mut(id.0)
            .ok_or_else(|| MilpError::UnknownVariable(id.to_string()))?;
        trace!(variable = %variable.name, ?kind, "variable domain changed");
        variable.kind = kind;
        Ok(())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Adds `expression ⋈ 0`
    pub fn add_constraint(&mut self, expression: Expression, kind: Inequality) {
        if expression.is_constant() {
            let holds = Constraint {
                expression: expression.clone(),
                kind,
            }
            .is_satisfied(|_| 0.0, 1e-9);
            if !holds {
                debug!(%expression, %kind, "constant constraint is violated");
                self.add_contradiction();
            }
            return;
        }
        self.constraints.push(Constraint { expression, kind });
    }

    /// Adds `expression ⋈ bound`
    pub fn add_constraint_with_bound(&mut self, expression: Expression, kind: Inequality, bound: f64) {
        self.add_constraint(expression - bound, kind);
    }

    /// Makes the model infeasible
    pub fn add_contradiction(&mut self) {
        self.contradiction = true;
    }

    pub fn has_contradiction(&self) -> bool {
        self.contradiction
    }

    pub fn optimize(&self, solver: &dyn MilpSolver, objective: Option<&Objective>) -> Result<Solution, MilpError> {
        if self.contradiction {
            debug!("model carries an explicit contradiction");
            return Ok(Solution::infeasible());
        }
        debug!(
            solver = solver.name(),
            variables = self.variables.len(),
            constraints = self.constraints.len(),
            "optimising MILP model"
        );
        solver.solve(self, objective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_lookup_by_name() {
        let mut model = MilpModel::new();
        let a = model.variable("a:C", VariableKind::SemiContinuous);
        let b = model.variable("a:C", VariableKind::SemiContinuous);
        assert_eq!(a, b);
        assert_eq!(model.num_variables(), 1);
        assert_eq!(model.find_variable("a:C"), Some(a));
    }

    #[test]
    fn test_fresh_variables_skip_taken_names() {
        let mut model = MilpModel::new();
        model.variable("y0", VariableKind::Binary);
        let fresh = model.new_variable(VariableKind::Binary);
        assert_eq!(model.variable_info(fresh).unwrap().name, "y1");
    }

    #[test]
    fn test_violated_constant_constraint_is_contradiction() {
        let mut model = MilpModel::new();
        model.add_constraint(Expression::constant(-1.0), Inequality::GreaterEqual);
        assert!(model.has_contradiction());
        assert_eq!(model.num_constraints(), 0);
    }
}
