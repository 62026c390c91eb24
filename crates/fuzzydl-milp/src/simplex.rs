//! Reference MILP backend: dense two-phase simplex with depth-first branch-and-bound.
//!
//! The tableau is dense and every branch-and-bound node is solved from scratch,
//! which keeps the implementation small. Bland's rule rules out cycling on the
//! highly degenerate Big-M systems the reasoner produces.

use crate::expression::VarId;
use crate::model::{Inequality, MilpModel, MilpSolver, Objective, Solution, SolverConfig};
use crate::MilpError;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

const PIVOT_EPS: f64 = 1e-9;
const COST_EPS: f64 = 1e-9;
const PHASE_ONE_EPS: f64 = 1e-7;
const MAX_PIVOTS: usize = 500_000;

/// Outcome of one LP relaxation
#[derive(Debug, Clone)]
enum LpOutcome {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
}

/// Row sense after normalising the right-hand side to be non-negative
#[derive(Debug, Clone, Copy, PartialEq)]
enum Sense {
    Le,
    Ge,
    Eq,
}

struct Tableau {
    rows: Vec<Vec<f64>>,
    objective: Vec<f64>,
    basis: Vec<usize>,
    width: usize,
}

impl Tableau {
    fn rhs(&self) -> usize {
        self.width
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let rhs = self.rhs();
        let pivot = self.rows[row][col];
        for value in self.rows[row].iter_mut() {
            *value /= pivot;
        }
        let pivot_row = self.rows[row].clone();
        for (index, current) in self.rows.iter_mut().enumerate() {
            if index == row {
                continue;
            }
            let factor = current[col];
            if factor.abs() > 0.0 {
                for j in 0..=rhs {
                    current[j] -= factor * pivot_row[j];
                }
            }
        }
        let factor = self.objective[col];
        if factor.abs() > 0.0 {
            for j in 0..=rhs {
                self.objective[j] -= factor * pivot_row[j];
            }
        }
        self.basis[row] = col;
    }

    /// Runs primal simplex iterations over the allowed columns
    fn iterate(&mut self, allowed: &[bool]) -> Result<bool, MilpError> {
        let rhs = self.rhs();
        for _ in 0..MAX_PIVOTS {
            let entering = (0..self.width).find(|&j| allowed[j] && self.objective[j] < -COST_EPS);
            let Some(col) = entering else {
                return Ok(true);
            };

            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.rows.iter().enumerate() {
                let a = row[col];
                if a > PIVOT_EPS {
                    let ratio = row[rhs] / a;
                    leaving = match leaving {
                        None => Some((i, ratio)),
                        Some((best, best_ratio)) => {
                            if ratio < best_ratio - 1e-12
                                || ((ratio - best_ratio).abs() <= 1e-12 && self.basis[i] < self.basis[best])
                            {
                                Some((i, ratio))
                            } else {
                                Some((best, best_ratio))
                            }
                        }
                    };
                }
            }
            match leaving {
                Some((row, _)) => self.pivot(row, col),
                None => return Ok(false),
            }
        }
        Err(MilpError::IterationLimit(MAX_PIVOTS))
    }
}

/// Dense simplex + branch-and-bound solver
#[derive(Debug, Clone, Default)]
pub struct SimplexSolver {
    config: SolverConfig,
}

impl SimplexSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn solve_relaxation(
        &self,
        model: &MilpModel,
        lower: &[f64],
        upper: &[f64],
        cost: &[f64],
    ) -> Result<LpOutcome, MilpError> {
        let n = lower.len();
        if lower.iter().zip(upper).any(|(l, u)| *l > *u + self.config.feasibility_tolerance) {
            return Ok(LpOutcome::Infeasible);
        }

        // Shift every variable to x' = x - lower so that x' >= 0.
        let mut rows: Vec<(Vec<f64>, Sense, f64)> = Vec::new();
        for constraint in model.constraints() {
            let mut coefficients = vec![0.0; n];
            let mut rhs = -constraint.expression.constant_term();
            for (var, coefficient) in constraint.expression.terms() {
                coefficients[var.0] += coefficient;
                rhs -= coefficient * lower[var.0];
            }
            let sense = match constraint.kind {
                Inequality::LessEqual => Sense::Le,
                Inequality::GreaterEqual => Sense::Ge,
                Inequality::Equal => Sense::Eq,
            };
            rows.push((coefficients, sense, rhs));
        }
        for j in 0..n {
            let mut coefficients = vec![0.0; n];
            coefficients[j] = 1.0;
            rows.push((coefficients, Sense::Le, (upper[j] - lower[j]).max(0.0)));
        }

        for row in rows.iter_mut() {
            if row.2 < 0.0 {
                for value in row.0.iter_mut() {
                    *value = -*value;
                }
                row.2 = -row.2;
                row.1 = match row.1 {
                    Sense::Le => Sense::Ge,
                    Sense::Ge => Sense::Le,
                    Sense::Eq => Sense::Eq,
                };
            }
        }

        let slack_count = rows.iter().filter(|row| row.1 != Sense::Eq).count();
        let artificial_count = rows.iter().filter(|row| row.1 != Sense::Le).count();
        let width = n + slack_count + artificial_count;
        let first_artificial = n + slack_count;

        let mut tableau = Tableau {
            rows: Vec::with_capacity(rows.len()),
            objective: vec![0.0; width + 1],
            basis: Vec::with_capacity(rows.len()),
            width,
        };
        let mut next_slack = n;
        let mut next_artificial = first_artificial;
        for (coefficients, sense, rhs) in rows {
            let mut row = vec![0.0; width + 1];
            row[..n].copy_from_slice(&coefficients);
            row[width] = rhs;
            match sense {
                Sense::Le => {
                    row[next_slack] = 1.0;
                    tableau.basis.push(next_slack);
                    next_slack += 1;
                }
                Sense::Ge => {
                    row[next_slack] = -1.0;
                    next_slack += 1;
                    row[next_artificial] = 1.0;
                    tableau.basis.push(next_artificial);
                    next_artificial += 1;
                }
                Sense::Eq => {
                    row[next_artificial] = 1.0;
                    tableau.basis.push(next_artificial);
                    next_artificial += 1;
                }
            }
            tableau.rows.push(row);
        }

        // Phase 1: minimise the sum of artificial variables.
        if artificial_count > 0 {
            for j in first_artificial..width {
                tableau.objective[j] = 1.0;
            }
            for i in 0..tableau.rows.len() {
                if tableau.basis[i] >= first_artificial {
                    for j in 0..=width {
                        tableau.objective[j] -= tableau.rows[i][j];
                    }
                }
            }
            let allowed = vec![true; width];
            tableau.iterate(&allowed)?;
            let infeasibility = -tableau.objective[width];
            if infeasibility > PHASE_ONE_EPS {
                trace!(infeasibility, "phase one ended with positive artificial sum");
                return Ok(LpOutcome::Infeasible);
            }
            for i in 0..tableau.rows.len() {
                if tableau.basis[i] >= first_artificial {
                    if let Some(col) = (0..first_artificial).find(|&j| tableau.rows[i][j].abs() > PIVOT_EPS) {
                        tableau.pivot(i, col);
                    }
                }
            }
        }

        // Phase 2: original costs over structural and slack columns.
        let mut full_cost = vec![0.0; width];
        full_cost[..n].copy_from_slice(cost);
        for j in 0..=width {
            tableau.objective[j] = if j < width { full_cost[j] } else { 0.0 };
        }
        for i in 0..tableau.rows.len() {
            let basic_cost = full_cost[tableau.basis[i]];
            if basic_cost != 0.0 {
                for j in 0..=width {
                    tableau.objective[j] -= basic_cost * tableau.rows[i][j];
                }
            }
        }
        let allowed: Vec<bool> = (0..width).map(|j| j < first_artificial).collect();
        if !tableau.iterate(&allowed)? {
            return Ok(LpOutcome::Unbounded);
        }

        let mut values = lower.to_vec();
        for (i, basic) in tableau.basis.iter().enumerate() {
            if *basic < n {
                values[*basic] += tableau.rows[i][width];
            }
        }
        let objective = values.iter().zip(cost).map(|(x, c)| x * c).sum();
        Ok(LpOutcome::Optimal { values, objective })
    }
}

impl MilpSolver for SimplexSolver {
    fn name(&self) -> &'static str {
        "simplex-branch-and-bound"
    }

    fn solve(&self, model: &MilpModel, objective: Option<&Objective>) -> Result<Solution, MilpError> {
        let n = model.num_variables();
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        let mut integral = Vec::with_capacity(n);
        for variable in model.variables() {
            let (lo, up) = variable.kind.bounds();
            if !lo.is_finite() || !up.is_finite() || lo > up {
                return Err(MilpError::InvalidBounds(format!(
                    "{} has bounds [{lo}, {up}]",
                    variable.name
                )));
            }
            let (lo, up) = if variable.kind.is_integral() {
                (lo.ceil(), up.floor())
            } else {
                (lo, up)
            };
            lower.push(lo);
            upper.push(up);
            integral.push(variable.kind.is_integral());
        }

        let mut cost = vec![0.0; n];
        let (sign, constant) = match objective {
            None => (1.0, 0.0),
            Some(Objective::Minimize(expr)) => {
                for (var, coefficient) in expr.terms() {
                    cost[var.0] += coefficient;
                }
                (1.0, expr.constant_term())
            }
            Some(Objective::Maximize(expr)) => {
                for (var, coefficient) in expr.terms() {
                    cost[var.0] -= coefficient;
                }
                (-1.0, expr.constant_term())
            }
        };

        let tolerance = self.config.integrality_tolerance;
        let mut stack = vec![(lower, upper)];
        let mut best: Option<(f64, Vec<f64>)> = None;
        let mut nodes = 0usize;

        while let Some((lo, up)) = stack.pop() {
            nodes += 1;
            if nodes > self.config.max_nodes {
                warn!(nodes, "branch-and-bound node limit reached");
                return Err(MilpError::NodeLimitExceeded(self.config.max_nodes));
            }
            let (values, value) = match self.solve_relaxation(model, &lo, &up, &cost)? {
                LpOutcome::Infeasible => continue,
                LpOutcome::Unbounded => return Err(MilpError::Unbounded),
                LpOutcome::Optimal { values, objective } => (values, objective),
            };
            if let Some((incumbent, _)) = &best {
                if value >= incumbent - 1e-9 {
                    continue;
                }
            }

            let fractional = (0..n).find(|&j| integral[j] && (values[j] - values[j].round()).abs() > tolerance);
            match fractional {
                None => {
                    trace!(value, nodes, "new incumbent");
                    best = Some((value, values));
                    if objective.is_none() {
                        break;
                    }
                }
                Some(j) => {
                    let x = values[j];
                    let mut down_up = up.clone();
                    down_up[j] = x.floor();
                    let mut up_lo = lo.clone();
                    up_lo[j] = x.ceil();
                    // The branch closer to the relaxed value is explored first.
                    if x - x.floor() > 0.5 {
                        stack.push((lo, down_up));
                        stack.push((up_lo, up));
                    } else {
                        stack.push((up_lo, up));
                        stack.push((lo, down_up));
                    }
                }
            }
        }

        debug!(nodes, feasible = best.is_some(), "branch-and-bound finished");
        let Some((value, mut values)) = best else {
            return Ok(Solution::infeasible());
        };
        for (j, x) in values.iter_mut().enumerate() {
            if integral[j] {
                *x = x.round();
            }
        }
        let violated = model
            .constraints()
            .iter()
            .filter(|c| !c.is_satisfied(|v: VarId| values[v.0], self.config.feasibility_tolerance * 10.0))
            .count();
        if violated > 0 {
            warn!(violated, "solution violates constraints beyond tolerance");
        }

        let names: HashMap<String, f64> = model
            .variables()
            .iter()
            .map(|variable| (variable.name.clone(), values[variable.id.0]))
            .collect();
        Ok(Solution {
            feasible: true,
            objective: sign * value + constant,
            values: names,
        })
    }
}
