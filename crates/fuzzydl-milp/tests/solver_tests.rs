//! Solver behaviour on the constraint shapes the reasoner emits

use fuzzydl_milp::{
    Expression, Inequality, MilpModel, MilpSolver, Objective, SimplexSolver, SolverConfig,
    VariableKind,
};
use proptest::prelude::*;

fn solver() -> SimplexSolver {
    SimplexSolver::new()
}

/// x ≥ y1 + y2 - 1 (Łukasiewicz conjunction lower bound)
#[test]
fn lukasiewicz_conjunction_bound() {
    let mut model = MilpModel::new();
    let x = model.variable("a:(and A B)", VariableKind::SemiContinuous);
    let a = model.variable("a:A", VariableKind::SemiContinuous);
    let b = model.variable("a:B", VariableKind::SemiContinuous);
    model.add_constraint_with_bound(Expression::var(a), Inequality::GreaterEqual, 0.8);
    model.add_constraint_with_bound(Expression::var(b), Inequality::GreaterEqual, 0.7);
    model.add_constraint(Expression::var(x) - a - b + 1.0, Inequality::GreaterEqual);

    let solution = model
        .optimize(&solver(), Some(&Objective::Minimize(Expression::var(x))))
        .unwrap();
    assert!(solution.feasible);
    assert!((solution.objective - 0.5).abs() < 1e-6);
}

/// Big-M selector: x ≤ 0.3 ∨ x ≤ 0.9 chosen by a binary
#[test]
fn big_m_disjunction_picks_larger_branch() {
    let mut model = MilpModel::new();
    let x = model.variable("x", VariableKind::SemiContinuous);
    let s = model.variable("s", VariableKind::Binary);
    // x ≤ 0.3 + s, x ≤ 0.9 + (1 - s)
    model.add_constraint(Expression::var(x) - s - 0.3, Inequality::LessEqual);
    model.add_constraint(Expression::var(x) + s - 1.9, Inequality::LessEqual);
    let solution = model
        .optimize(&solver(), Some(&Objective::Maximize(Expression::var(x))))
        .unwrap();
    assert!(solution.feasible);
    assert!((solution.objective - 0.9).abs() < 1e-6);
    // s = 1 relaxes the 0.3 branch
    assert!(solution.value("s").is_some_and(|v| (v - 1.0).abs() < 1e-6));
}

#[test]
fn contradiction_short_circuits() {
    let mut model = MilpModel::new();
    model.variable("x", VariableKind::SemiContinuous);
    model.add_contradiction();
    let solution = model.optimize(&solver(), None).unwrap();
    assert!(!solution.feasible);
}

#[test]
fn objective_constant_is_reported() {
    let mut model = MilpModel::new();
    let q = model.variable("q", VariableKind::SemiContinuous);
    model.add_constraint_with_bound(Expression::var(q), Inequality::LessEqual, 0.4);
    let objective = Objective::Maximize(Expression::var(q) + 1.0);
    let solution = model.optimize(&solver(), Some(&objective)).unwrap();
    assert!((solution.objective - 1.4).abs() < 1e-6);
}

#[test]
fn node_limit_is_an_error() {
    let config = SolverConfig {
        max_nodes: 1,
        ..SolverConfig::default()
    };
    let mut model = MilpModel::new();
    let b = model.variable("b", VariableKind::Binary);
    let x = model.variable("x", VariableKind::SemiContinuous);
    // forces a fractional relaxation: x ≤ 2b, x ≥ 0.5, minimise b
    model.add_constraint(Expression::var(x) - Expression::term(2.0, b), Inequality::LessEqual);
    model.add_constraint_with_bound(Expression::var(x), Inequality::GreaterEqual, 0.5);
    let result = SimplexSolver::with_config(config).solve(&model, Some(&Objective::Minimize(Expression::var(b))));
    assert!(result.is_err());
}

proptest! {
    /// A single bounded degree variable is feasible exactly when lower ≤ upper
    #[test]
    fn interval_feasibility(lower in 0.0f64..1.0, upper in 0.0f64..1.0) {
        let mut model = MilpModel::new();
        let x = model.variable("x", VariableKind::SemiContinuous);
        model.add_constraint_with_bound(Expression::var(x), Inequality::GreaterEqual, lower);
        model.add_constraint_with_bound(Expression::var(x), Inequality::LessEqual, upper);
        let solution = model.optimize(&solver(), None).unwrap();
        if lower <= upper - 1e-6 {
            prop_assert!(solution.feasible);
        }
        if lower > upper + 1e-6 {
            prop_assert!(!solution.feasible);
        }
    }

    /// max min(a, b) under a ≤ p, b ≤ q encoded with a selector binary equals min(p, q)
    #[test]
    fn goedel_minimum_encoding(p in 0.0f64..1.0, q in 0.0f64..1.0) {
        let mut model = MilpModel::new();
        let z = model.variable("z", VariableKind::SemiContinuous);
        let a = model.variable("a", VariableKind::SemiContinuous);
        let b = model.variable("b", VariableKind::SemiContinuous);
        let s = model.variable("s", VariableKind::Binary);
        model.add_constraint_with_bound(Expression::var(a), Inequality::LessEqual, p);
        model.add_constraint_with_bound(Expression::var(b), Inequality::LessEqual, q);
        model.add_constraint(Expression::var(z) - a, Inequality::LessEqual);
        model.add_constraint(Expression::var(z) - b, Inequality::LessEqual);
        // z ≥ a - s, z ≥ b - (1 - s)
        model.add_constraint(Expression::var(z) - a + s, Inequality::GreaterEqual);
        model.add_constraint(Expression::var(z) - b - s + 1.0, Inequality::GreaterEqual);
        let solution = model
            .optimize(&solver(), Some(&Objective::Maximize(Expression::var(z))))
            .unwrap();
        prop_assert!(solution.feasible);
        prop_assert!((solution.objective - p.min(q)).abs() < 1e-6);
    }
}
