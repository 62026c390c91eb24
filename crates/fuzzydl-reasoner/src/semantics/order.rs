//! Shared MILP gadgets: selectors, minima, order statistics and
//! piecewise-linear pinning

use fuzzydl_milp::{Expression, Inequality, MilpModel, VarId, VariableKind};
use fuzzydl_model::Segment;

/// Chooses exactly one of `n` alternatives with `⌈log₂ n⌉` binaries.
///
/// Returns one mismatch expression per alternative: it is 0 for the chosen
/// alternative and at least 1 for every other one.
pub fn select_one(milp: &mut MilpModel, n: usize) -> Vec<Expression> {
    if n <= 1 {
        return vec![Expression::constant(0.0); n];
    }
    let bits = usize::BITS - (n - 1).leading_zeros();
    let selectors: Vec<VarId> = (0..bits).map(|_| milp.new_variable(VariableKind::Binary)).collect();

    let code = Expression::sum(selectors.iter().enumerate().map(|(j, b)| ((1u64 << j) as f64, *b)));
    milp.add_constraint_with_bound(code, Inequality::LessEqual, (n - 1) as f64);

    (0..n)
        .map(|k| {
            let mut mismatch = Expression::new();
            for (j, b) in selectors.iter().enumerate() {
                if k & (1 << j) != 0 {
                    mismatch.add_constant(1.0);
                    mismatch.add_term(-1.0, *b);
                } else {
                    mismatch.add_term(1.0, *b);
                }
            }
            mismatch
        })
        .collect()
}

/// Fresh variable equal to `min(a, b)` for degrees in [0,1]
pub fn exact_min(milp: &mut MilpModel, a: &Expression, b: &Expression) -> VarId {
    let m = milp.new_variable(VariableKind::SemiContinuous);
    let s = milp.new_variable(VariableKind::Binary);
    milp.add_constraint(Expression::var(m) - a.clone(), Inequality::LessEqual);
    milp.add_constraint(Expression::var(m) - b.clone(), Inequality::LessEqual);
    // m >= a - s, m >= b - (1 - s)
    milp.add_constraint(Expression::var(m) - a.clone() + s, Inequality::GreaterEqual);
    milp.add_constraint(Expression::var(m) - b.clone() - s + 1.0, Inequality::GreaterEqual);
    m
}

/// Operands sorted in descending order through a permutation matrix
#[derive(Debug, Clone)]
pub struct SortedOperands {
    /// `values[j]` is the j-th largest operand
    pub values: Vec<VarId>,
    /// `permutation[i][j] = 1` iff operand `i` sits at position `j`
    pub permutation: Vec<Vec<VarId>>,
}

pub fn sorted_descending(milp: &mut MilpModel, inputs: &[Expression]) -> SortedOperands {
    let n = inputs.len();
    let values: Vec<VarId> = (0..n).map(|_| milp.new_variable(VariableKind::SemiContinuous)).collect();
    let permutation: Vec<Vec<VarId>> = (0..n)
        .map(|_| (0..n).map(|_| milp.new_variable(VariableKind::Binary)).collect())
        .collect();

    for pair in values.windows(2) {
        milp.add_constraint(Expression::var(pair[0]) - pair[1], Inequality::GreaterEqual);
    }
    for i in 0..n {
        let row = Expression::sum(permutation[i].iter().map(|p| (1.0, *p)));
        milp.add_constraint_with_bound(row, Inequality::Equal, 1.0);
        let column = Expression::sum((0..n).map(|k| (1.0, permutation[k][i])));
        milp.add_constraint_with_bound(column, Inequality::Equal, 1.0);
    }
    for (i, input) in inputs.iter().enumerate() {
        for (j, z) in values.iter().enumerate() {
            let p = permutation[i][j];
            // |z_j - c_i| <= 1 - p_ij
            milp.add_constraint(Expression::var(*z) - input.clone() + p - 1.0, Inequality::LessEqual);
            milp.add_constraint(input.clone() - *z + p - 1.0, Inequality::LessEqual);
        }
    }
    SortedOperands { values, permutation }
}

/// Upper bound of the sum of the `k` largest inputs, `k·t + Σ max(0, cᵢ − t)`,
/// tight for the best `t`
pub fn top_k_upper(milp: &mut MilpModel, inputs: &[Expression], k: usize) -> Expression {
    let t = milp.new_variable(VariableKind::SemiContinuous);
    let mut bound = Expression::term(k as f64, t);
    for input in inputs {
        let u = milp.new_variable(VariableKind::SemiContinuous);
        milp.add_constraint(Expression::var(u) - input.clone() + t, Inequality::GreaterEqual);
        bound.add_term(1.0, u);
    }
    bound
}

/// Lower bound of the sum of the `k` smallest inputs, `k·t − Σ max(0, t − cᵢ)`,
/// tight for the best `t`
pub fn bottom_k_lower(milp: &mut MilpModel, inputs: &[Expression], k: usize) -> Expression {
    let t = milp.new_variable(VariableKind::SemiContinuous);
    let mut bound = Expression::term(k as f64, t);
    for input in inputs {
        let u = milp.new_variable(VariableKind::SemiContinuous);
        milp.add_constraint(Expression::var(u) - t + input.clone(), Inequality::GreaterEqual);
        bound.add_term(-1.0, u);
    }
    bound
}

/// Extends a segment list with flat pieces so that it covers `[lo, hi]`
pub fn cover_domain(segments: &[Segment], lo: f64, hi: f64) -> Vec<Segment> {
    let mut covered = Vec::with_capacity(segments.len() + 2);
    if let Some(first) = segments.first() {
        if first.x0 > lo {
            covered.push(Segment::new(lo, first.x0, first.y0, first.y0));
        }
    }
    covered.extend_from_slice(segments);
    if let Some(last) = segments.last() {
        if last.x1 < hi {
            covered.push(Segment::new(last.x1, hi, last.y1, last.y1));
        }
    }
    covered
}

/// Constrains `output = f(input)` for the piecewise-linear `f` given by
/// `segments`, with `input` ranging over `[lo, hi]`.
///
/// One binary per segment selects the active piece.
pub fn pin_piecewise(
    milp: &mut MilpModel,
    input: &Expression,
    (lo, hi): (f64, f64),
    segments: &[Segment],
    output: &Expression,
) {
    let segments = cover_domain(segments, lo, hi);
    let selectors: Vec<VarId> = segments.iter().map(|_| milp.new_variable(VariableKind::Binary)).collect();
    milp.add_constraint_with_bound(
        Expression::sum(selectors.iter().map(|z| (1.0, *z))),
        Inequality::Equal,
        1.0,
    );

    for (segment, z) in segments.iter().zip(&selectors) {
        let low = lo.min(segment.x0);
        let high = hi.max(segment.x1);
        // x >= x0·z + low·(1 - z)
        milp.add_constraint(
            input.clone() + Expression::term(low - segment.x0, *z) - low,
            Inequality::GreaterEqual,
        );
        // x <= x1·z + high·(1 - z)
        milp.add_constraint(
            input.clone() + Expression::term(high - segment.x1, *z) - high,
            Inequality::LessEqual,
        );

        let slope = segment.slope();
        let big_m = 2.0 + slope.abs() * (high - low);
        // output - y0 - slope·(x - x0)
        let deviation = output.clone() - input.scaled(slope) + (slope * segment.x0 - segment.y0);
        milp.add_constraint(
            deviation.clone() + Expression::term(big_m, *z) - big_m,
            Inequality::LessEqual,
        );
        milp.add_constraint(
            deviation - Expression::term(big_m, *z) + big_m,
            Inequality::GreaterEqual,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzzydl_milp::{MilpSolver, Objective, SimplexSolver};

    fn fixed(milp: &mut MilpModel, name: &str, value: f64) -> Expression {
        let v = milp.variable(name, VariableKind::SemiContinuous);
        milp.add_constraint_with_bound(Expression::var(v), Inequality::Equal, value);
        Expression::var(v)
    }

    fn maximize(milp: &MilpModel, objective: Expression) -> f64 {
        let solution = SimplexSolver::new()
            .solve(milp, Some(&Objective::Maximize(objective)))
            .unwrap();
        assert!(solution.feasible);
        solution.objective
    }

    #[test]
    fn test_exact_min() {
        let mut milp = MilpModel::new();
        let a = fixed(&mut milp, "a", 0.7);
        let b = fixed(&mut milp, "b", 0.4);
        let m = exact_min(&mut milp, &a, &b);
        assert!((maximize(&milp, Expression::var(m)) - 0.4).abs() < 1e-6);
        let min = SimplexSolver::new()
            .solve(&milp, Some(&Objective::Minimize(Expression::var(m))))
            .unwrap();
        assert!((min.objective - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_selector_picks_maximum() {
        let mut milp = MilpModel::new();
        let inputs = [0.2, 0.9, 0.5];
        let exprs: Vec<Expression> = inputs
            .iter()
            .enumerate()
            .map(|(i, v)| fixed(&mut milp, &format!("c{i}"), *v))
            .collect();
        let v = milp.variable("v", VariableKind::SemiContinuous);
        let mismatches = select_one(&mut milp, exprs.len());
        for (c, mismatch) in exprs.iter().zip(mismatches) {
            milp.add_constraint(c.clone() - v + mismatch, Inequality::GreaterEqual);
        }
        assert!((maximize(&milp, Expression::var(v)) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_sorted_descending() {
        let mut milp = MilpModel::new();
        let exprs: Vec<Expression> = [0.3, 0.8, 0.5]
            .iter()
            .enumerate()
            .map(|(i, v)| fixed(&mut milp, &format!("c{i}"), *v))
            .collect();
        let sorted = sorted_descending(&mut milp, &exprs);
        let top = maximize(&milp, Expression::var(sorted.values[0]));
        assert!((top - 0.8).abs() < 1e-6);
        let solution = SimplexSolver::new().solve(&milp, None).unwrap();
        let names: Vec<String> = sorted
            .values
            .iter()
            .map(|v| milp.variable_info(*v).unwrap().name.clone())
            .collect();
        let values: Vec<f64> = names.iter().map(|n| solution.value(n).unwrap()).collect();
        assert!((values[0] - 0.8).abs() < 1e-6);
        assert!((values[1] - 0.5).abs() < 1e-6);
        assert!((values[2] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_top_and_bottom_k() {
        let mut milp = MilpModel::new();
        let exprs: Vec<Expression> = [0.3, 0.8, 0.5]
            .iter()
            .enumerate()
            .map(|(i, v)| fixed(&mut milp, &format!("c{i}"), *v))
            .collect();
        let upper = top_k_upper(&mut milp, &exprs, 2);
        let lower = bottom_k_lower(&mut milp, &exprs, 2);
        let min_upper = SimplexSolver::new()
            .solve(&milp, Some(&Objective::Minimize(upper)))
            .unwrap();
        assert!((min_upper.objective - 1.3).abs() < 1e-6);
        assert!((maximize(&milp, lower) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_pin_piecewise_triangle() {
        let mut milp = MilpModel::new();
        let x = fixed(&mut milp, "x", 0.25);
        let y = milp.variable("y", VariableKind::SemiContinuous);
        let segments = vec![Segment::new(0.0, 0.5, 0.0, 1.0), Segment::new(0.5, 1.0, 1.0, 0.0)];
        pin_piecewise(&mut milp, &x, (0.0, 1.0), &segments, &Expression::var(y));
        assert!((maximize(&milp, Expression::var(y)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_cover_domain_extends_flat() {
        let covered = cover_domain(&[Segment::new(2.0, 4.0, 0.0, 1.0)], 0.0, 10.0);
        assert_eq!(covered.len(), 3);
        assert_eq!(covered[0], Segment::new(0.0, 2.0, 0.0, 0.0));
        assert_eq!(covered[2], Segment::new(4.0, 10.0, 1.0, 1.0));
    }
}
