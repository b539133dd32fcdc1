//! Uniform wrapper over an LP/MILP optimizer (spec §4.1).
//!
//! The crate treats the actual solver as a black-box external collaborator
//! (spec §1 "out of scope"), consumed the way `russcip`'s own
//! `examples/create_and_solve.rs` and `examples/knapsack.rs` use it:
//! `Model::default()`, `.add_var(...)`, `.add_cons(vars, coefs, lhs, rhs,
//! name)`, `.solve()`, `.status()`, `.best_sol()`. This module narrows that
//! surface to the one contract the rest of the crate needs: build a
//! problem with named variables and linear constraints, set an objective
//! sense, solve, read back status and values — and append more
//! constraints across iterations, per the no-good-cut outer loop (spec
//! §4.5, §9 "problem accumulation").

use std::collections::BTreeMap;
use std::rc::Rc;

use russcip::prelude::*;
use russcip::{Model, VarType};

/// Opaque handle to a variable added to a [`Problem`]. Indexes into the
/// problem's own variable table; has no meaning outside the `Problem` that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Continuous { lb: f64, ub: f64 },
    Binary,
}

/// Sense of a linear constraint's bound, translated to `russcip`'s
/// `(lhs, rhs)` pair the way its `Model::add_cons` expects: `Le` becomes
/// `(-inf, rhs)`, `Ge` becomes `(rhs, +inf)`, `Eq` becomes `(rhs, rhs)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// Objective sense, mirroring `russcip::ObjSense`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjSense {
    Maximize,
    Minimize,
}

/// Collapsed solver status vocabulary (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Optimal,
    Feasible,
    Infeasible,
    Unbounded,
    NotSolved,
    Undefined,
}

impl Status {
    pub fn is_ok_for_extraction(&self) -> bool {
        matches!(self, Status::Optimal | Status::Feasible)
    }
}

impl From<russcip::status::Status> for Status {
    fn from(s: russcip::status::Status) -> Self {
        use russcip::status::Status as S;
        match s {
            S::Optimal => Status::Optimal,
            S::Infeasible => Status::Infeasible,
            S::Unbounded | S::InfOrUnbounded => Status::Unbounded,
            S::NodeLimit
            | S::TotalNodeLimit
            | S::StallNodeLimit
            | S::TimeLimit
            | S::MemLimit
            | S::GapLimit
            | S::SolLimit
            | S::BestSolLimit
            | S::RestartLimit
            | S::UserInterrupt => Status::Feasible,
            S::Unknown | S::Terminate => Status::Undefined,
        }
    }
}

struct VarSpec {
    name: String,
    kind: VarKind,
    obj: f64,
}

struct ConstraintSpec {
    name: String,
    terms: Vec<(VarHandle, f64)>,
    sense: Sense,
    rhs: f64,
}

/// An owned, append-only accumulator of variables and linear constraints
/// plus an objective sense (spec §9 "problem accumulation"). Each call to
/// [`Problem::solve`] rebuilds a fresh `russcip::Model` from the
/// accumulated specification and solves it from scratch — `russcip`'s own
/// `Model<ProblemCreated>` transitions into `Model<Solved>` on `solve()`
/// and cannot accept further constraints afterwards, so the live solver
/// state is rebuilt every time rather than mutated in place, exactly as
/// spec §9 directs: "store the solver handle alongside and rebuild the
/// solver's internal state on every `solve`."
pub struct Problem {
    sense: ObjSense,
    vars: Vec<VarSpec>,
    constraints: Vec<ConstraintSpec>,
    verbosity: u8,
}

/// The solved values of every variable in a [`Problem`], plus its status.
pub struct SolveOutcome {
    pub status: Status,
    values: BTreeMap<VarHandle, f64>,
}

impl SolveOutcome {
    /// Value of `handle`, or `0.0` if the solve didn't produce one (spec
    /// §4.5 step 2: "missing values treated as 0").
    pub fn value(&self, handle: VarHandle) -> f64 {
        self.values.get(&handle).copied().unwrap_or(0.0)
    }
}

impl Problem {
    pub fn new(sense: ObjSense, verbosity: u8) -> Self {
        Problem {
            sense,
            vars: Vec::new(),
            constraints: Vec::new(),
            verbosity,
        }
    }

    pub fn add_var(&mut self, name: impl Into<String>, kind: VarKind, obj: f64) -> VarHandle {
        let handle = VarHandle(self.vars.len());
        self.vars.push(VarSpec { name: name.into(), kind, obj });
        handle
    }

    /// Appends a linear constraint `sum(coef * var) <sense> rhs` under
    /// `name`. Constraints accumulate across calls — this is how no-good
    /// cuts get layered onto the same problem instance across outer-loop
    /// iterations (spec §4.5).
    pub fn add_linear_constraint(
        &mut self,
        name: impl Into<String>,
        terms: &[(VarHandle, f64)],
        sense: Sense,
        rhs: f64,
    ) {
        self.constraints.push(ConstraintSpec {
            name: name.into(),
            terms: terms.to_vec(),
            sense,
            rhs,
        });
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Builds a fresh `russcip::Model` from the accumulated specification
    /// and solves it.
    pub fn solve(&self) -> SolveOutcome {
        let mut model = Model::default();
        if self.verbosity == 0 {
            model = model.hide_output();
        }
        model = model.set_obj_sense(match self.sense {
            ObjSense::Maximize => russcip::ObjSense::Maximize,
            ObjSense::Minimize => russcip::ObjSense::Minimize,
        });

        let mut scip_vars: Vec<Rc<russcip::Variable>> = Vec::with_capacity(self.vars.len());
        for spec in &self.vars {
            let (lb, ub, var_type) = match spec.kind {
                VarKind::Continuous { lb, ub } => (lb, ub, VarType::Continuous),
                VarKind::Binary => (0.0, 1.0, VarType::Binary),
            };
            let var = model.add_var(lb, ub, spec.obj, &spec.name, var_type);
            scip_vars.push(var);
        }

        for cons in &self.constraints {
            let vars: Vec<Rc<russcip::Variable>> =
                cons.terms.iter().map(|(h, _)| scip_vars[h.0].clone()).collect();
            let coefs: Vec<f64> = cons.terms.iter().map(|(_, c)| *c).collect();
            let (lhs, rhs) = match cons.sense {
                Sense::Le => (f64::NEG_INFINITY, cons.rhs),
                Sense::Ge => (cons.rhs, f64::INFINITY),
                Sense::Eq => (cons.rhs, cons.rhs),
            };
            model.add_cons(vars, &coefs, lhs, rhs, &cons.name);
        }

        let solved = model.solve();
        let status: Status = solved.status().into();

        let mut values = BTreeMap::new();
        if let Some(sol) = solved.best_sol() {
            for (i, var) in scip_vars.iter().enumerate() {
                values.insert(VarHandle(i), sol.val(var));
            }
        }

        SolveOutcome { status, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_collapses_terminal_states() {
        assert_eq!(Status::from(russcip::status::Status::Optimal), Status::Optimal);
        assert_eq!(Status::from(russcip::status::Status::Infeasible), Status::Infeasible);
        assert!(Status::Optimal.is_ok_for_extraction());
        assert!(!Status::Infeasible.is_ok_for_extraction());
    }

    #[test]
    fn missing_value_defaults_to_zero() {
        let outcome = SolveOutcome { status: Status::Optimal, values: BTreeMap::new() };
        assert_eq!(outcome.value(VarHandle(0)), 0.0);
    }
}
