//! Crate-wide error type (spec §7).

use thiserror::Error;

/// Errors that can prevent a clearing from running at all.
///
/// Everything else in spec §7 (solver non-optimal, pricing non-optimal,
/// paradoxical-buy violation) folds into [`crate::orchestrator::ClearingResult::final_`]
/// being `false` rather than an `Err` here — those are expected outcomes of
/// the no-good-cut loop, not failures of the crate.
#[derive(Debug, Error)]
pub enum EacError {
    /// Unit-capacity or undefined-basket problems found before any solve is
    /// attempted. Joined with newlines so the message enumerates every
    /// problem found, per spec §7.
    #[error("unit capacity validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// The solver backend could not be driven to completion (malformed
    /// model construction, FFI panic boundary). The crate never builds a
    /// malformed model, so this should not occur in practice, but
    /// `solver::Problem::solve` stays total rather than able to panic
    /// through library code.
    #[error("solver backend unavailable: {0}")]
    SolverUnavailable(String),
}

pub type Result<T> = std::result::Result<T, EacError>;
