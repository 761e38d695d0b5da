//! Report status workflow.
//!
//! Transitions follow a fixed directed graph. `Cerrado` is terminal: any
//! request against a closed report fails with `AlreadyClosed`, including
//! re-requesting `cerrado` itself.

use comunimapp_common::{AppError, AppResult};
use comunimapp_db::entities::ReportStatus;

/// Outcome of a validated transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition is legal and should be applied.
    Apply,
    /// Requested status equals the current one. Allowed only as a side
    /// channel for posting a case update without a status change.
    NoOp,
}

/// Legal next statuses from a given status.
#[must_use]
pub const fn allowed_transitions(from: ReportStatus) -> &'static [ReportStatus] {
    match from {
        ReportStatus::Pendiente => &[ReportStatus::Asignado],
        ReportStatus::Asignado => &[ReportStatus::EnProceso, ReportStatus::Pendiente],
        ReportStatus::EnProceso => &[ReportStatus::Resuelto, ReportStatus::Asignado],
        ReportStatus::Resuelto => &[ReportStatus::Cerrado, ReportStatus::EnProceso],
        ReportStatus::Cerrado => &[],
    }
}

/// Validate a requested transition.
pub fn check(from: ReportStatus, to: ReportStatus) -> AppResult<TransitionOutcome> {
    if from == ReportStatus::Cerrado {
        return Err(AppError::AlreadyClosed);
    }
    if from == to {
        return Ok(TransitionOutcome::NoOp);
    }
    if allowed_transitions(from).contains(&to) {
        return Ok(TransitionOutcome::Apply);
    }
    Err(AppError::InvalidTransition {
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_edges() {
        let legal = [
            (ReportStatus::Pendiente, ReportStatus::Asignado),
            (ReportStatus::Asignado, ReportStatus::EnProceso),
            (ReportStatus::Asignado, ReportStatus::Pendiente),
            (ReportStatus::EnProceso, ReportStatus::Resuelto),
            (ReportStatus::EnProceso, ReportStatus::Asignado),
            (ReportStatus::Resuelto, ReportStatus::Cerrado),
            (ReportStatus::Resuelto, ReportStatus::EnProceso),
        ];
        for (from, to) in legal {
            assert_eq!(
                check(from, to).ok(),
                Some(TransitionOutcome::Apply),
                "{from} -> {to} should be legal"
            );
        }
    }

    #[test]
    fn test_illegal_edges_exhaustive() {
        for from in ReportStatus::all() {
            if from == ReportStatus::Cerrado {
                continue;
            }
            for to in ReportStatus::all() {
                if from == to || allowed_transitions(from).contains(&to) {
                    continue;
                }
                match check(from, to) {
                    Err(AppError::InvalidTransition { .. }) => {}
                    other => panic!("{from} -> {to}: expected InvalidTransition, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_closed_is_terminal() {
        for to in ReportStatus::all() {
            match check(ReportStatus::Cerrado, to) {
                Err(AppError::AlreadyClosed) => {}
                other => panic!("cerrado -> {to}: expected AlreadyClosed, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        assert_eq!(
            check(ReportStatus::EnProceso, ReportStatus::EnProceso).ok(),
            Some(TransitionOutcome::NoOp)
        );
    }
}
