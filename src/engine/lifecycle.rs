use crate::model::*;

use super::EngineError;

/// Who may initiate an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Only the reservation's owner.
    Requester,
    /// Only principals with the approver role.
    Approver,
}

impl Action {
    pub fn side(self) -> Side {
        match self {
            Action::SelfCancel | Action::RequestCancel => Side::Requester,
            Action::Approve | Action::Reject | Action::ApproveCancel | Action::DenyCancel => {
                Side::Approver
            }
        }
    }
}

/// Message sent to the requester after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// An approver decided; the message carries the resulting status.
    Decision,
    /// Acknowledges a cancellation request.
    CancellationSubmitted,
}

impl Notice {
    pub fn message(self, reservation: &Reservation) -> String {
        let (from, to) = (reservation.date_from, reservation.date_to);
        match self {
            Notice::Decision => format!(
                "Your booking request for {from} - {to} has been {}.",
                reservation.status
            ),
            Notice::CancellationSubmitted => format!(
                "Your request to cancel booking {from} - {to} has been submitted for review."
            ),
        }
    }
}

/// An authorized, not yet applied, status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ReservationStatus,
    pub to: ReservationStatus,
    pub notice: Option<Notice>,
}

/// The transition table. Every `(status, action)` pair is listed; `None`
/// means the action is not legal from that status.
pub fn next_status(
    status: ReservationStatus,
    action: Action,
) -> Option<(ReservationStatus, Option<Notice>)> {
    use Action::*;
    use ReservationStatus::*;
    match (status, action) {
        (Pending, Approve) => Some((Confirmed, Some(Notice::Decision))),
        (Pending, Reject) => Some((Cancelled, Some(Notice::Decision))),
        (Pending, SelfCancel) => Some((Cancelled, None)),
        (Pending, RequestCancel | ApproveCancel | DenyCancel) => None,

        (Confirmed, Reject) => Some((Cancelled, Some(Notice::Decision))),
        (Confirmed, RequestCancel) => {
            Some((CancellationPending, Some(Notice::CancellationSubmitted)))
        }
        (Confirmed, Approve | SelfCancel | ApproveCancel | DenyCancel) => None,

        (CancellationPending, ApproveCancel) => Some((Cancelled, Some(Notice::Decision))),
        (CancellationPending, DenyCancel) => Some((Confirmed, Some(Notice::Decision))),
        (CancellationPending, Approve | Reject | SelfCancel | RequestCancel) => None,

        (Cancelled, _) => None,
    }
}

/// Check guards and look up the transition for `actor` performing `action`.
///
/// Terminal records fail with `InvalidTransition` before any role check, so
/// every action on a cancelled reservation reports the same error.
pub fn authorize(
    reservation: &Reservation,
    actor: &Principal,
    action: Action,
) -> Result<Transition, EngineError> {
    let from = reservation.status;
    if from.is_terminal() {
        return Err(EngineError::InvalidTransition { from, action });
    }
    match action.side() {
        Side::Approver if !actor.is_approver() => {
            return Err(EngineError::Forbidden("action requires the approver role"));
        }
        Side::Requester if actor.id != reservation.requester_id => {
            return Err(EngineError::Forbidden(
                "only the requester may cancel their reservation",
            ));
        }
        _ => {}
    }
    let (to, notice) =
        next_status(from, action).ok_or(EngineError::InvalidTransition { from, action })?;
    Ok(Transition { from, to, notice })
}
