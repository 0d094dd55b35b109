// src/domain/ticket.rs

use uuid::Uuid;

use super::TransitionError;
use crate::models::TicketStatus;

impl TicketStatus {
    pub fn transition_to(self, to: TicketStatus) -> Result<TicketStatus, TransitionError> {
        use TicketStatus::*;

        match (self, to) {
            (from, to) if from == to => Err(TransitionError::TicketAlreadyIn(from)),
            (Open, InProgress | Resolved | Closed)
            | (InProgress, Resolved | Closed)
            | (Resolved, Closed) => Ok(to),
            (from, to) => Err(TransitionError::Ticket { from, to }),
        }
    }

    /// Statuses in which the assignee is no longer working the ticket.
    pub fn frees_agent(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

/// Only unassigned, unfinished tickets take an agent.
pub fn check_assignable(status: TicketStatus, assigned_to: Option<Uuid>) -> Result<(), TransitionError> {
    if assigned_to.is_some() {
        return Err(TransitionError::TicketAlreadyAssigned);
    }
    match status {
        TicketStatus::Open | TicketStatus::InProgress => Ok(()),
        other => Err(TransitionError::TicketNotAssignable(other)),
    }
}

/// True when moving `from -> to` should hand the assignee back to the pool.
pub fn releases_agent(from: TicketStatus, to: TicketStatus) -> bool {
    !from.frees_agent() && to.frees_agent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketStatus::*;

    #[test]
    fn forward_moves_are_allowed() {
        assert_eq!(Open.transition_to(InProgress), Ok(InProgress));
        assert_eq!(InProgress.transition_to(Resolved), Ok(Resolved));
        assert_eq!(Resolved.transition_to(Closed), Ok(Closed));
        assert_eq!(Open.transition_to(Closed), Ok(Closed));
    }

    #[test]
    fn no_going_back() {
        assert!(InProgress.transition_to(Open).is_err());
        assert!(Resolved.transition_to(InProgress).is_err());
        for to in [Open, InProgress, Resolved] {
            assert_eq!(Closed.transition_to(to), Err(TransitionError::Ticket { from: Closed, to }));
        }
        assert_eq!(
            Closed.transition_to(Closed).unwrap_err().to_string(),
            "Ticket is already closed"
        );
    }

    #[test]
    fn agent_released_once() {
        assert!(releases_agent(InProgress, Resolved));
        assert!(releases_agent(InProgress, Closed));
        assert!(!releases_agent(Resolved, Closed));
        assert!(!releases_agent(Open, InProgress));
    }

    #[test]
    fn assignment_rules() {
        assert!(check_assignable(Open, None).is_ok());
        assert!(check_assignable(InProgress, None).is_ok());
        assert_eq!(
            check_assignable(InProgress, Some(Uuid::new_v4())),
            Err(TransitionError::TicketAlreadyAssigned)
        );
        assert_eq!(check_assignable(Resolved, None), Err(TransitionError::TicketNotAssignable(Resolved)));
    }
}
