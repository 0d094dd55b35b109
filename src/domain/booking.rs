// src/domain/booking.rs

use std::fmt;

use super::TransitionError;
use crate::models::{BookingStatus, CancellationRequest, CancellationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    /// Hotel confirms a paid booking against a slot.
    Confirm,
    Complete,
    /// Hotel turns down a booking it never confirmed.
    Decline,
    ApproveCancellation,
}

impl BookingEvent {
    /// Event that drives a booking into `target`, if any.
    pub fn toward(target: BookingStatus) -> Option<Self> {
        match target {
            BookingStatus::Booked => Some(Self::Confirm),
            BookingStatus::Completed => Some(Self::Complete),
            BookingStatus::Cancelled => Some(Self::Decline),
            BookingStatus::Pending => None,
        }
    }

    fn target(self) -> BookingStatus {
        match self {
            Self::Confirm => BookingStatus::Booked,
            Self::Complete => BookingStatus::Completed,
            Self::Decline | Self::ApproveCancellation => BookingStatus::Cancelled,
        }
    }
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Confirm => "confirm",
            Self::Complete => "complete",
            Self::Decline => "decline",
            Self::ApproveCancellation => "cancel",
        })
    }
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    pub fn apply(self, event: BookingEvent) -> Result<BookingStatus, TransitionError> {
        use BookingEvent::*;
        use BookingStatus::*;

        match (self, event) {
            (Pending, Confirm) => Ok(Booked),
            (Booked, Complete) => Ok(Completed),
            (Pending, Decline) => Ok(Cancelled),
            (Pending | Booked, ApproveCancellation) => Ok(Cancelled),
            (from, event) if from == event.target() || from.is_terminal() => {
                Err(TransitionError::AlreadyIn(from))
            }
            (from, event) => Err(TransitionError::Booking { from, event }),
        }
    }
}

/// Customer side of the cancellation workflow: none -> pending.
pub fn request_cancellation(
    status: BookingStatus,
    current: &CancellationRequest,
) -> Result<(), TransitionError> {
    if status.is_terminal() {
        return Err(TransitionError::AlreadyIn(status));
    }
    if current.requested || current.status.is_some() {
        return Err(TransitionError::CancellationAlreadyRequested);
    }
    Ok(())
}

/// Hotel side of the cancellation workflow: pending -> approved | rejected, once.
pub fn respond_to_cancellation(
    current: &CancellationRequest,
    decision: CancellationStatus,
) -> Result<CancellationStatus, TransitionError> {
    match current.status {
        Some(CancellationStatus::Pending) => Ok(decision),
        Some(done) => Err(TransitionError::CancellationAlreadyResolved(done)),
        None => Err(TransitionError::NoPendingCancellation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    const ALL: [BookingStatus; 4] = [Pending, Booked, Cancelled, Completed];
    const EVENTS: [BookingEvent; 4] = [
        BookingEvent::Confirm,
        BookingEvent::Complete,
        BookingEvent::Decline,
        BookingEvent::ApproveCancellation,
    ];

    fn request(status: Option<CancellationStatus>) -> CancellationRequest {
        CancellationRequest {
            requested: status.is_some(),
            status,
            message: String::new(),
            requested_at: None,
            responded_at: None,
        }
    }

    #[test]
    fn happy_path() {
        let s = Pending.apply(BookingEvent::Confirm).unwrap();
        assert_eq!(s, Booked);
        assert_eq!(s.apply(BookingEvent::Complete).unwrap(), Completed);
    }

    #[test]
    fn cancellation_from_pending_or_booked() {
        assert_eq!(Pending.apply(BookingEvent::ApproveCancellation).unwrap(), Cancelled);
        assert_eq!(Booked.apply(BookingEvent::ApproveCancellation).unwrap(), Cancelled);
    }

    #[test]
    fn terminal_states_never_move() {
        for from in [Cancelled, Completed] {
            for event in EVENTS {
                assert_eq!(from.apply(event), Err(TransitionError::AlreadyIn(from)));
            }
        }
    }

    #[test]
    fn double_confirmation_is_rejected() {
        let err = Booked.apply(BookingEvent::Confirm).unwrap_err();
        assert_eq!(err.to_string(), "Booking is already booked");
    }

    #[test]
    fn skipping_confirmation_is_rejected() {
        let err = Pending.apply(BookingEvent::Complete).unwrap_err();
        assert_eq!(err.to_string(), "Cannot complete a booking that is pending");
        assert!(Booked.apply(BookingEvent::Decline).is_err());
    }

    #[test]
    fn every_accepted_transition_is_in_the_table() {
        let mut accepted = Vec::new();
        for from in ALL {
            for event in EVENTS {
                if let Ok(to) = from.apply(event) {
                    accepted.push((from, event, to));
                }
            }
        }
        assert_eq!(accepted.len(), 5);
        assert!(accepted.iter().all(|(from, _, _)| !from.is_terminal()));
    }

    #[test]
    fn target_statuses_map_to_events() {
        assert_eq!(BookingEvent::toward(Booked), Some(BookingEvent::Confirm));
        assert_eq!(BookingEvent::toward(Cancelled), Some(BookingEvent::Decline));
        assert_eq!(BookingEvent::toward(Pending), None);
    }

    #[test]
    fn cancellation_can_be_requested_once() {
        assert!(request_cancellation(Booked, &request(None)).is_ok());
        assert_eq!(
            request_cancellation(Booked, &request(Some(CancellationStatus::Pending))),
            Err(TransitionError::CancellationAlreadyRequested)
        );
        assert_eq!(
            request_cancellation(Booked, &request(Some(CancellationStatus::Rejected))),
            Err(TransitionError::CancellationAlreadyRequested)
        );
        assert_eq!(
            request_cancellation(Cancelled, &request(None)),
            Err(TransitionError::AlreadyIn(Cancelled))
        );
        assert!(request_cancellation(Completed, &request(None)).is_err());
    }

    #[test]
    fn cancellation_response_happens_once() {
        let pending = request(Some(CancellationStatus::Pending));
        assert_eq!(
            respond_to_cancellation(&pending, CancellationStatus::Approved),
            Ok(CancellationStatus::Approved)
        );

        let approved = request(Some(CancellationStatus::Approved));
        let err = respond_to_cancellation(&approved, CancellationStatus::Rejected).unwrap_err();
        assert_eq!(err.to_string(), "Cancellation request has already been approved");

        assert_eq!(
            respond_to_cancellation(&request(None), CancellationStatus::Approved),
            Err(TransitionError::NoPendingCancellation)
        );
    }
}
