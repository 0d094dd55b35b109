// src/domain/mod.rs

pub mod booking;
pub mod catalog;
pub mod pricing;
pub mod ticket;

use crate::models::{BookingStatus, CancellationStatus, TicketStatus};

pub use booking::BookingEvent;

/// A state change rejected by one of the lifecycle tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Booking is already {0}")]
    AlreadyIn(BookingStatus),
    #[error("Cannot {event} a booking that is {from}")]
    Booking { from: BookingStatus, event: BookingEvent },
    #[error("Cancellation has already been requested for this booking")]
    CancellationAlreadyRequested,
    #[error("No pending cancellation request for this booking")]
    NoPendingCancellation,
    #[error("Cancellation request has already been {0}")]
    CancellationAlreadyResolved(CancellationStatus),
    #[error("Ticket is already {0}")]
    TicketAlreadyIn(TicketStatus),
    #[error("Cannot move a ticket from {from} to {to}")]
    Ticket { from: TicketStatus, to: TicketStatus },
    #[error("Ticket is already assigned")]
    TicketAlreadyAssigned,
    #[error("Ticket is {0} and cannot be assigned")]
    TicketNotAssignable(TicketStatus),
}
