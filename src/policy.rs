// src/policy.rs
//
// Visibility of soft-deleted and inactive records. Only superAdmin sees or
// mutates them; everyone else gets a 404.

use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::models::{Booking, Customer, Hotel, MasterRoom, Review, Slot, SubRoom, SupportTicket, User};

pub trait Flagged {
    fn is_active(&self) -> bool;
    fn is_deleted(&self) -> bool;
}

macro_rules! flagged {
    ($($ty:ty),* $(,)?) => {
        $(impl Flagged for $ty {
            fn is_active(&self) -> bool { self.is_active }
            fn is_deleted(&self) -> bool { self.is_deleted }
        })*
    };
}

flagged!(Hotel, User, Customer, MasterRoom, SubRoom, Slot, Booking, SupportTicket, Review);

#[derive(Debug, Clone, Copy)]
pub struct Visibility {
    include_hidden: bool,
}

impl Visibility {
    pub fn for_actor(actor: &Actor) -> Self {
        Self { include_hidden: actor.is_super_admin() }
    }

    /// Bound into list queries as `($n OR (is_active AND NOT is_deleted))`.
    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    pub fn can_view<T: Flagged>(&self, entity: &T) -> bool {
        self.include_hidden || (entity.is_active() && !entity.is_deleted())
    }

    pub fn visible<T: Flagged>(&self, entity: T, what: &str) -> ApiResult<T> {
        if self.can_view(&entity) {
            Ok(entity)
        } else {
            Err(ApiError::not_found(what))
        }
    }
}

/// Soft-delete is a superAdmin-only field on every patch.
pub fn ensure_can_set_deleted(actor: &Actor, is_deleted: Option<bool>) -> ApiResult<()> {
    if is_deleted.is_some() && !actor.is_super_admin() {
        return Err(ApiError::Forbidden("Only superAdmin can change isDeleted".into()));
    }
    Ok(())
}
