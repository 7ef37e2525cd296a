//! Replenishment between HQ and stores.
//!
//! A store either orders stock from HQ or returns stock to it. Both travel
//! through the same request lifecycle; the direction decides which side of the
//! movement is debited on approval.

pub mod request;

pub use request::{
    ApproveRequest, CreateRequest, Direction, RejectRequest, ReplenishmentApproved,
    ReplenishmentCommand, ReplenishmentEvent, ReplenishmentRejected, ReplenishmentRequest,
    ReplenishmentRequested, RequestStatus,
};
