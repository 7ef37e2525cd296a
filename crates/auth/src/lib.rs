//! `stockhub-auth`: actor identity and store scoping.
//!
//! Decoupled from transport and storage: the request layer resolves who is
//! calling and on behalf of which store, this crate only checks the workflow's
//! scoping rules against that.

pub mod action;
pub mod authorize;
pub mod principal;

pub use action::Action;
pub use authorize::{authorize_hq, authorize_store, authorize_store_or_hq, AuthzError};
pub use principal::{Actor, Scope};
