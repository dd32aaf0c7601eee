//! Data Transfer Objects for the CI provider REST API
//!
//! Request bodies, query strings and list envelopes exchanged with the
//! provider. Entities inside the envelopes are domain types.

pub mod artifact;
pub mod dispatch;
pub mod run;
