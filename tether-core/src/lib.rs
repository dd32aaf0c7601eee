//! Tether Core
//!
//! Core types shared by the Tether provider client and runner.
//!
//! This crate contains:
//! - Domain types: correlation tokens, run handles, run status snapshots,
//!   artifacts and workflow records
//! - DTOs: request and response payloads of the CI provider's REST API

pub mod domain;
pub mod dto;
