//! Bookshop Core - Shared domain types.
//!
//! This crate provides the types shared by every Bookshop component:
//! - `storefront` - Client library for the remote bookshop backend
//! - `cli` - Command-line front end built on the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O and no HTTP clients. The
//! remote backend is the source of truth for every entity described here.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
