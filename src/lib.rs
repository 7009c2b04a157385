//! Declarative backend generator: hand it a set of model descriptors and it
//! serves a complete authenticated CRUD API over a document store, plus the
//! email-based account flows that go with it.

pub mod account;
pub mod app;
pub mod auth;
pub mod config;
pub mod crud;
pub mod email;
pub mod error;
pub mod model;
pub mod store;
