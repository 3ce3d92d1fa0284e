//! API integration tests entry point
//!
//! Drives the production router over the in-memory config store.
//! No external dependencies (database, network) are required.

mod api;
