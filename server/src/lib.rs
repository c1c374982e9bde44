//! Community content server.
//!
//! CRUD storage for activities, events and gallery photos behind an HTTP
//! API, with either JSON files (optionally versioned in git) or SQLite as
//! the backing store, and an image pipeline for uploaded pictures.

pub mod assets;
pub mod config;
pub mod http;
pub mod persistence;
pub mod service;
pub mod versioning;
