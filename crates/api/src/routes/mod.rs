//! HTTP route handlers

pub mod alerts;
pub mod sessions;
