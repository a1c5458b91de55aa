//! HTTP API: event intake, grant redistribution and health.

pub mod app;
