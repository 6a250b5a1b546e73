//! flyerflow: volunteer flyer-distribution coordination backend
//!
//! Organizers partition a project area into zones (imported from KML map
//! exports), assign volunteers to zones, and track how much ground each
//! assignment has actually covered via geodesic union of coverage marks.
//!
//! This lib exposes the engine: geometry codec, KML importer, access
//! control, assignment lifecycle, completion tracking, sled persistence,
//! and the axum REST layer.

pub mod access;
pub mod auth;
pub mod error;
// Geometry codec: GeoJSON interchange <-> geo types <-> WKT persistence
pub mod geometry;
pub mod kml;
pub mod lifecycle;
pub mod models;
pub mod progress;
// REST API module: axum HTTP handlers, Bearer-auth middleware
pub mod rest;
pub mod storage;
