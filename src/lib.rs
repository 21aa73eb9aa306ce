//! Ogify - social preview images from HTML-like markup
//!
//! Compiles markup fragments into element trees, lays them out with a
//! flexbox engine and renders SVG or PNG output.
//! This library exposes modules for integration testing.

pub mod api;
pub mod error;
pub mod markup;
pub mod models;
pub mod rendering;
pub mod server;
pub mod services;
