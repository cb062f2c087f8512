//! HTTP handlers for synthesized data routes and `/dt` metadata routes.

pub mod entity;
pub mod fallback;
pub mod function;
pub mod health;
pub mod metadata;
