/*
 * Responsibility
 * - crate surface; built as a library so router-level tests can drive
 *   app::build_router directly
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;
