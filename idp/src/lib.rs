/*
 * Responsibility
 * - crate surface of the dummy OpenID-Connect provider
 * - exposed as a library so the API crate's end-to-end tests can spawn it
 *   in-process on an ephemeral port
 */
pub mod app;
pub mod codes;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keys;
pub mod state;
