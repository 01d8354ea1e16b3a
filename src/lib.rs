//! QuckApp real-time gateway library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod call;
pub mod chat;
pub mod clients;
pub mod config;
pub mod error;
pub mod notify;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod routes;
pub mod state;
pub mod ws;
