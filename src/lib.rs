pub mod ai;
pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod gemini;
pub mod projects;
pub mod session;
