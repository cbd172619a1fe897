pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod notify;
pub mod rewrite;
pub mod session;
pub mod settings;
pub mod store;
pub mod templates;
