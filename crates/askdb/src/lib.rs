#![forbid(unsafe_code)]

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod models;
pub mod session;
pub mod sqlite;
pub mod trace;
pub mod utils;

pub use cli::app::{Cli, Command};
