// src/lib.rs
pub mod banner;
pub mod config;
pub mod errors;
pub mod fence;
pub mod models;
pub mod providers;
pub mod runner;
pub mod sandbox;
pub mod session;
