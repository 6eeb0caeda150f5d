//! Command handlers

pub mod admin;
pub mod config;
pub mod migrate;
pub mod setting;
pub mod status;
