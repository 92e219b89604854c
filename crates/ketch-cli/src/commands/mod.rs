//! CLI commands

pub mod app;
pub mod application;
pub mod builder;
pub mod cname;
pub mod controller;
pub mod env;
pub mod framework;
pub mod unit;
