pub mod analyze;
pub mod cancel;
pub mod charts;
pub mod cli;
pub mod config;
pub mod controller;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod page;
pub mod upload;
pub mod web;
