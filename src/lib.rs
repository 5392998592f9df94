pub mod commands;
pub mod config;
pub mod detectors;
pub mod error;
pub mod executor;
pub mod indexer;
pub mod isolate;
pub mod lifecycle;
pub mod logger;
pub mod matcher;
pub mod state;
pub mod ui;
