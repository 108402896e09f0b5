pub mod config;
pub mod extractor;
pub mod heuristic;
pub mod service;
pub mod verify;
