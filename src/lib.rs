pub mod cli;
pub mod colony;
pub mod config;
pub mod geometry;
pub mod persistence;
pub mod thermal;
