pub mod simulation;
pub mod sweep;
