//! CLI subcommand implementations for the Quizchain binary.

pub mod doctor;
pub mod serve;
pub mod solve_cmd;
