//! qc-sheet: サイズスペック表からQCシートを生成するCLI

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod selector;
pub mod store;
