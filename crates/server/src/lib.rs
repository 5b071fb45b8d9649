pub mod api;
pub mod cli;
pub mod metrics;
pub mod output;
pub mod state;
