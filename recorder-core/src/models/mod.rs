pub mod config;
pub mod error;
pub mod model;
pub mod recording_result;
pub mod state;
