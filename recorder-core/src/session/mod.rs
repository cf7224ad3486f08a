pub mod gateway;
pub mod recording;
