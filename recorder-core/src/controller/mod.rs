mod model_store;
pub mod recorder;
mod ticker;
