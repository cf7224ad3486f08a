pub mod capture_device;
pub mod codec;
pub mod model_observer;
pub mod permission;
