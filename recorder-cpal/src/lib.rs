//! # recorder-cpal
//!
//! Cross-platform microphone backend for recorder-core, built on cpal.
//!
//! Provides:
//! - `CpalProvider`: `DeviceProvider` for the default or a named input device
//! - `cpal_permission`: `PermissionOracle` polling input availability
//! - `convert` and `bridge`: format conversion and the callback-to-read bridge
//!
//! The cpal parts are behind the `native` feature, which needs the host's
//! audio development libraries (ALSA headers on Linux).
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use recorder_core::{AudioGateway, RecorderConfig, RecordingController};
//! use recorder_cpal::{cpal_permission, CpalProvider, DEFAULT_POLL_INTERVAL};
//!
//! let gateway = AudioGateway::new(RecorderConfig::default(), Arc::new(CpalProvider::default_device()))?;
//! let controller = RecordingController::new(gateway, Arc::new(cpal_permission(DEFAULT_POLL_INTERVAL)))?;
//! controller.start();
//! ```

pub mod bridge;
pub mod convert;

#[cfg(feature = "native")]
pub mod cpal_device;
#[cfg(feature = "native")]
pub mod permissions;

#[cfg(feature = "native")]
pub use cpal_device::CpalProvider;
#[cfg(feature = "native")]
pub use permissions::{cpal_permission, default_input_available, DEFAULT_POLL_INTERVAL};
