//! wdrelay Traits - the seam between the relay engine and its controller.
//!
//! The controller transport (registration, notify/error delivery, file upload)
//! lives outside the relay core. This crate names what the core needs from it:
//! - `ControllerChannel` for result, error and artifact delivery
//! - `NotifyTarget` identifying the script/adapter a reply belongs to

pub mod controller;

pub use controller::{ControllerChannel, NotifyTarget};
