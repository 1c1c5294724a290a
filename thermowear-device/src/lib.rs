//! Client for the wearable heating element.
//!
//! The device is an HTTP service with two endpoints:
//! - `PUT /api/setpoint` with `{"setpoint": <int>}`
//! - `GET /api/temperature` returning `{"temperature": <float>}`

pub mod element;
pub mod error;
pub mod transport;

pub use element::{Convergence, HeatingElement, POLL_INTERVAL};
pub use error::DeviceError;
pub use transport::{HttpTransport, REQUEST_TIMEOUT, Transport};
