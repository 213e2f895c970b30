//! Switchboard Gateway - HTTP front door for networked IoT switches
//!
//! This library provides the core functionality for the Switchboard gateway:
//! - Device registry lookup (device id → backend host)
//! - Transparent reverse proxying to device backends
//! - Switch state telemetry published to an HTTP-to-MQTT sender
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Callers                          │
//! │      Home automation  │  Dashboards  │  Scripts      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Switchboard Gateway                   │
//! │   Notify middleware  │  Registry  │  Dispatcher      │
//! └──────────┬──────────────────────────────┬───────────┘
//!            │                              │
//! ┌──────────▼──────────┐        ┌──────────▼──────────┐
//! │   MQTT sender       │        │  Device backends     │
//! │   POST /publish     │        │  http://<host>/...   │
//! └─────────────────────┘        └─────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod proxy;
pub mod registry;

pub use api::{ApiServer, ApiServerBuilder, ApiState, ErrorResponse};
pub use config::Config;
pub use error::{Error, Result};
pub use notify::{SwitchCommand, TelemetryEvent, TelemetryPublisher, get_state};
pub use proxy::Dispatcher;
pub use registry::{Device, DeviceRegistry, DeviceSource, DuplicatePolicy, Registry};
