//! The NPSB TCP switch built on top of the `iso8583` wire codec: framing,
//! connection classification, STAN correlation, the network-management
//! auto-responder, and the per-message routing policy that ties them
//! together.

pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod framer;
pub mod inject;
pub mod netmgmt;
pub mod registry;

pub use config::Config;
pub use dispatcher::Switch;
