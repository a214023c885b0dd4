//! remoteweather - fan-out of station observations to storage backends, and
//! periodic weather reports to the APRS-IS network.

#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate tracing;
#[macro_use]
extern crate anyhow;

pub mod aprs;
pub mod calc;
pub mod config;
pub mod consumer;
pub mod error;
pub mod health;
pub mod ingest;
pub mod log;
pub mod reading;
pub mod route;
pub mod shutdown;

pub use error::Error;
pub use reading::Reading;
pub use route::Distributor;

/// software name reported to APRS-IS (login `vers` field and report comment)
pub const SOFTWARE: &str = "remoteweather";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
