//! Settings shared by the promptinit binaries.

pub mod settings;

pub use settings::{
    DatabaseSettings, Environment, LogFormat, SeedSettings, Settings, TelemetrySettings,
};
