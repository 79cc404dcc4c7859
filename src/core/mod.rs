//! Request/result model, host capability probe, and the strategy waterfall

pub mod capabilities;
pub mod orchestrator;
pub mod request;

pub use capabilities::Capabilities;
pub use orchestrator::{AcquireConfig, Orchestrator};
pub use request::{
    AcquireStatus, AcquisitionRequest, AttemptStatus, DownloadResult, OutputTarget, Platform,
    StrategyAttempt,
};
