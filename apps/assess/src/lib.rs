pub mod cli;
pub mod config;
pub mod jobs;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use config::Config;
pub use jobs::{JobClient, JobError, JobTicket, Upload};
pub use session::{SessionManager, SessionOptions, SessionState};
