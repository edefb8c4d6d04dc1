pub mod audio;
pub mod config;
pub mod error;
pub mod services;
pub mod session;
pub mod transport;

pub use session::controller::{SessionController, SessionHandle, SessionOutcome};
