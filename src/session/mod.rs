pub mod guard;
pub mod manager;

pub use guard::{guard, GuardOutcome};
pub use manager::SessionManager;
