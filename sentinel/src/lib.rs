pub mod config;
pub mod hooks;
pub mod monitor;
pub mod overlay;
pub mod policy;
pub mod queue;
pub mod worker;

pub use config::Config;
pub use hooks::ModerationContext;
pub use monitor::ContentMonitor;
