pub mod global;
pub mod loader;
pub mod plans;

pub use global::{LinkRuleConfig, ServiceConfig, StoreBackend, StoreConfig};
pub use loader::{ConfigLoader, CONFIG_FILE, ENV_PREFIX};
pub use plans::PlanConfig;
