// Named configuration store replacing ad-hoc global settings

pub mod handlers;
pub mod store;

pub use store::{PgSettingsStore, SettingsStore, DELIVERY_DEFAULT_CHARGE};
