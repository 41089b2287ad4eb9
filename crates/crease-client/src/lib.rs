// HTTP implementation of the engine's backend contract.

pub mod http;

pub use http::{HttpApi, HttpSettings, DEFAULT_SLOTS_PATH};
