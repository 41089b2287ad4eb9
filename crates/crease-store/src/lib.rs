// Local SQLite backend for the team builder, plus CSV seeding.

pub mod import;
pub mod store;

pub use store::{ContestSeed, LocalStore, StoreError};
