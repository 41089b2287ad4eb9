// Team-composition engine: slot-capped squad selection, the pick wizard,
// contest enrollment reconciliation and submission.

pub mod api;
pub mod catalog;
pub mod enrollment;
pub mod ids;
pub mod player;
pub mod selection;
pub mod session;
pub mod submit;
pub mod wizard;
