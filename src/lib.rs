pub mod auth;
pub mod bonus;
pub mod csv;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod points;

pub use bonus::BonusRules;
pub use engine::Engine;
pub use model::Command;
pub use points::Points;
