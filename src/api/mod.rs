pub mod actor;
pub mod extract;
pub mod handover;
pub mod health;
