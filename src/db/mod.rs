pub mod memory;
pub mod models;
pub mod monitor;
pub mod postgres;
pub mod store;

pub use memory::MemoryHandoverStore;
pub use monitor::StalePendingMonitor;
pub use postgres::PgHandoverStore;
pub use store::{HandoverStore, StationTx};
