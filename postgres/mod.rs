pub mod connection;
pub mod driver;
pub mod index;
pub mod purge;

pub use connection::{ConnectionPool, PoolStatus};
pub use driver::PostgresDriver;
pub use index::PostgresIndex;
pub use purge::{PurgeReport, PurgeScheduler};
