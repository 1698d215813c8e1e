pub mod chain;
pub mod config;
pub mod logging;
pub mod merge;
pub mod resolver;
pub mod runner;
pub mod store;

pub mod util {
    pub mod env;
}

pub use chain::{ChainClient, RegisteredProducer};
pub use config::SyncConfig;
pub use merge::EnrichedProducer;
pub use runner::{RunSummary, SyncRunner};
pub use store::Store;
