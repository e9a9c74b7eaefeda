pub mod error;
pub mod services;
pub mod health;
pub mod lock;
pub mod storage;
pub mod space;
pub mod staging;
pub mod interrupt;
pub mod maintenance;
pub mod docker;
pub mod database;
pub mod mirror;
pub mod archive;
pub mod catalog;
pub mod layout;
pub mod config;
pub mod credentials;
pub mod capture;
pub mod retention;
pub mod context;
pub mod backup;
pub mod restore;
pub mod schedule;

#[cfg(test)]
pub mod testing;

pub use backup::{BackupOrchestrator, BackupPlan, BackupReport, Strategy};
pub use config::EnvStore;
pub use context::EngineContext;
pub use docker::DockerManager;
pub use error::{EngineError, EngineResult};
pub use restore::{RestoreOrchestrator, RestoreReport};
