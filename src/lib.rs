pub mod audit;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod monitor;
pub mod registry;
pub mod report;
pub mod search;
pub mod storage;
pub mod system;
pub mod validation;

pub use config::AuditConfig;
pub use error::{AuditError, AuditResult};
pub use system::{AuditLoggingSystem, WriteReceipt};
