//! Client for the ERP system of record.
//!
//! The transport seam ([`transport::ErpTransport`]) keeps everything above it
//! testable without a live server: the envelope decoder normalizes transport
//! statuses and body-encoded failures into one error taxonomy, the client owns
//! the retry loop, and the directory/record/audit services speak domain types.

pub mod audit;
pub mod client;
pub mod context;
pub mod directory;
pub mod envelope;
pub mod record;
pub mod transport;

pub use audit::AuditLogger;
pub use client::ErpClient;
pub use context::{Clock, ContextCache, SystemClock};
pub use directory::DirectoryFetcher;
pub use record::RecordService;
pub use transport::{ErpRequest, ErpResponse, ErpTransport, HttpTransport, TransportError};
