//! # lingua-data
//!
//! DataAccess contracts: typed reads against tables the platform
//! ingests but never writes, and typed writes against the tables it
//! owns (`spec.md` §3 "Lifecycle ownership", §4.11).
//!
//! Every other service-core crate takes `Arc<dyn DataReader>` and/or
//! `Arc<dyn DataWriter>` rather than a concrete store, so the gateway
//! can wire up whatever backs production while tests use
//! [`mock::MockDataStore`].

pub mod mock;
pub mod reader;
pub mod records;
pub mod writer;

pub use mock::MockDataStore;
pub use reader::DataReader;
pub use records::{UserProfile, WordRecord};
pub use writer::{DataWriter, ERASABLE_TABLES};
