//! sprtexam-store: in-memory collaborators and engine wiring.
//!
//! Implements the `ExamCatalog`, `QuestionStore` and `AttemptStore` traits
//! over in-memory maps, loads the tool configuration, and builds a ready
//! `SprtEngine` from parsed catalogs.

pub mod clock;
pub mod config;
pub mod error;
pub mod memory;

pub use clock::ManualClock;
pub use config::{create_engine, load_config, load_config_from, EngineParts, SprtexamConfig};
pub use error::StoreError;
pub use memory::{InMemoryAttemptStore, InMemoryCatalog};
