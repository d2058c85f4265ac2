// # ddns-core
//
// Core library for the RFC 2136 dynamic DNS updater.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping DNS names pointed
// at a changing local address:
// - **AddressSource**: Trait for discovering the addresses bound to an interface
// - **UpdateClient**: Trait for replacing a record set on the authoritative server
// - **ConfigSource**: Trait for (re)loading zone and key configuration
// - **DdnsEngine**: Periodic reconciliation driver guarded by an ExecutionGuard
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from protocol and platform code
// 2. **Fresh Configuration**: Zones and keys are reloaded on every tick
// 3. **Single Flight**: At most one tick runs at a time per engine
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Replace Semantics**: Every update deletes the RRset before inserting

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;
pub mod name;

// Re-export core types for convenience
pub use traits::{AddressSource, UpdateClient};
pub use engine::{DdnsEngine, EngineEvent, ExecutionGuard, TickOutcome, TickReport};
pub use config::{ConfigSource, EngineConfig, FileConfigSource, KeyRing, TsigKeyEntry, ZoneConfig};
pub use error::{Error, Result};
