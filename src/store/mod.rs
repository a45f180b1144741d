//! Store adapters.
//!
//! In-memory implementations of every store trait in `freshtrack_core::store`, plus
//! a TOML-file settings store so runtime settings survive a restart.

mod memory;
mod settings_file;

pub use memory::{
    MemoryInventoryStore, MemoryPolicyStore, MemorySettingsStore, MemoryTemperatureLog,
};
pub use settings_file::TomlSettingsStore;
