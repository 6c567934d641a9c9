//! Configuration module for scanhub
//!
//! This module handles:
//! - The generic config tree and its deep-merge rule
//! - Loading global, local and explicit config fragments
//! - Scoped plugin lookup by run type, scan type and language
//! - Validation of the `scan` section

pub mod paths;
mod store;
mod tree;

pub use store::{
    write_example_config, ConfigFragment, ConfigStore, PluginId, ScanConfig,
    EXAMPLE_LOCAL_CONFIG,
};
pub use tree::{
    deep_merge, expand_dotted_keys, get_path, map_from_path, parse_fragment, ConfigMap,
    ConfigValue, FragmentFormat,
};
