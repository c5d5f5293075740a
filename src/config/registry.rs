//! Defaults applied to newly created registries.

use serde::Deserialize;

use crate::interfaces::IssuanceType;
use crate::record::{RegistryOptions, DEFAULT_MAX_CRED_NUM, DEFAULT_REVOC_DEF_TYPE};

/// Registry parameters used when a caller does not choose its own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryDefaults {
    /// Accumulator scheme tag.
    pub revoc_def_type: String,
    /// Capacity of each new registry.
    pub max_cred_num: u32,
    pub issuance_type: IssuanceType,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            revoc_def_type: DEFAULT_REVOC_DEF_TYPE.to_string(),
            max_cred_num: DEFAULT_MAX_CRED_NUM,
            issuance_type: IssuanceType::default(),
        }
    }
}

impl RegistryDefaults {
    /// Creation options with these defaults and a record-derived tag.
    pub fn options(&self) -> RegistryOptions {
        RegistryOptions {
            revoc_def_type: self.revoc_def_type.clone(),
            max_cred_num: self.max_cred_num,
            issuance_type: self.issuance_type,
            tag: None,
        }
    }
}
