use serde::{Deserialize, Serialize};
use tally_core::constants::DEFAULT_INITIAL_PRICE;
use tally_core::error::TallyError;
use tally_core::protocol::ProtocolParams;
use tally_core::types::{Balance, Price};

/// One opening balance. `account` is the base-58 account id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub account: String,
    pub balance: Balance,
}

/// Deployment parameters read from the genesis JSON file.
///
/// Every field but `allocations` may be omitted and falls back to the
/// protocol defaults.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisParams {
    /// Reference price published before the first epoch is finalized.
    #[serde(default = "default_initial_price")]
    pub initial_price: Price,
    #[serde(default)]
    pub protocol: ProtocolParams,
    /// Reserve units backing the opening allocations.
    #[serde(default)]
    pub initial_reserve: Balance,
    pub allocations: Vec<Allocation>,
}

fn default_initial_price() -> Price {
    DEFAULT_INITIAL_PRICE
}

impl Default for GenesisParams {
    fn default() -> Self {
        Self {
            initial_price: DEFAULT_INITIAL_PRICE,
            protocol: ProtocolParams::default(),
            initial_reserve: 0,
            allocations: Vec::new(),
        }
    }
}

impl GenesisParams {
    pub fn from_json(json: &str) -> Result<Self, TallyError> {
        serde_json::from_str(json).map_err(|e| TallyError::Serialization(e.to_string()))
    }
}
