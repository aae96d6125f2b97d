use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mainline execution-layer hardforks, in activation order.
#[repr(u8)]
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default, Serialize, Deserialize,
)]
pub enum Fork {
    Frontier = 0,
    Homestead = 1,
    TangerineWhistle = 2,
    SpuriousDragon = 3,
    Byzantium = 4,
    Constantinople = 5,
    Petersburg = 6,
    Istanbul = 7,
    MuirGlacier = 8,
    Berlin = 9,
    London = 10,
    ArrowGlacier = 11,
    GrayGlacier = 12,
    Paris = 13,
    #[default]
    Shanghai = 14,
    Cancun = 15,
}

impl Fork {
    pub const ALL: [Fork; 16] = [
        Fork::Frontier,
        Fork::Homestead,
        Fork::TangerineWhistle,
        Fork::SpuriousDragon,
        Fork::Byzantium,
        Fork::Constantinople,
        Fork::Petersburg,
        Fork::Istanbul,
        Fork::MuirGlacier,
        Fork::Berlin,
        Fork::London,
        Fork::ArrowGlacier,
        Fork::GrayGlacier,
        Fork::Paris,
        Fork::Shanghai,
        Fork::Cancun,
    ];

    /// EIPs first activated by this fork.
    pub fn eips(&self) -> &'static [u64] {
        match self {
            Fork::Frontier => &[],
            Fork::Homestead => &[2, 7, 8],
            Fork::TangerineWhistle => &[150],
            Fork::SpuriousDragon => &[155, 160, 161, 170],
            Fork::Byzantium => &[100, 140, 196, 197, 198, 211, 214, 649, 658],
            Fork::Constantinople => &[145, 1014, 1052, 1234, 1283],
            Fork::Petersburg => &[],
            Fork::Istanbul => &[152, 1108, 1344, 1884, 2028, 2200],
            Fork::MuirGlacier => &[2384],
            Fork::Berlin => &[2565, 2718, 2929, 2930],
            Fork::London => &[1559, 3198, 3529, 3541],
            Fork::ArrowGlacier => &[4345],
            Fork::GrayGlacier => &[5133],
            Fork::Paris => &[3675, 4399],
            Fork::Shanghai => &[3651, 3855, 3860, 4895],
            Fork::Cancun => &[1153, 4788, 4844, 5656, 6780, 7516],
        }
    }
}

impl From<Fork> for &str {
    fn from(fork: Fork) -> Self {
        match fork {
            Fork::Frontier => "Frontier",
            Fork::Homestead => "Homestead",
            Fork::TangerineWhistle => "TangerineWhistle",
            Fork::SpuriousDragon => "SpuriousDragon",
            Fork::Byzantium => "Byzantium",
            Fork::Constantinople => "Constantinople",
            Fork::Petersburg => "Petersburg",
            Fork::Istanbul => "Istanbul",
            Fork::MuirGlacier => "MuirGlacier",
            Fork::Berlin => "Berlin",
            Fork::London => "London",
            Fork::ArrowGlacier => "ArrowGlacier",
            Fork::GrayGlacier => "GrayGlacier",
            Fork::Paris => "Paris",
            Fork::Shanghai => "Shanghai",
            Fork::Cancun => "Cancun",
        }
    }
}

impl std::fmt::Display for Fork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", <&str>::from(*self))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainParamsError {
    #[error("Unknown parameter '{category}/{name}' for the active hardfork and EIP set")]
    UnknownParameter { category: String, name: String },
    #[error("EIP-{0} is not known to this registry and cannot be activated")]
    UnsupportedEip(u64),
}

/// What switches a parameter definition on: reaching a hardfork, or an EIP
/// being active (by schedule or explicit activation).
#[derive(Debug, Clone, Copy)]
enum Activation {
    Hardfork(Fork),
    Eip(u64),
}

struct ParamDef {
    category: &'static str,
    name: &'static str,
    activation: Activation,
    value: u64,
}

/// Entries for the same `(category, name)` pair are ordered oldest-first;
/// the last active definition wins.
static PARAMS: &[ParamDef] = &[
    ParamDef {
        category: "gas",
        name: "tx",
        activation: Activation::Hardfork(Fork::Frontier),
        value: 21000,
    },
    ParamDef {
        category: "gas",
        name: "txCreation",
        activation: Activation::Hardfork(Fork::Homestead),
        value: 32000,
    },
    ParamDef {
        category: "gas",
        name: "txDataZero",
        activation: Activation::Hardfork(Fork::Frontier),
        value: 4,
    },
    ParamDef {
        category: "gas",
        name: "txDataNonZero",
        activation: Activation::Hardfork(Fork::Frontier),
        value: 68,
    },
    ParamDef {
        category: "gas",
        name: "txDataNonZero",
        activation: Activation::Eip(2028),
        value: 16,
    },
    ParamDef {
        category: "gas",
        name: "accessListAddress",
        activation: Activation::Eip(2930),
        value: 2400,
    },
    ParamDef {
        category: "gas",
        name: "accessListStorageKey",
        activation: Activation::Eip(2930),
        value: 1900,
    },
    ParamDef {
        category: "gas",
        name: "initCodeWordCost",
        activation: Activation::Eip(3860),
        value: 2,
    },
    ParamDef {
        category: "vm",
        name: "maxInitCodeSize",
        activation: Activation::Eip(3860),
        value: 49152,
    },
    ParamDef {
        category: "sharding",
        name: "blobCommitmentVersionKzg",
        activation: Activation::Eip(4844),
        value: 0x01,
    },
    ParamDef {
        category: "sharding",
        name: "maxBlobsPerTx",
        activation: Activation::Eip(4844),
        value: 6,
    },
];

/// Chain configuration a transaction is built against: chain id, active
/// hardfork and explicitly activated EIPs.
///
/// Numeric protocol parameters resolve through [`ChainParams::param`]
/// against the fork/EIP state, so a bumped hardfork is always reflected on
/// the next lookup. Every constructed transaction embeds its own clone;
/// mutating the original afterwards cannot change the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    chain_id: u64,
    fork: Fork,
    #[serde(default)]
    eips: Vec<u64>,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl ChainParams {
    pub fn new(chain_id: u64, fork: Fork) -> Self {
        Self {
            chain_id,
            fork,
            eips: Vec::new(),
        }
    }

    pub fn mainnet() -> Self {
        Self::new(1, Fork::default())
    }

    pub fn sepolia() -> Self {
        Self::new(11155111, Fork::default())
    }

    pub fn holesky() -> Self {
        Self::new(17000, Fork::default())
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn fork(&self) -> Fork {
        self.fork
    }

    pub fn set_fork(&mut self, fork: Fork) {
        self.fork = fork;
    }

    pub fn eips(&self) -> &[u64] {
        &self.eips
    }

    /// Replaces the explicitly activated EIP set. EIPs unknown to the fork
    /// schedule cannot be activated.
    pub fn set_eips(&mut self, eips: Vec<u64>) -> Result<(), ChainParamsError> {
        for eip in &eips {
            if !Fork::ALL.iter().any(|fork| fork.eips().contains(eip)) {
                return Err(ChainParamsError::UnsupportedEip(*eip));
            }
        }
        self.eips = eips;
        Ok(())
    }

    /// Whether an EIP is active, either through the hardfork schedule or the
    /// explicit activation list.
    pub fn is_activated_eip(&self, eip: u64) -> bool {
        if self.eips.contains(&eip) {
            return true;
        }
        Fork::ALL
            .iter()
            .take_while(|fork| **fork <= self.fork)
            .any(|fork| fork.eips().contains(&eip))
    }

    /// Numeric protocol parameter active for the current fork and EIP set.
    pub fn param(&self, category: &str, name: &str) -> Result<u64, ChainParamsError> {
        let mut found = None;
        for def in PARAMS {
            if def.category != category || def.name != name {
                continue;
            }
            let active = match def.activation {
                Activation::Hardfork(fork) => self.fork >= fork,
                Activation::Eip(eip) => self.is_activated_eip(eip),
            };
            if active {
                found = Some(def.value);
            }
        }
        found.ok_or_else(|| ChainParamsError::UnknownParameter {
            category: category.to_string(),
            name: name.to_string(),
        })
    }
}
