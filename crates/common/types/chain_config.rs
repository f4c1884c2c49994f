use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use Fork::*;

/// Ethereum feature sets the host chain can activate, in activation order.
#[repr(u8)]
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Clone, Copy, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Fork {
    Frontier = 0,
    Homestead = 1,
    Byzantium = 2,
    Constantinople = 3,
    Petersburg = 4,
    Istanbul = 5,
    Berlin = 6,
    London = 7,
    Shanghai = 8,
    #[default]
    Cancun = 9,
}

impl<T> Index<Fork> for [T] {
    type Output = T;
    fn index(&self, fork: Fork) -> &Self::Output {
        &self[fork as usize]
    }
}

impl<T> IndexMut<Fork> for [T] {
    fn index_mut(&mut self, fork: Fork) -> &mut Self::Output {
        &mut self[fork as usize]
    }
}

pub const FORKS: [Fork; 10] = [
    Frontier,
    Homestead,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Shanghai,
    Cancun,
];

/// EVM settings of the host chain. Unlike Ethereum mainnet every fork is keyed by
/// block height, since the host consensus has no notion of fork timestamps.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Current chain identifier
    pub chain_id: u64,
    /// Block height at which each fork was activated
    /// (None = no fork, 0 = fork is active since genesis)
    pub fork_activation_heights: [Option<u64>; FORKS.len()],
}

impl ChainConfig {
    /// A config with every known fork active since genesis.
    pub fn all_forks_at_genesis(chain_id: u64) -> Self {
        Self {
            chain_id,
            fork_activation_heights: [Some(0); FORKS.len()],
        }
    }

    pub fn is_fork_activated(&self, fork: Fork, height: u64) -> bool {
        self.fork_activation_heights[fork].is_some_and(|activation| height >= activation)
    }

    /// The latest fork active at `height`. Frontier rules apply when nothing is scheduled.
    pub fn fork(&self, height: u64) -> Fork {
        let Some(index) = self
            .fork_activation_heights
            .iter()
            .rposition(|activation| activation.is_some_and(|activation| activation <= height))
        else {
            return Frontier;
        };
        FORKS[index]
    }

    /// Whether the fee market (EIP-1559) rules are active at `height`.
    pub fn is_london(&self, height: u64) -> bool {
        self.is_fork_activated(London, height)
    }

    /// Returns a copy of this config with the given overrides applied on top.
    pub fn with_overrides(&self, overrides: &ChainConfigOverrides) -> Self {
        let mut config = self.clone();
        if let Some(chain_id) = overrides.chain_id {
            config.chain_id = chain_id;
        }
        let heights = [
            (Homestead, overrides.homestead_block),
            (Byzantium, overrides.byzantium_block),
            (Constantinople, overrides.constantinople_block),
            (Petersburg, overrides.petersburg_block),
            (Istanbul, overrides.istanbul_block),
            (Berlin, overrides.berlin_block),
            (London, overrides.london_block),
            (Shanghai, overrides.shanghai_block),
            (Cancun, overrides.cancun_block),
        ];
        for (fork, height) in heights {
            if height.is_some() {
                config.fork_activation_heights[fork] = height;
            }
        }
        config
    }
}

/// Partial chain config accepted by trace requests to replay a transaction under
/// different fork rules.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfigOverrides {
    pub chain_id: Option<u64>,
    pub homestead_block: Option<u64>,
    pub byzantium_block: Option<u64>,
    pub constantinople_block: Option<u64>,
    pub petersburg_block: Option<u64>,
    pub istanbul_block: Option<u64>,
    pub berlin_block: Option<u64>,
    pub london_block: Option<u64>,
    pub shanghai_block: Option<u64>,
    pub cancun_block: Option<u64>,
}
