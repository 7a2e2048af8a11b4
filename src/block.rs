use log::{info, warn};

use crate::common::{Addr, Gas, Wei};
use crate::config::EngineConfig;
use crate::core::{BlockInfo, Transferable, TxExecEnv, WorldState};

/// Height and time of the chain the ledger pretends to be part of.
#[derive(Clone, Debug)]
pub struct BlockContext {
    chain_id: u64,
    number: u64,
    timestamp: u64,
    coinbase: Addr,
    gas_limit: Gas,
    interval: u64,
    reward: Wei,
}

impl BlockContext {
    pub fn genesis(config: &EngineConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            number: 0,
            timestamp: config.genesis_timestamp,
            coinbase: config.coinbase.clone(),
            gas_limit: config.block_gas_limit,
            interval: config.block_interval,
            reward: config.block_reward.clone(),
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn coinbase(&self) -> &Addr {
        &self.coinbase
    }

    pub fn gas_limit(&self) -> Gas {
        self.gas_limit
    }

    /// What the interpreter sees of the current block.
    pub fn env(&self) -> TxExecEnv {
        TxExecEnv {
            chain_id: self.chain_id.into(),
            block: BlockInfo {
                coinbase: self.coinbase.clone(),
                timestamp: self.timestamp.into(),
                number: self.number.into(),
                gas_limit: self.gas_limit,
            },
        }
    }

    /// Advance by `blocks` blocks, `interval` seconds apart, crediting the
    /// reward of each to `beneficiary`, which becomes the new coinbase.
    pub fn mine<S: WorldState>(
        &mut self, state: &mut S, blocks: u64, beneficiary: &Addr,
    ) {
        if blocks == 0 {
            return
        }
        self.number = self.number.saturating_add(blocks);
        self.timestamp = self
            .timestamp
            .saturating_add(self.interval.saturating_mul(blocks));
        self.coinbase = beneficiary.clone();
        let credited = self
            .reward
            .checked_mul(&blocks.into())
            .and_then(|total| state.add_balance(beneficiary, &total));
        if credited.is_none() {
            warn!("block reward for {} blocks overflows", blocks)
        }
        info!(
            "mined {} blocks: number = {}, timestamp = {}, beneficiary = {}",
            blocks, self.number, self.timestamp, beneficiary
        );
    }
}

#[cfg(test)]
use crate::core::WorldStateR;

#[test]
fn test_mine() {
    let config = EngineConfig {
        block_reward: 5u64.into(),
        genesis_timestamp: 100,
        ..Default::default()
    };
    let mut block = BlockContext::genesis(&config);
    let mut state = crate::state::MemState::new();
    let miner = Addr::from_low_u64(3);
    block.mine(&mut state, 0, &miner);
    assert_eq!((block.number(), block.timestamp()), (0, 100));
    assert!(!state.exist(&miner));
    block.mine(&mut state, 100, &miner);
    assert_eq!(block.number(), 100);
    assert_eq!(block.timestamp(), 100 + 100 * 12);
    assert_eq!(state.get_balance(&miner), 500u64.into());
    assert_eq!(block.coinbase(), &miner);
    assert_eq!(block.env().block.number, 100.into());
}
