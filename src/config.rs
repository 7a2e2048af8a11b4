use serde::{Deserialize, Serialize};

use crate::common::{Addr, Gas, Wei};
use crate::error::Error;

/// Engine parameters. Missing fields in a JSON document take their default
/// values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chain_id: u64,
    /// Charged for every message before any code runs.
    pub intrinsic_gas: Gas,
    /// Budget of messages sent without an explicit one.
    pub default_gas: Gas,
    pub block_gas_limit: Gas,
    /// Seconds between two mined blocks.
    pub block_interval: u64,
    /// Credited to the beneficiary for each mined block.
    pub block_reward: Wei,
    pub genesis_timestamp: u64,
    pub coinbase: Addr,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            intrinsic_gas: 21_000,
            default_gas: 1_000_000,
            block_gas_limit: 10_000_000,
            block_interval: 12,
            block_reward: 1_500_000_000_000_000_000u128.into(),
            genesis_timestamp: 0,
            coinbase: Addr::zero().clone(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(s: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.default_gas > self.block_gas_limit {
            return Err(Error::InvalidConfig(
                "default_gas exceeds block_gas_limit",
            ))
        }
        if self.intrinsic_gas > self.default_gas {
            return Err(Error::InvalidConfig(
                "intrinsic_gas exceeds default_gas",
            ))
        }
        Ok(())
    }
}

#[test]
fn test_partial_json() {
    let config = EngineConfig::from_json(
        r#"{"block_interval": 15, "block_reward": "0x64",
            "coinbase": "0x00000000000000000000000000000000000000ff"}"#,
    )
    .unwrap();
    assert_eq!(config.block_interval, 15);
    assert_eq!(config.block_reward, 100u64.into());
    assert_eq!(config.coinbase, Addr::from_low_u64(0xff));
    assert_eq!(config.intrinsic_gas, 21_000);
}

#[test]
fn test_rejects_bad_config() {
    assert!(matches!(
        EngineConfig::from_json(r#"{"default_gas": 20000000}"#),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        EngineConfig::from_json(r#"{"chain_id": "one"}"#),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_to_json() {
    let json = EngineConfig::default().to_json().unwrap();
    assert!(json.contains(r#""block_reward": "0x14d1120d7b160000""#));
    assert!(json.contains(
        r#""coinbase": "0x0000000000000000000000000000000000000000""#
    ));
    assert_eq!(
        EngineConfig::from_json(&json).unwrap(),
        EngineConfig::default()
    );
}
