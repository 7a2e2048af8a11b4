//! The ledger: a world state, a block context and the entry points to change
//! them.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;

use crate::abi::{encode_call, Arg};
use crate::block::BlockContext;
use crate::common::{Addr, Bytes, Gas, Hash, Wei, U256};
use crate::config::EngineConfig;
use crate::core::{Message, Snapshot, Transferable, WorldState, WorldStateR};
use crate::error::{CompileError, Error};
use crate::processor::{run_message, Receipt};
use crate::state::{Account, MemState};

/// Turns contract source into init code. The ledger never looks at source
/// text itself.
pub trait Compiler {
    fn compile(&self, src: &str) -> Result<Vec<u8>, CompileError>;
}

pub struct Ledger {
    state: Arc<RwLock<MemState>>,
    block: RwLock<BlockContext>,
    config: EngineConfig,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Ledger {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemState::new())),
            block: RwLock::new(BlockContext::genesis(&config)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A copy of the current block context.
    pub fn block(&self) -> BlockContext {
        self.block.read().clone()
    }

    /// Shared handle to the underlying state.
    pub fn state(&self) -> Arc<RwLock<MemState>> {
        self.state.clone()
    }

    /// Credit `amount` to `addr` out of thin air (genesis allocation).
    pub fn fund(&self, addr: &Addr, amount: &Wei) {
        if self.state.write().add_balance(addr, amount).is_none() {
            warn!("funding {} with {} overflows its balance", addr, amount)
        }
    }

    /// Apply a message. The state stays write-locked until the message is
    /// done, so readers only ever see it before or after.
    pub fn apply(&self, msg: Message) -> Receipt {
        let env = self.block.read().env();
        let mut state = self.state.write();
        run_message(&mut *state, &env, self.config.intrinsic_gas, msg)
    }

    /// Send `value` and `input` to `to` with the default gas budget.
    pub fn send(
        &self, sender: &Addr, to: &Addr, value: Wei, input: Bytes,
    ) -> Receipt {
        self.apply(Message::call(
            sender.clone(),
            to.clone(),
            value,
            self.config.default_gas,
            input,
        ))
    }

    /// Call function `funid` of `to` with encoded `args`. Fails without
    /// touching the state if an argument does not fit its slot.
    pub fn call(
        &self, sender: &Addr, to: &Addr, value: Wei, funid: u8, args: &[Arg],
    ) -> Result<Receipt, Error> {
        Ok(self.send(sender, to, value, encode_call(funid, args)?))
    }

    /// Run `init` as the init code of a new account and return its address.
    pub fn deploy(
        &self, sender: &Addr, init: Vec<u8>, endowment: Wei, gas: Gas,
    ) -> Result<Addr, Error> {
        let msg = Message::create(sender.clone(), endowment, gas, init.into());
        let receipt = self.apply(msg);
        match receipt.created {
            Some(addr) => {
                info!("contract deployed at {}", addr);
                Ok(addr)
            }
            None => Err(Error::Deploy {
                status: receipt.status,
                reason: receipt.error,
            }),
        }
    }

    /// Compile `src` and deploy the result with the default gas budget.
    pub fn contract<C: Compiler + ?Sized>(
        &self, compiler: &C, src: &str, sender: &Addr, endowment: Wei,
    ) -> Result<Addr, Error> {
        let init = compiler.compile(src)?;
        self.deploy(sender, init, endowment, self.config.default_gas)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.write().snapshot()
    }

    /// Restore the state to what it was when `token` was taken. The block
    /// context is not part of the state and stays where it is.
    pub fn revert(&self, token: Snapshot) -> Result<(), Error> {
        Ok(self.state.write().rollback(token)?)
    }

    /// Keep everything done since `token` was taken and forget the token.
    pub fn commit(&self, token: Snapshot) -> Result<(), Error> {
        Ok(self.state.write().discard(token)?)
    }

    /// Advance the block context and pay the rewards. Both locks are held
    /// for the whole step, so no message runs between the two.
    pub fn mine(&self, blocks: u64, beneficiary: &Addr) {
        let mut state = self.state.write();
        self.block.write().mine(&mut *state, blocks, beneficiary)
    }

    pub fn balance(&self, addr: &Addr) -> Wei {
        self.state.read().get_balance(addr)
    }

    pub fn nonce(&self, addr: &Addr) -> u64 {
        self.state.read().get_nonce(addr)
    }

    pub fn storage(&self, addr: &Addr, key: &Hash) -> U256 {
        self.state.read().get_state(addr, key)
    }

    pub fn code(&self, addr: &Addr) -> Bytes {
        self.state.read().get_code(addr).as_bytes().into()
    }

    pub fn exists(&self, addr: &Addr) -> bool {
        self.state.read().exist(addr)
    }

    pub fn account(&self, addr: &Addr) -> Option<Account> {
        self.state.read().get(addr)
    }
}
