use std::sync::Arc;

mod alu;
mod call;
mod exec;
mod gas;
mod memory;
pub mod opcode;
pub mod params;
mod stack;

use crate::common::{checked_as_u64, Addr, Gas, Hash, Wei, U256};
use crate::error::SnapshotError;
pub use exec::{
    execute, CallKind, LogEntry, Message, PlainCode, Status, Target,
    Transferable, TxExecResult, WorldStateExtra,
};
pub use gas::GasMeter;

/// An immutable code object that can be read-shared by threads. Necessary
/// internal caching should be implemented to make all the methods execute in
/// constant (O(1)) time. For a simple, standalone implementation, refer to
/// [PlainCode].
pub trait Code: Send + Sync {
    fn is_valid_jumpdest(&self, dest: &U256) -> bool;
    fn as_bytes(&self) -> &[u8];
    fn get_hash(&self) -> &Hash;
}

/// Read half of the world state.
pub trait WorldStateR {
    /// Get the value from the `account` state space, indexed by `key`. Absent
    /// keys read as zero.
    fn get_state(&self, account: &Addr, key: &Hash) -> U256;
    /// Get the balance of the `account`.
    fn get_balance(&self, account: &Addr) -> Wei;
    /// Get code of the contract account. If code does not exist, the Code
    /// object should return a zero-byte slice.
    fn get_code(&self, account: &Addr) -> Arc<dyn Code>;
    /// Get nonce of the account.
    fn get_nonce(&self, account: &Addr) -> u64;
    /// Check if an account exists.
    fn exist(&self, account: &Addr) -> bool;
}

/// Write half of the world state. Every write brings the account into
/// existence.
pub trait WorldStateW {
    /// Set the key under the given account to a specified value.
    fn set_state(&mut self, account: &Addr, key: &Hash, val: &U256);
    /// Set the balance of the account.
    fn set_balance(&mut self, account: &Addr, balance: &Wei);
    /// Set the code of the contract account.
    fn set_code(&mut self, account: &Addr, code: &[u8]);
    /// Set the nonce of the account.
    fn set_nonce(&mut self, account: &Addr, nonce: u64);
    /// Create a fresh account, wiping whatever was stored under the address
    /// except for its balance.
    fn create_account(&mut self, addr: &Addr);
    /// Delete an account.
    fn delete_account(&mut self, addr: &Addr);
}

/// Token returned by [WorldState::snapshot]. A token names one revision of the
/// state: once that revision is rolled back or discarded (directly, or by
/// acting on an older token) the token is stale and every further use of it
/// fails with [SnapshotError::Stale].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Snapshot {
    depth: usize,
    id: u64,
}

impl Snapshot {
    pub fn new(depth: usize, id: u64) -> Self {
        Self { depth, id }
    }

    /// Position of the revision the token names (outermost is 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A world state that supports nested, explicitly committed revisions.
///
/// Snapshots nest: tokens must be rolled back or discarded innermost first,
/// and acting on an outer token implicitly ends every inner one.
pub trait WorldState: WorldStateR + WorldStateW {
    /// Start a new revision on top of the current state.
    fn snapshot(&mut self) -> Snapshot;
    /// Throw away everything written since `token` was taken.
    fn rollback(&mut self, token: Snapshot) -> Result<(), SnapshotError>;
    /// Keep everything written since `token` was taken, folding it into the
    /// enclosing revision.
    fn discard(&mut self, token: Snapshot) -> Result<(), SnapshotError>;
}

/// Execution environment. This captures the external information that is
/// required to run the interpreter.
#[derive(Clone, Debug)]
pub struct TxExecEnv {
    /// Chain ID.
    pub chain_id: U256,
    /// Block-related information.
    pub block: BlockInfo,
}

#[derive(Clone, Debug)]
pub struct BlockInfo {
    pub coinbase: Addr,
    pub timestamp: U256,
    pub number: U256,
    pub gas_limit: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecError {
    OutOfGas,
    CodeStoreOutOfGas,
    Depth,
    InsufficientBalance,
    ContractAddrCollision,
    Reverted,
    MaxCodeSizeExceeded,
    InvalidJump,
    ReturnDataOutOfBounds,
    GasIntOverflow,
    StackOverflow,
    StackUnderflow,
    OutOfMemory,
    InvalidOpcode,
}

impl ExecError {
    /// Whether a frame ending with this error forfeits its unused gas.
    ///
    /// An explicit revert hands the rest back, and so do the failures that
    /// stop a frame before it ran a single instruction.
    pub fn consumes_all_gas(&self) -> bool {
        !matches!(
            self,
            ExecError::Reverted |
                ExecError::Depth |
                ExecError::InsufficientBalance
        )
    }
}

#[inline(always)]
fn gas_checked_add(x: Gas, y: Gas) -> Result<Gas, ExecError> {
    x.checked_add(y).ok_or(ExecError::GasIntOverflow)
}

#[inline(always)]
fn gas_checked_mul(x: Gas, y: Gas) -> Result<Gas, ExecError> {
    x.checked_mul(y).ok_or(ExecError::GasIntOverflow)
}

/// Number of 32-byte words needed to hold `len` bytes.
#[inline(always)]
fn word_count(len: &U256) -> Result<Gas, ExecError> {
    let len = checked_as_u64(len).ok_or(ExecError::OutOfGas)?;
    Ok((len >> 5) + ((len & 31 != 0) as u64))
}

/// `len` bytes of `src` starting at `off`, right-padded with zeros.
fn get_data(src: &[u8], off: &U256, len: usize) -> Vec<u8> {
    let mut data = vec![0; len];
    if let Some(off) = checked_as_u64(off) {
        let off = (off as usize).min(src.len());
        let end = off.saturating_add(len).min(src.len());
        data[..end - off].copy_from_slice(&src[off..end]);
    }
    data
}

#[test]
fn test_get_data() {
    let src = hex::decode("00010203").unwrap();
    assert_eq!(get_data(&src, &0.into(), 4), src);
    assert_eq!(get_data(&src, &2.into(), 4), vec![2, 3, 0, 0]);
    assert_eq!(get_data(&src, &9.into(), 2), vec![0, 0]);
    assert_eq!(get_data(&src, &U256::MAX, 1), vec![0]);
}

#[test]
fn test_word_count() {
    assert_eq!(word_count(&0.into()).unwrap(), 0);
    assert_eq!(word_count(&1.into()).unwrap(), 1);
    assert_eq!(word_count(&64.into()).unwrap(), 2);
    assert!(word_count(&U256::MAX).is_err());
}
