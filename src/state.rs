//! In-memory world state with nested revisions.
//!
//! Writes go in place into the topmost revision as deltas. Taking a snapshot
//! stacks a fresh, empty revision on top; rolling back drops revisions and
//! discarding squashes them into the one below. A lookup walks the revisions
//! from the top and stops at the first recorded value, or at an account that
//! was created or deleted in that revision (nothing older is visible through
//! such an account).

use std::collections::hash_map::{self, HashMap};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use log::warn;
use once_cell::sync::OnceCell;

use crate::common::{Addr, Bytes, Hash, Wei, U256};
use crate::core::{
    Code, PlainCode, Snapshot, WorldState, WorldStateR, WorldStateW,
};
use crate::error::SnapshotError;

/// Shared code object of accounts without code.
pub fn empty_code() -> Arc<dyn Code> {
    static V: OnceCell<Arc<dyn Code>> = OnceCell::new();
    V.get_or_init(|| Arc::new(PlainCode::new(Vec::new().into())))
        .clone()
}

#[derive(Clone, Default)]
struct AccountDelta {
    /// The account was created or deleted here; older deltas are hidden.
    reset: bool,
    /// The account exists as of this delta.
    alive: bool,
    balance: Option<Wei>,
    nonce: Option<u64>,
    code: Option<Arc<dyn Code>>,
    storage: HashMap<Hash, U256>,
}

impl AccountDelta {
    /// Fold a newer delta of the same account into this one.
    fn absorb(&mut self, upper: AccountDelta) {
        if upper.reset {
            *self = upper;
            return
        }
        self.alive |= upper.alive;
        if upper.balance.is_some() {
            self.balance = upper.balance
        }
        if upper.nonce.is_some() {
            self.nonce = upper.nonce
        }
        if upper.code.is_some() {
            self.code = upper.code
        }
        self.storage.extend(upper.storage);
    }
}

type Deltas = HashMap<Addr, AccountDelta>;

fn fold(lower: &mut Deltas, upper: Deltas) {
    for (addr, delta) in upper {
        match lower.entry(addr) {
            hash_map::Entry::Occupied(mut e) => e.get_mut().absorb(delta),
            hash_map::Entry::Vacant(e) => {
                e.insert(delta);
            }
        }
    }
}

struct Revision {
    id: u64,
    accounts: Deltas,
}

/// Plain view of one account, as returned by [MemState::get].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub balance: Wei,
    pub nonce: u64,
    pub code: Bytes,
    /// non-zero slots only
    pub storage: BTreeMap<Hash, U256>,
}

/// Partial update applied by [MemState::create_or_update]; `None` fields are
/// left as they are.
#[derive(Clone, Debug, Default)]
pub struct AccountPatch {
    pub balance: Option<Wei>,
    pub nonce: Option<u64>,
    pub code: Option<Vec<u8>>,
    pub storage: Vec<(Hash, U256)>,
}

#[derive(Default)]
pub struct MemState {
    base: Deltas,
    revs: Vec<Revision>,
    next_id: u64,
}

impl MemState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding snapshots.
    pub fn depth(&self) -> usize {
        self.revs.len()
    }

    /// Layers from the newest revision down to the base.
    fn layers(&self) -> impl Iterator<Item = &Deltas> {
        self.revs
            .iter()
            .rev()
            .map(|r| &r.accounts)
            .chain(std::iter::once(&self.base))
    }

    fn lookup<T>(
        &self, addr: &Addr, f: impl Fn(&AccountDelta) -> Option<T>,
    ) -> Option<T> {
        for layer in self.layers() {
            if let Some(delta) = layer.get(addr) {
                if let Some(v) = f(delta) {
                    return Some(v)
                }
                if delta.reset {
                    return None
                }
            }
        }
        None
    }

    fn top_mut(&mut self) -> &mut Deltas {
        match self.revs.last_mut() {
            Some(r) => &mut r.accounts,
            None => &mut self.base,
        }
    }

    /// Delta of `addr` in the top revision, marked as existing.
    fn written(&mut self, addr: &Addr) -> &mut AccountDelta {
        let delta = self.top_mut().entry(addr.clone()).or_default();
        delta.alive = true;
        delta
    }

    fn check(&self, token: &Snapshot) -> Result<(), SnapshotError> {
        match self.revs.get(token.depth()) {
            Some(r) if r.id == token.id() => Ok(()),
            _ => {
                warn!("stale snapshot {:?} (depth {})", token, self.depth());
                Err(SnapshotError::Stale)
            }
        }
    }

    /// Full view of an existing account.
    pub fn get(&self, addr: &Addr) -> Option<Account> {
        if !self.exist(addr) {
            return None
        }
        let mut storage = BTreeMap::new();
        for layer in self.layers() {
            if let Some(delta) = layer.get(addr) {
                for (k, v) in delta.storage.iter() {
                    storage.entry(k.clone()).or_insert(*v);
                }
                if delta.reset {
                    break
                }
            }
        }
        storage.retain(|_, v: &mut U256| !v.is_zero());
        Some(Account {
            balance: self.get_balance(addr),
            nonce: self.get_nonce(addr),
            code: self.get_code(addr).as_bytes().into(),
            storage,
        })
    }

    /// Write the `Some` fields of `patch` to the account, bringing it into
    /// existence if needed.
    pub fn create_or_update(&mut self, addr: &Addr, patch: AccountPatch) {
        self.written(addr);
        if let Some(balance) = patch.balance {
            self.set_balance(addr, &balance)
        }
        if let Some(nonce) = patch.nonce {
            self.set_nonce(addr, nonce)
        }
        if let Some(code) = patch.code {
            self.set_code(addr, &code)
        }
        for (key, val) in patch.storage {
            self.set_state(addr, &key, &val)
        }
    }

    pub fn remove(&mut self, addr: &Addr) {
        self.delete_account(addr)
    }

    /// Addresses of all existing accounts, in order.
    pub fn accounts(&self) -> Vec<Addr> {
        let seen: HashSet<&Addr> =
            self.layers().flat_map(|layer| layer.keys()).collect();
        let mut accounts: Vec<Addr> = seen
            .into_iter()
            .filter(|addr| self.exist(addr))
            .cloned()
            .collect();
        accounts.sort();
        accounts
    }
}

impl WorldStateR for MemState {
    fn get_state(&self, account: &Addr, key: &Hash) -> U256 {
        self.lookup(account, |d| d.storage.get(key).copied())
            .unwrap_or_default()
    }

    fn get_balance(&self, account: &Addr) -> Wei {
        self.lookup(account, |d| d.balance.clone())
            .unwrap_or_else(|| Wei::zero().clone())
    }

    fn get_code(&self, account: &Addr) -> Arc<dyn Code> {
        self.lookup(account, |d| d.code.clone())
            .unwrap_or_else(empty_code)
    }

    fn get_nonce(&self, account: &Addr) -> u64 {
        self.lookup(account, |d| d.nonce).unwrap_or(0)
    }

    fn exist(&self, account: &Addr) -> bool {
        for layer in self.layers() {
            if let Some(delta) = layer.get(account) {
                if delta.alive {
                    return true
                }
                if delta.reset {
                    return false
                }
            }
        }
        false
    }
}

impl WorldStateW for MemState {
    fn set_state(&mut self, account: &Addr, key: &Hash, val: &U256) {
        self.written(account).storage.insert(key.clone(), *val);
    }

    fn set_balance(&mut self, account: &Addr, balance: &Wei) {
        self.written(account).balance = Some(balance.clone())
    }

    fn set_code(&mut self, account: &Addr, code: &[u8]) {
        self.written(account).code =
            Some(Arc::new(PlainCode::new(code.into())))
    }

    fn set_nonce(&mut self, account: &Addr, nonce: u64) {
        self.written(account).nonce = Some(nonce)
    }

    fn create_account(&mut self, addr: &Addr) {
        let balance = self.get_balance(addr);
        self.top_mut().insert(
            addr.clone(),
            AccountDelta {
                reset: true,
                alive: true,
                balance: Some(balance),
                ..Default::default()
            },
        );
    }

    fn delete_account(&mut self, addr: &Addr) {
        if self.revs.is_empty() {
            self.base.remove(addr);
            return
        }
        self.top_mut().insert(
            addr.clone(),
            AccountDelta {
                reset: true,
                ..Default::default()
            },
        );
    }
}

impl WorldState for MemState {
    fn snapshot(&mut self) -> Snapshot {
        let id = self.next_id;
        self.next_id += 1;
        self.revs.push(Revision {
            id,
            accounts: HashMap::new(),
        });
        Snapshot::new(self.revs.len() - 1, id)
    }

    fn rollback(&mut self, token: Snapshot) -> Result<(), SnapshotError> {
        self.check(&token)?;
        self.revs.truncate(token.depth());
        Ok(())
    }

    fn discard(&mut self, token: Snapshot) -> Result<(), SnapshotError> {
        self.check(&token)?;
        let depth = token.depth();
        let upper: Vec<Revision> = self.revs.drain(depth..).collect();
        let lower = match depth {
            0 => &mut self.base,
            d => &mut self.revs[d - 1].accounts,
        };
        for rev in upper {
            fold(lower, rev.accounts)
        }
        if depth == 0 {
            self.base.retain(|_, d| d.alive)
        }
        Ok(())
    }
}

#[test]
fn test_rollback_and_discard() {
    let mut s = MemState::new();
    let a = Addr::from_low_u64(1);
    let k: Hash = 5.into();
    s.set_state(&a, &k, &1.into());
    let t0 = s.snapshot();
    s.set_state(&a, &k, &2.into());
    let t1 = s.snapshot();
    s.set_state(&a, &k, &3.into());
    assert_eq!(s.get_state(&a, &k), 3.into());
    s.rollback(t1).unwrap();
    assert_eq!(s.get_state(&a, &k), 2.into());
    assert_eq!(s.rollback(t1), Err(SnapshotError::Stale));
    s.discard(t0).unwrap();
    assert_eq!(s.depth(), 0);
    assert_eq!(s.get_state(&a, &k), 2.into());
    assert_eq!(s.discard(t0), Err(SnapshotError::Stale));
}

#[test]
fn test_outer_rollback_invalidates_inner() {
    let mut s = MemState::new();
    let a = Addr::from_low_u64(1);
    let t0 = s.snapshot();
    s.set_balance(&a, &10u64.into());
    let t1 = s.snapshot();
    s.rollback(t0).unwrap();
    assert!(!s.exist(&a));
    assert_eq!(s.rollback(t1), Err(SnapshotError::Stale));
    // a new snapshot at the same depth does not revive the old token
    let t2 = s.snapshot();
    assert_eq!(t2.depth(), t0.depth());
    assert_eq!(s.rollback(t0), Err(SnapshotError::Stale));
    s.rollback(t2).unwrap();
}

#[test]
fn test_create_keeps_balance_only() {
    let mut s = MemState::new();
    let a = Addr::from_low_u64(7);
    s.create_or_update(
        &a,
        AccountPatch {
            balance: Some(5u64.into()),
            nonce: Some(3),
            code: Some(vec![0x00]),
            storage: vec![(1.into(), 9.into())],
        },
    );
    let t = s.snapshot();
    s.create_account(&a);
    let acc = s.get(&a).unwrap();
    assert_eq!(acc.balance, 5u64.into());
    assert_eq!(acc.nonce, 0);
    assert!(acc.code.is_empty());
    assert!(acc.storage.is_empty());
    s.rollback(t).unwrap();
    assert_eq!(s.get(&a).unwrap().storage.len(), 1);
}

#[test]
fn test_delete_then_write() {
    let mut s = MemState::new();
    let a = Addr::from_low_u64(2);
    s.set_state(&a, &1.into(), &1.into());
    s.set_nonce(&a, 4);
    let t = s.snapshot();
    s.delete_account(&a);
    assert!(!s.exist(&a));
    assert_eq!(s.get(&a), None);
    s.set_state(&a, &2.into(), &2.into());
    assert!(s.exist(&a));
    assert_eq!(s.get_state(&a, &1.into()), U256::zero());
    assert_eq!(s.get_nonce(&a), 0);
    s.discard(t).unwrap();
    assert_eq!(s.get_state(&a, &1.into()), U256::zero());
    assert_eq!(s.get_state(&a, &2.into()), 2.into());
    s.remove(&a);
    assert!(s.accounts().is_empty());
}
