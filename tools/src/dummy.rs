use std::collections::hash_map::HashMap;
use std::sync::Arc;

use log::info;

use qledger::common::{Addr, Hash, Wei, U256};
use qledger::core::{Code, PlainCode, Snapshot, WorldStateR};
use qledger::error::SnapshotError;

#[derive(Clone)]
struct DummyAccountState {
    state: HashMap<Hash, U256>,
    balance: Wei,
    nonce: u64,
    code: Arc<dyn Code>,
}

impl Default for DummyAccountState {
    fn default() -> Self {
        Self {
            state: HashMap::new(),
            balance: Wei::zero().clone(),
            nonce: 0,
            code: qledger::state::empty_code(),
        }
    }
}

/// Reference world state that snapshots by copying everything. Slow, but
/// obviously correct, which makes it useful to check [qledger::state::MemState]
/// against.
#[derive(Clone, Default)]
pub struct DummyStateStore {
    accounts: HashMap<Addr, DummyAccountState>,
    saved: Vec<(u64, HashMap<Addr, DummyAccountState>)>,
    next_id: u64,
}

impl DummyStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_account(&mut self, contract: &Addr) -> &mut DummyAccountState {
        self.accounts
            .entry(contract.clone())
            .or_insert_with(DummyAccountState::default)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Addr> {
        self.accounts.keys()
    }

    pub fn account_keys(
        &self, contract: &Addr,
    ) -> Option<impl Iterator<Item = &Hash>> {
        self.accounts.get(contract).map(|acc| acc.state.keys())
    }

    fn check(&self, token: &Snapshot) -> Result<(), SnapshotError> {
        match self.saved.get(token.depth()) {
            Some((id, _)) if *id == token.id() => Ok(()),
            _ => Err(SnapshotError::Stale),
        }
    }
}

impl qledger::core::WorldStateR for DummyStateStore {
    fn get_state(&self, contract: &Addr, key: &Hash) -> U256 {
        info!("get_state({}, {})", contract, key);
        self.accounts
            .get(contract)
            .and_then(|acc| acc.state.get(key))
            .copied()
            .unwrap_or_else(U256::zero)
    }
    fn get_balance(&self, account: &Addr) -> Wei {
        info!("get_balance({})", account);
        self.accounts
            .get(account)
            .map(|acc| acc.balance.clone())
            .unwrap_or_else(|| Wei::zero().clone())
    }
    fn get_code(&self, contract: &Addr) -> Arc<dyn Code> {
        info!("get_code({})", contract);
        self.accounts
            .get(contract)
            .map(|acc| acc.code.clone())
            .unwrap_or_else(qledger::state::empty_code)
    }
    fn get_nonce(&self, contract: &Addr) -> u64 {
        info!("get_nonce({})", contract);
        self.accounts
            .get(contract)
            .map(|acc| acc.nonce)
            .unwrap_or(0)
    }
    fn exist(&self, contract: &Addr) -> bool {
        info!("exist({})", contract);
        self.accounts.contains_key(contract)
    }
}

impl qledger::core::WorldStateW for DummyStateStore {
    fn set_state(&mut self, contract: &Addr, key: &Hash, val: &U256) {
        info!("set_state({}, {}, {})", contract, key, val);
        self.get_account(contract).state.insert(key.clone(), *val);
    }
    fn set_balance(&mut self, contract: &Addr, balance: &Wei) {
        info!("set_balance({}, {})", contract, balance);
        self.get_account(contract).balance = balance.clone()
    }
    fn set_code(&mut self, contract: &Addr, code: &[u8]) {
        info!("set_code({}, {})", contract, hex::encode(code));
        self.get_account(contract).code = Arc::new(PlainCode::new(code.into()));
    }
    fn set_nonce(&mut self, contract: &Addr, nonce: u64) {
        info!("set_nonce({}, {})", contract, nonce);
        self.get_account(contract).nonce = nonce
    }
    fn create_account(&mut self, addr: &Addr) {
        info!("create_account({})", addr);
        let balance = self.get_balance(addr);
        self.accounts.insert(
            addr.clone(),
            DummyAccountState {
                balance,
                ..Default::default()
            },
        );
    }
    fn delete_account(&mut self, addr: &Addr) {
        info!("delete_account({})", addr);
        self.accounts.remove(addr);
    }
}

impl qledger::core::WorldState for DummyStateStore {
    fn snapshot(&mut self) -> Snapshot {
        info!("snapshot()");
        let id = self.next_id;
        self.next_id += 1;
        self.saved.push((id, self.accounts.clone()));
        Snapshot::new(self.saved.len() - 1, id)
    }
    fn rollback(&mut self, token: Snapshot) -> Result<(), SnapshotError> {
        info!("rollback({:?})", token);
        self.check(&token)?;
        let mut saved = self.saved.drain(token.depth()..);
        if let Some((_, accounts)) = saved.next() {
            self.accounts = accounts
        }
        Ok(())
    }
    fn discard(&mut self, token: Snapshot) -> Result<(), SnapshotError> {
        info!("discard({:?})", token);
        self.check(&token)?;
        self.saved.truncate(token.depth());
        Ok(())
    }
}
