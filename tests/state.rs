use qledger::common::*;
use qledger::core::{Snapshot, WorldState, WorldStateR, WorldStateW};
use qledger::error::SnapshotError;
use qledger::state::*;
use qledger_tools::dummy::DummyStateStore;

#[test]
fn test_special_cases() {
    // base: addr0(0 => 1)
    //   [r1: addr0(1 => 2)]
    //     [r2: addr0(0 => 3), addr1(0 => 2)]
    let mut s = MemState::new();
    let addr0 = Addr::zero();
    let u0: U256 = 0.into();
    let u1: U256 = 1.into();
    let u2: U256 = 2.into();
    let u3: U256 = 3.into();
    let addr1: Addr = u1.into();

    s.set_state(addr0, &u0.into(), &u1);
    let r1 = s.snapshot();
    s.set_state(addr0, &u1.into(), &u2);
    let r2 = s.snapshot();
    s.set_state(addr0, &u0.into(), &u3);
    s.set_state(&addr1, &u0.into(), &u2);
    assert_eq!(s.depth(), 2);

    assert_eq!(s.get_state(addr0, &u0.into()), u3);
    assert_eq!(s.get_state(addr0, &u1.into()), u2);
    assert_eq!(s.get_state(&addr1, &u0.into()), u2);

    s.rollback(r2).unwrap();
    assert_eq!(s.get_state(addr0, &u0.into()), u1);
    assert_eq!(s.get_state(addr0, &u1.into()), u2);
    assert!(!s.exist(&addr1));

    // fork again from r1
    let r3 = s.snapshot();
    s.set_state(addr0, &u2.into(), &u3);
    assert_eq!(s.rollback(r2), Err(SnapshotError::Stale));
    s.discard(r3).unwrap();
    assert_eq!(s.depth(), 1);
    assert_eq!(s.get_state(addr0, &u2.into()), u3);

    s.discard(r1).unwrap();
    assert_eq!(s.depth(), 0);
    assert_eq!(s.get_state(addr0, &u0.into()), u1);
    assert_eq!(s.get_state(addr0, &u1.into()), u2);
    assert_eq!(s.get_state(addr0, &u2.into()), u3);
    assert_eq!(s.discard(r3), Err(SnapshotError::Stale));
    assert_eq!(s.accounts(), vec![addr0.clone()]);
}

#[test]
fn test_deleted_accounts() {
    // base: addr0(0 => 1), addr1(0 => 2)
    //   [r1: delete addr1]
    //     [r2: addr1(2 => 1)]
    let mut s = MemState::new();
    let addr0 = Addr::zero();
    let u0: U256 = 0.into();
    let u1: U256 = 1.into();
    let u2: U256 = 2.into();
    let addr1: Addr = u1.into();

    s.set_state(addr0, &u0.into(), &u1);
    s.set_state(&addr1, &u0.into(), &u2);
    s.set_balance(&addr1, &Wei::from(7u64));
    let r1 = s.snapshot();
    s.delete_account(&addr1);
    assert!(!s.exist(&addr1));
    assert!(s.get_balance(&addr1).is_zero());
    assert!(s.get(&addr1).is_none());

    let r2 = s.snapshot();
    s.set_state(&addr1, &u2.into(), &u1);
    assert!(s.exist(&addr1));
    // nothing below the deletion shows through
    assert_eq!(s.get_state(&addr1, &u0.into()), u0);
    assert_eq!(s.get_state(&addr1, &u2.into()), u1);
    assert_eq!(s.get_state(addr0, &u0.into()), u1);

    let token = s.snapshot();
    s.rollback(token).unwrap();
    s.discard(r2).unwrap();
    assert_eq!(s.get_state(&addr1, &u0.into()), u0);
    assert_eq!(s.get_state(&addr1, &u2.into()), u1);

    s.rollback(r1).unwrap();
    assert_eq!(s.get_state(&addr1, &u0.into()), u2);
    assert_eq!(s.get_balance(&addr1), Wei::from(7u64));

    let r3 = s.snapshot();
    s.delete_account(&addr1);
    s.discard(r3).unwrap();
    assert!(!s.exist(&addr1));
    assert_eq!(s.accounts(), vec![addr0.clone()]);
}

#[test]
fn test_create_or_update() {
    let mut s = MemState::new();
    let addr = Addr::from_low_u64(42);
    s.create_or_update(
        &addr,
        AccountPatch {
            balance: Some(Wei::from(5u64)),
            nonce: Some(3),
            code: Some(vec![0x60, 0x00]),
            storage: vec![(1u64.into(), 9.into()), (2u64.into(), 0.into())],
        },
    );
    let acc = s.get(&addr).unwrap();
    assert_eq!(acc.balance, Wei::from(5u64));
    assert_eq!(acc.nonce, 3);
    assert_eq!(acc.code, Bytes::from(vec![0x60, 0x00]));
    assert_eq!(acc.storage.len(), 1);

    s.create_or_update(
        &addr,
        AccountPatch {
            nonce: Some(4),
            ..Default::default()
        },
    );
    let updated = s.get(&addr).unwrap();
    assert_eq!(updated.nonce, 4);
    assert_eq!(updated.balance, acc.balance);

    s.remove(&addr);
    assert!(s.get(&addr).is_none());
}

fn check_same(s: &MemState, s0: &DummyStateStore) -> bool {
    let mut expected: Vec<Addr> = s0.accounts().cloned().collect();
    expected.sort();
    if s.accounts() != expected {
        return false
    }
    for acc in s0.accounts() {
        if s0.get_balance(acc) != s.get_balance(acc) ||
            s0.get_nonce(acc) != s.get_nonce(acc) ||
            s0.get_code(acc).as_bytes() != s.get_code(acc).as_bytes()
        {
            return false
        }
        for key in s0.account_keys(acc).unwrap() {
            if s0.get_state(acc, key) != s.get_state(acc, key) {
                return false
            }
        }
    }
    true
}

#[test]
fn test_random_cross_validate() {
    use rand::{Rng, SeedableRng};
    use sha3::Digest;
    let _ = env_logger::builder().is_test(true).try_init();
    let addr_range = 10;
    let key_range = 100;
    let total_iter = 20000;
    let max_change = 10;
    let mut rng = rand::rngs::StdRng::from_seed([0; 32]);
    let mut next_val: U256 = 1.into();
    let mut next_balance: U256 = 1.into();
    let mut next_nonce = 1;
    let mut next_code = 0u64;
    let mut s = MemState::new();
    let mut s0 = DummyStateStore::new();
    let mut tokens: Vec<(Snapshot, Snapshot)> = Vec::new();
    let mut ended: Vec<(Snapshot, Snapshot)> = Vec::new();
    let mut max_depth = 0;
    for _ in 0..total_iter {
        for _ in 0..rng.gen_range(0..max_change) {
            let addr: Addr = U256::from(rng.gen_range(0..addr_range)).into();
            match rng.gen_range(0.0..1.0) {
                r if r > 0.6 => {
                    let key: Hash =
                        U256::from(rng.gen_range(0..key_range)).into();
                    s.set_state(&addr, &key, &next_val);
                    s0.set_state(&addr, &key, &next_val);
                    next_val += 1.into();
                }
                r if r > 0.4 => {
                    let nb = next_balance.into();
                    s.set_balance(&addr, &nb);
                    s0.set_balance(&addr, &nb);
                    next_balance += 1.into();
                }
                r if r > 0.25 => {
                    s.set_nonce(&addr, next_nonce);
                    s0.set_nonce(&addr, next_nonce);
                    next_nonce += 1;
                }
                r if r > 0.1 => {
                    let d = sha3::Keccak256::digest(next_code.to_le_bytes());
                    s.set_code(&addr, d.as_slice());
                    s0.set_code(&addr, d.as_slice());
                    next_code += 1;
                }
                r if r > 0.05 => {
                    s.create_account(&addr);
                    s0.create_account(&addr);
                }
                _ => {
                    s.delete_account(&addr);
                    s0.delete_account(&addr);
                }
            }
        }
        match rng.gen_range(0.0..1.0) {
            r if r > 0.5 => tokens.push((s.snapshot(), s0.snapshot())),
            r if r > 0.3 && !tokens.is_empty() => {
                let i = rng.gen_range(0..tokens.len());
                let (t, t0) = tokens[i];
                s.rollback(t).unwrap();
                s0.rollback(t0).unwrap();
                ended.extend(tokens.drain(i..));
            }
            r if r > 0.1 && !tokens.is_empty() => {
                let i = rng.gen_range(0..tokens.len());
                let (t, t0) = tokens[i];
                s.discard(t).unwrap();
                s0.discard(t0).unwrap();
                ended.extend(tokens.drain(i..));
            }
            _ if !ended.is_empty() => {
                let (t, t0) = ended[rng.gen_range(0..ended.len())];
                assert_eq!(s.rollback(t), Err(SnapshotError::Stale));
                assert_eq!(s0.rollback(t0), Err(SnapshotError::Stale));
            }
            _ => (),
        }
        assert_eq!(s.depth(), tokens.len());
        max_depth = max_depth.max(s.depth());
        assert!(check_same(&s, &s0));
    }
    for (t, t0) in tokens.drain(..).rev() {
        s.discard(t).unwrap();
        s0.discard(t0).unwrap();
    }
    assert_eq!(s.depth(), 0);
    assert!(check_same(&s, &s0));
    println!("max. depth = {}", max_depth);
}
