use qledger::abi::{encode_call, parse_args, Arg};
use qledger::common::{create_addr, Addr, Bytes, Hash, Wei, U256};
use qledger::core::{ExecError, Message, Status};
use qledger::error::{Error, SnapshotError};
use qledger::ledger::{Compiler, Ledger};
use qledger_tools::asm::Assembler;

const XOR: &str = "
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @xor JUMPI
    0 DUP1 REVERT
xor:
    1 CALLDATALOAD 33 CALLDATALOAD XOR
    0 MSTORE 32 0 RETURN
";

const NAMECOIN: &str = "
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @register JUMPI
    0 DUP1 REVERT
register:                   ; (name, value)
    1 CALLDATALOAD DUP1 SLOAD @taken JUMPI
    33 CALLDATALOAD SWAP1 SSTORE
    1 0 MSTORE 32 0 RETURN
taken:
    0 0 MSTORE 32 0 RETURN
";

const CURRENCY: &str = "
    1000 CALLER SSTORE
.runtime
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @query JUMPI
    DUP1 1 EQ @send JUMPI
    0 DUP1 REVERT
query:                      ; (addr)
    1 CALLDATALOAD SLOAD 0 MSTORE 32 0 RETURN
send:                       ; (to: 160 bits, value: 32 bits)
    1 CALLDATALOAD 96 SHR
    21 CALLDATALOAD 224 SHR
    CALLER SLOAD
    DUP2 DUP2 LT @fail JUMPI
    DUP2 SWAP1 SUB CALLER SSTORE
    DUP1 DUP3 SLOAD ADD DUP3 SSTORE
    SWAP1 CALLER 0 0 LOG3
    1 0 MSTORE 32 0 RETURN
fail:
    0 0 MSTORE 32 0 RETURN
";

const DATAFEED: &str = "
    CALLER 1000 SSTORE
.runtime
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @set JUMPI
    DUP1 1 EQ @get JUMPI
    0 DUP1 REVERT
set:                        ; (key, value), owner only
    1000 SLOAD CALLER EQ ISZERO @deny JUMPI
    33 CALLDATALOAD 1 CALLDATALOAD SSTORE
    1 0 MSTORE 32 0 RETURN
deny:
    0 0 MSTORE 32 0 RETURN
get:                        ; (key)
    1 CALLDATALOAD SLOAD 0 MSTORE 32 0 RETURN
";

// Storage: 1000 first party, 1001 second party, 1002 stake, 1003 feed,
// 1004 feed key, 1005 hedged value, 1006 deadline.
const HEDGE: &str = "
    1000 SLOAD @registered JUMPI
    CALLER 1000 SSTORE
    CALLVALUE 1002 SSTORE
    1 CALLDATALOAD 1003 SSTORE
    33 CALLDATALOAD 1004 SSTORE
    1 0 MSTORE 32 0 RETURN
registered:
    1001 SLOAD @matched JUMPI
    1002 SLOAD
    DUP1 CALLVALUE LT @short JUMPI
    CALLER 1001 SSTORE
short:
    @priced1 @price JUMP
priced1:
    MUL DUP1 1005 SSTORE
    500 TIMESTAMP ADD 1006 SSTORE
    2 0 MSTORE 32 MSTORE 64 0 RETURN
matched:
    @priced2 @price JUMP
priced2:
    1005 SLOAD DIV
    SELFBALANCE DUP2 LT @holding JUMPI
    0 0 0 0 SELFBALANCE 1000 SLOAD GAS CALL POP
    3 0 MSTORE 32 0 RETURN
holding:
    1006 SLOAD TIMESTAMP GT @expired JUMPI
    5 0 MSTORE 32 0 RETURN
expired:
    0 0 0 0 DUP5 SELFBALANCE SUB 1001 SLOAD GAS CALL POP
    0 0 0 0 DUP5 1000 SLOAD GAS CALL POP
    4 0 MSTORE 32 0 RETURN
price:                      ; [ret] -> [price]
    1 0 MSTORE8 1004 SLOAD 1 MSTORE
    32 64 33 0 0 1003 SLOAD GAS CALL POP
    64 MLOAD SWAP1 JUMP
";

const MUL2: &str = "
.runtime
    1 CALLDATALOAD 232 SHR 2 MUL 0 MSTORE 32 0 RETURN
";

const ADD1: &str = "
.runtime
    1 SLOAD 1 CALLDATALOAD ADD 1 SSTORE STOP
";

const LIFO: &str = "
    10 0 SSTORE
.runtime
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @inc JUMPI
    DUP1 1 EQ @scale JUMPI
    DUP1 2 EQ @get JUMPI
    0 DUP1 REVERT
inc:
    0 SLOAD 1 ADD 0 SSTORE STOP
scale:
    0 SLOAD 10 MUL 0 SSTORE
    0 0 1 0 0 ADDRESS GAS CALL POP
    0 SLOAD 10 MUL 0 SSTORE STOP
get:
    0 SLOAD 0 MSTORE 32 0 RETURN
";

const SUICIDER: &str = "
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @mainloop JUMPI
    DUP1 1 EQ @entry JUMPI
    DUP1 2 EQ @pingten JUMPI
    DUP1 3 EQ @suicide JUMPI
    DUP1 4 EQ @ping15 JUMPI
    0 DUP1 REVERT
mainloop:                   ; (rounds)
    40 15 SSTORE
    3 0 MSTORE8
    0 0 1 0 0 ADDRESS GAS CALL POP
    0
loop:
    DUP1 1 CALLDATALOAD GT ISZERO @done JUMPI
    1 ADD @loop JUMP
done:
    STOP
entry:                      ; (rounds)
    20 15 SSTORE
    1 CALLDATALOAD 1 MSTORE
    0 0 33 0 0 ADDRESS GAS CALL POP
    STOP
pingten:
    10 0 MSTORE 32 0 RETURN
suicide:
    0 SELFDESTRUCT
ping15:
    15 SLOAD 0 MSTORE 32 0 RETURN
";

const REVERTER: &str = "
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @entry JUMPI
    DUP1 1 EQ @flat JUMPI
    DUP1 2 EQ @recurse JUMPI
    0 DUP1 REVERT
entry:
    1 0 MSTORE8
    0 0 1 0 0 ADDRESS 100000 CALL POP
    2 0 MSTORE8
    0 0 1 0 0 ADDRESS 100000 CALL POP
    STOP
flat:
    0 0 0 0 9 7 0 CALL POP
    4040 8080 SSTORE
    2020 160160 SSTORE
    STOP
recurse:
    0 0 0 0 9 8 0 CALL POP
    4039 8081 SSTORE
    2019 160161 SSTORE
    2 0 MSTORE8
    0 0 1 0 0 ADDRESS GAS CALL POP
    0 0x77 SSTORE
    STOP
";

const ARRAYS: &str = "
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @one JUMPI
    DUP1 1 EQ @three JUMPI
    0 DUP1 REVERT
one:
    1 32 MSTORE 32 32 RETURN
three:
    96 0 RETURN
";

const DIGITS: &str = "
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @main JUMPI
    DUP1 1 EQ @words JUMPI
    DUP1 2 EQ @narrow JUMPI
    DUP1 3 EQ @words JUMPI
    DUP1 4 EQ @get JUMPI
    0 DUP1 REVERT
main:                       ; three self-calls, one per setter
    1 0 MSTORE8
    1 1 MSTORE 2 33 MSTORE 3 65 MSTORE 4 97 MSTORE 5 129 MSTORE
    0 0 161 0 0 ADDRESS GAS CALL POP
    2 200 MSTORE8
    2 202 MSTORE8 3 205 MSTORE8 4 209 MSTORE8 5 241 MSTORE8 6 244 MSTORE8
    0 0 45 200 0 ADDRESS GAS CALL POP
    3 300 MSTORE8
    3 301 MSTORE 4 333 MSTORE 5 365 MSTORE 6 397 MSTORE 7 429 MSTORE
    0 0 161 300 0 ADDRESS GAS CALL POP
    STOP
words:                      ; five words into slot funid
    1 CALLDATALOAD 10 MUL 33 CALLDATALOAD ADD
    10 MUL 65 CALLDATALOAD ADD
    10 MUL 97 CALLDATALOAD ADD
    10 MUL 129 CALLDATALOAD ADD
    SWAP1 SSTORE STOP
narrow:                     ; 11, 19, 32, 256 and 20 bits into slot 2
    1 CALLDATALOAD 240 SHR
    10 MUL 3 CALLDATALOAD 232 SHR ADD
    10 MUL 6 CALLDATALOAD 224 SHR ADD
    10 MUL 10 CALLDATALOAD ADD
    10 MUL 42 CALLDATALOAD 232 SHR ADD
    SWAP1 SSTORE STOP
get:                        ; (slot)
    1 CALLDATALOAD SLOAD 0 MSTORE 32 0 RETURN
";

const BLOCK: &str = "
    NUMBER 0 MSTORE TIMESTAMP 32 MSTORE COINBASE 64 MSTORE
    96 0 RETURN
";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn key(i: u64) -> Addr {
    Addr::from_low_u64(0xa11ce000 + i)
}

fn words(ws: &[u64]) -> Vec<U256> {
    ws.iter().map(|w| U256::from(*w)).collect()
}

fn deploy(ledger: &Ledger, src: &str, sender: &Addr) -> Addr {
    ledger
        .contract(&Assembler, src, sender, Wei::zero().clone())
        .unwrap()
}

fn call(
    ledger: &Ledger, sender: &Addr, to: &Addr, funid: u8, args: &[Arg],
) -> Vec<U256> {
    let r = ledger
        .call(sender, to, Wei::zero().clone(), funid, args)
        .unwrap();
    assert!(r.succeeded(), "{:?}", r);
    r.words()
}

/// Runtime code that creates a contract from `init` and leaves its address
/// on the stack. `init` must fit a single word.
fn create_prologue(init: &[u8]) -> String {
    assert!(init.len() <= 32);
    format!(
        "0x{} 64 MSTORE {} {} 0 CREATE",
        hex::encode(init),
        init.len(),
        96 - init.len()
    )
}

#[test]
fn test_xor() {
    let ledger = Ledger::default();
    let c = deploy(&ledger, XOR, &key(0));
    let args: [Arg; 2] = [2u64.into(), 5u64.into()];
    assert_eq!(call(&ledger, &key(0), &c, 0, &args), words(&[7]));
    assert_eq!(
        call(&ledger, &key(0), &c, 0, &[0xff00u64.into(), 0x0ff0u64.into()]),
        words(&[0xf0f0])
    );
    // unknown function
    let r = ledger
        .call(&key(0), &c, Wei::zero().clone(), 9, &[])
        .unwrap();
    assert_eq!(r.status, Status::Revert);
    assert_eq!(r.error, Some(ExecError::Reverted));
}

#[test]
fn test_namecoin() {
    let ledger = Ledger::default();
    let c = deploy(&ledger, NAMECOIN, &key(0));
    let register = |name: &str, value: &str| {
        let args = parse_args(&[name, value]).unwrap();
        call(&ledger, &key(0), &c, 0, &args)
    };
    assert_eq!(register("\"george\"", "45"), words(&[1]));
    assert_eq!(register("\"george\"", "20"), words(&[0]));
    assert_eq!(register("\"harry\"", "60"), words(&[1]));
    let mut george = [0u8; 32];
    george[..6].copy_from_slice(b"george");
    assert_eq!(ledger.storage(&c, &Hash::from_slice(&george)), U256::from(45));
}

#[test]
fn test_currency() {
    let ledger = Ledger::default();
    let c = deploy(&ledger, CURRENCY, &key(0));
    let send = |to: &Addr, value: u64| {
        let args = [
            Arg::Narrow {
                value: to.clone().into(),
                bits: 160,
            },
            Arg::Narrow {
                value: value.into(),
                bits: 32,
            },
        ];
        ledger
            .call(&key(0), &c, Wei::zero().clone(), 1, &args)
            .unwrap()
    };
    let r = send(&key(2), 200);
    assert_eq!(r.words(), words(&[1]));
    assert_eq!(r.logs.len(), 1);
    assert_eq!(r.logs[0].address, c);
    assert_eq!(
        r.logs[0].topics,
        vec![Hash::from(&key(0)), Hash::from(&key(2)), Hash::from(200u64)]
    );
    assert!(r.logs[0].data.is_empty());
    let r = send(&key(2), 900);
    assert_eq!(r.words(), words(&[0]));
    assert!(r.logs.is_empty());
    let query = |who: &Addr| call(&ledger, &key(0), &c, 0, &[who.into()]);
    assert_eq!(query(&key(0)), words(&[800]));
    assert_eq!(query(&key(2)), words(&[200]));
    assert_eq!(ledger.storage(&c, &Hash::from(&key(2))), U256::from(200));
}

#[test]
fn test_datafeed() {
    let ledger = Ledger::default();
    let c = deploy(&ledger, DATAFEED, &key(0));
    assert_eq!(call(&ledger, &key(0), &c, 1, &[500u64.into()]), words(&[0]));
    assert_eq!(
        call(&ledger, &key(0), &c, 0, &[500u64.into(), 19u64.into()]),
        words(&[1])
    );
    assert_eq!(call(&ledger, &key(0), &c, 1, &[500u64.into()]), words(&[19]));
    assert_eq!(
        call(&ledger, &key(1), &c, 0, &[500u64.into(), 726u64.into()]),
        words(&[0])
    );
    assert_eq!(call(&ledger, &key(0), &c, 1, &[500u64.into()]), words(&[19]));
    assert_eq!(
        call(&ledger, &key(0), &c, 0, &[500u64.into(), 726u64.into()]),
        words(&[1])
    );
    assert_eq!(call(&ledger, &key(1), &c, 1, &[500u64.into()]), words(&[726]));
}

fn set_price(ledger: &Ledger, feed: &Addr, price: u64) -> Vec<U256> {
    call(ledger, &key(0), feed, 0, &[500u64.into(), price.into()])
}

fn join_hedge(
    ledger: &Ledger, hedge: &Addr, feed: &Addr, sender: &Addr, value: &Wei,
) -> Vec<U256> {
    let args: [Arg; 2] = [feed.into(), 500u64.into()];
    let r = ledger.call(sender, hedge, value.clone(), 0, &args).unwrap();
    assert!(r.succeeded(), "{:?}", r);
    r.words()
}

#[test]
fn test_hedge() {
    init_logger();
    let ledger = Ledger::default();
    let stake = Wei::from(10_000_000_000_000_000u64);
    let none = Wei::zero();
    ledger.fund(&key(0), &Wei::from(1_000_000_000_000_000_000u64));
    ledger.fund(&key(2), &Wei::from(1_000_000_000_000_000_000u64));
    let feed = deploy(&ledger, DATAFEED, &key(0));
    assert_eq!(set_price(&ledger, &feed, 726), words(&[1]));
    let hedge = deploy(&ledger, HEDGE, &key(0));
    let join = |ledger: &Ledger, sender: &Addr, value: &Wei| {
        join_hedge(ledger, &hedge, &feed, sender, value)
    };
    assert_eq!(join(&ledger, &key(0), &stake), words(&[1]));
    assert_eq!(
        join(&ledger, &key(2), &stake),
        words(&[2, 7_260_000_000_000_000_000])
    );
    assert_eq!(ledger.balance(&hedge), Wei::from(20_000_000_000_000_000u64));

    // the price drops below the stake: the first party takes everything
    let token = ledger.snapshot();
    assert_eq!(set_price(&ledger, &feed, 300), words(&[1]));
    assert_eq!(join(&ledger, &key(0), none), words(&[3]));
    assert!(ledger.balance(&hedge).is_zero());
    ledger.revert(token).unwrap();

    assert_eq!(ledger.balance(&hedge), Wei::from(20_000_000_000_000_000u64));
    assert_eq!(join(&ledger, &key(0), none), words(&[5]));
    let before = ledger.balance(&key(2));
    ledger.mine(100, &key(3));
    assert_eq!(join(&ledger, &key(0), none), words(&[4]));
    assert!(ledger.balance(&hedge).is_zero());
    assert_eq!(
        ledger.balance(&key(2)),
        before.checked_add(&stake).unwrap()
    );
}

#[test]
fn test_create_from_contract() {
    let ledger = Ledger::default();
    let init = Assembler.compile(MUL2).unwrap();
    let src = format!(
        "{}
        5 103 MSTORE8
        32 0 4 100 0 DUP6 GAS CALL POP
        32 0 RETURN",
        create_prologue(&init)
    );
    let c = deploy(&ledger, &src, &key(0));
    let r = ledger.send(&key(0), &c, Wei::zero().clone(), Bytes::empty());
    assert!(r.succeeded(), "{:?}", r);
    assert_eq!(r.words(), words(&[10]));
    let child = create_addr(&c, 1);
    assert!(!ledger.code(&child).is_empty());
    assert_eq!(ledger.nonce(&c), 2);
}

#[test]
fn test_nested_call_order() {
    let ledger = Ledger::default();
    let c = deploy(&ledger, LIFO, &key(0));
    assert_eq!(call(&ledger, &key(0), &c, 1, &[]), Vec::<U256>::new());
    assert_eq!(call(&ledger, &key(0), &c, 2, &[]), words(&[1010]));
}

#[test]
fn test_self_destruct() {
    init_logger();
    let ledger = Ledger::default();
    let c = deploy(&ledger, SUICIDER, &key(0));
    call(&ledger, &key(0), &c, 0, &[1u64.into()]);
    assert!(!ledger.exists(&c));
    assert!(ledger.code(&c).is_empty());

    // the destroying frame runs out of gas, so the account survives
    let c = deploy(&ledger, SUICIDER, &key(0));
    call(&ledger, &key(0), &c, 1, &[1_000_000_000u64.into()]);
    assert!(ledger.exists(&c));
    assert_eq!(call(&ledger, &key(0), &c, 2, &[]), words(&[10]));
    assert_eq!(call(&ledger, &key(0), &c, 4, &[]), words(&[20]));
}

#[test]
fn test_out_of_gas_child_reverts() {
    init_logger();
    let ledger = Ledger::default();
    ledger.fund(&key(0), &Wei::from(1_000_000_000_000_000u64));
    let c = ledger
        .contract(
            &Assembler,
            REVERTER,
            &key(0),
            Wei::from(1_000_000_000_000_000u64),
        )
        .unwrap();
    call(&ledger, &key(0), &c, 0, &[]);
    assert_eq!(ledger.storage(&c, &8080u64.into()), U256::from(4040));
    assert_eq!(ledger.storage(&c, &160160u64.into()), U256::from(2020));
    assert_eq!(ledger.balance(&Addr::from_low_u64(7)), Wei::from(9u64));
    assert_eq!(ledger.storage(&c, &8081u64.into()), U256::from(0));
    assert_eq!(ledger.storage(&c, &160161u64.into()), U256::from(0));
    assert!(ledger.balance(&Addr::from_low_u64(8)).is_zero());
    assert!(!ledger.exists(&Addr::from_low_u64(8)));
}

#[test]
fn test_callcode_runs_in_caller_storage() {
    let ledger = Ledger::default();
    let init = Assembler.compile(ADD1).unwrap();
    let src = format!(
        "{}
        6 1 MSTORE
        0 0 33 0 0 DUP6 GAS CALL POP
        4 1 MSTORE
        0 0 33 0 0 DUP6 GAS CALLCODE POP
        60 1 MSTORE
        0 0 33 0 0 DUP6 GAS CALLCODE POP
        40 1 MSTORE
        0 0 33 0 0 DUP6 GAS CALL POP
        1 SLOAD 0 MSTORE 32 0 RETURN",
        create_prologue(&init)
    );
    let c = deploy(&ledger, &src, &key(0));
    let r = ledger.send(&key(0), &c, Wei::zero().clone(), Bytes::empty());
    assert_eq!(r.words(), words(&[64]));
    let child = create_addr(&c, 1);
    assert_eq!(ledger.storage(&child, &1u64.into()), U256::from(46));
}

#[test]
fn test_return_arrays() {
    let ledger = Ledger::default();
    let c = deploy(&ledger, ARRAYS, &key(0));
    assert_eq!(call(&ledger, &key(0), &c, 0, &[]), words(&[1]));
    assert_eq!(call(&ledger, &key(0), &c, 1, &[]), words(&[0, 0, 0]));
}

#[test]
fn test_argument_widths() {
    init_logger();
    let ledger = Ledger::default();
    let c = deploy(&ledger, DIGITS, &key(0));
    let get = |slot: u64| call(&ledger, &key(0), &c, 4, &[slot.into()]);
    assert!(call(&ledger, &key(0), &c, 0, &[]).is_empty());
    assert_eq!(get(1), words(&[12345]));
    assert_eq!(get(2), words(&[23456]));
    assert_eq!(get(3), words(&[34567]));

    let args: Vec<Arg> = [4u64, 5, 6, 7, 8].iter().map(|&v| v.into()).collect();
    assert!(call(&ledger, &key(0), &c, 1, &args).is_empty());
    assert_eq!(get(1), words(&[45678]));
    assert_eq!(ledger.storage(&c, &1u64.into()), U256::from(45678));

    let args = parse_args(&["5:11", "6:19", "7:32", "8", "9:20"]).unwrap();
    assert_eq!(encode_call(2, &args).unwrap().len(), 45);
    assert!(call(&ledger, &key(0), &c, 2, &args).is_empty());
    assert_eq!(get(2), words(&[56789]));
    assert_eq!(get(3), words(&[34567]));
}

#[test]
fn test_mine_moves_block_context() {
    init_logger();
    let ledger = Ledger::default();
    let c = deploy(&ledger, BLOCK, &key(0));
    assert_eq!(call(&ledger, &key(0), &c, 0, &[]), vec![U256::zero(); 3]);

    let shared: &Ledger = &ledger;
    shared.mine(3, &key(5));
    assert_eq!(ledger.block().number(), 3);
    assert_eq!(
        call(&ledger, &key(0), &c, 0, &[]),
        vec![U256::from(3), U256::from(36), U256::from(key(5))]
    );
    assert_eq!(
        ledger.balance(&key(5)),
        Wei::from(4_500_000_000_000_000_000u128)
    );

    // the block context is not rewound with the state
    let token = ledger.snapshot();
    ledger.mine(1, &key(6));
    ledger.revert(token).unwrap();
    assert_eq!(ledger.block().number(), 4);
    assert!(ledger.balance(&key(6)).is_zero());
}

#[test]
fn test_intrinsic_gas() {
    let ledger = Ledger::default();
    let c = deploy(&ledger, XOR, &key(1));
    let intrinsic = ledger.config().intrinsic_gas;
    let msg = Message::call(
        key(0),
        c.clone(),
        Wei::zero().clone(),
        intrinsic - 1,
        encode_call(0, &[2u64.into(), 5u64.into()]).unwrap(),
    );
    let r = ledger.apply(msg);
    assert_eq!(r.status, Status::OutOfGas);
    assert_eq!(r.gas_used, intrinsic - 1);
    assert_eq!(ledger.nonce(&key(0)), 0);

    // a revert keeps the nonce increment and charges what was used
    let r = ledger
        .call(&key(0), &c, Wei::zero().clone(), 7, &[])
        .unwrap();
    assert_eq!(r.status, Status::Revert);
    assert!(r.gas_used > intrinsic && r.gas_used < 1000 + intrinsic);
    assert_eq!(ledger.nonce(&key(0)), 1);
}

#[test]
fn test_value_transfer_needs_balance() {
    let ledger = Ledger::default();
    ledger.fund(&key(0), &Wei::from(100u64));
    let r = ledger.send(&key(0), &key(1), Wei::from(101u64), Bytes::empty());
    assert_eq!(r.error, Some(ExecError::InsufficientBalance));
    assert!(!ledger.exists(&key(1)));
    let r = ledger.send(&key(0), &key(1), Wei::from(60u64), Bytes::empty());
    assert!(r.succeeded());
    assert_eq!(ledger.balance(&key(0)), Wei::from(40u64));
    assert_eq!(ledger.balance(&key(1)), Wei::from(60u64));
}

#[test]
fn test_snapshots() {
    let ledger = Ledger::default();
    ledger.fund(&key(0), &Wei::from(10u64));
    let outer = ledger.snapshot();
    ledger.fund(&key(0), &Wei::from(10u64));
    let inner = ledger.snapshot();
    ledger.fund(&key(0), &Wei::from(10u64));
    ledger.commit(inner).unwrap();
    assert_eq!(ledger.balance(&key(0)), Wei::from(30u64));
    ledger.revert(outer).unwrap();
    assert_eq!(ledger.balance(&key(0)), Wei::from(10u64));
    assert!(matches!(
        ledger.revert(outer),
        Err(Error::Snapshot(SnapshotError::Stale))
    ));
    assert!(matches!(
        ledger.commit(inner),
        Err(Error::Snapshot(SnapshotError::Stale))
    ));
}

#[test]
fn test_failed_deploy() {
    let ledger = Ledger::default();
    let err = ledger
        .contract(
            &Assembler,
            "0 0 REVERT\n.runtime\nSTOP",
            &key(0),
            Wei::zero().clone(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Deploy { .. }));
    let err = ledger
        .contract(&Assembler, "FOO", &key(0), Wei::zero().clone())
        .unwrap_err();
    assert!(matches!(err, Error::Compile(_)));
}
