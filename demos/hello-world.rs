use std::io::Write;
use std::str::FromStr;

use qledger::abi::parse_args;
use qledger::common::{Addr, Wei};
use qledger::Ledger;
use qledger_tools as tools;
use qledger_tools::asm::Assembler;

// A counter: function 0 adds its argument to slot 0 and returns the sum,
// logging it under the caller.
const COUNTER: &str = "
    0 CALLDATALOAD 248 SHR
    DUP1 0 EQ @add JUMPI
    0 DUP1 REVERT
add:
    1 CALLDATALOAD 0 SLOAD ADD
    DUP1 0 SSTORE
    DUP1 0 MSTORE
    CALLER 32 0 LOG1
    32 0 RETURN
";

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format(|buf, r| writeln!(buf, "{}: {}", r.level(), r.args()))
    .init();

    let ledger = Ledger::default();
    log::info!("engine config: {}", ledger.config().to_json().unwrap());
    let alice =
        Addr::from_str("0x71C7656EC7ab88b098defB751B7401B5f6d8976F").unwrap();

    let code = Assembler.assemble(COUNTER).unwrap();
    println!("code: {}", tools::disasm(&code, false));

    let addr = ledger
        .contract(&Assembler, COUNTER, &alice, Wei::zero().clone())
        .unwrap();
    println!("contract deployed (addr={})", addr);

    for arg in ["1", "2", "0x2a"] {
        let args = parse_args(&[arg]).unwrap();
        let r = ledger
            .call(&alice, &addr, Wei::zero().clone(), 0, &args)
            .unwrap();
        if r.succeeded() {
            println!(
                "tx returned (data={} gas_used={} logs={})",
                r.output,
                r.gas_used,
                r.logs.len()
            )
        } else {
            println!(
                "tx failed (data={} err={:?})",
                r.output,
                r.error
            )
        }
    }
}
