pub mod asm;
pub mod dummy;

use num_traits::FromPrimitive;
use once_cell::sync::Lazy;

use qledger::core::opcode::Opcode;

fn opcode_name(opcode: Opcode) -> &'static str {
    use Opcode::*;
    match opcode {
        Stop => "STOP",
        Add => "ADD",
        Mul => "MUL",
        Sub => "SUB",
        Div => "DIV",
        SDiv => "SDIV",
        Mod => "MOD",
        SMod => "SMOD",
        AddMod => "ADDMOD",
        MulMod => "MULMOD",
        Exp => "EXP",
        SignExtend => "SIGNEXTEND",
        Lt => "LT",
        Gt => "GT",
        Slt => "SLT",
        Sgt => "SGT",
        Eql => "EQ",
        IsZero => "ISZERO",
        And => "AND",
        Or => "OR",
        Xor => "XOR",
        Not => "NOT",
        Byte => "BYTE",
        Shl => "SHL",
        Shr => "SHR",
        Sar => "SAR",
        Sha3 => "SHA3",
        Addr => "ADDRESS",
        Balance => "BALANCE",
        Origin => "ORIGIN",
        Caller => "CALLER",
        CallValue => "CALLVALUE",
        CallDataLoad => "CALLDATALOAD",
        CallDataSize => "CALLDATASIZE",
        CallDataCopy => "CALLDATACOPY",
        CodeSize => "CODESIZE",
        CodeCopy => "CODECOPY",
        ExtCodeSize => "EXTCODESIZE",
        ReturnDataSize => "RETURNDATASIZE",
        ReturnDataCopy => "RETURNDATACOPY",
        Coinbase => "COINBASE",
        Timestamp => "TIMESTAMP",
        Number => "NUMBER",
        GasLimit => "GASLIMIT",
        ChainId => "CHAINID",
        SelfBalance => "SELFBALANCE",
        Pop => "POP",
        MLoad => "MLOAD",
        MStore => "MSTORE",
        MStore8 => "MSTORE8",
        SLoad => "SLOAD",
        SStore => "SSTORE",
        Jump => "JUMP",
        JumpI => "JUMPI",
        PC => "PC",
        MSize => "MSIZE",
        Gas => "GAS",
        JumpDest => "JUMPDEST",
        Push => "PUSH1",
        Dup => "DUP1",
        Swap => "SWAP1",
        Log0 => "LOG0",
        Log1 => "LOG1",
        Log2 => "LOG2",
        Log3 => "LOG3",
        Log4 => "LOG4",
        Create => "CREATE",
        Call => "CALL",
        CallCode => "CALLCODE",
        Return => "RETURN",
        DelegateCall => "DELEGATECALL",
        Revert => "REVERT",
        Invalid => "INVALID",
        SelfDestruct => "SELFDESTRUCT",
    }
}

static MNEMONICS: Lazy<Vec<Option<String>>> = Lazy::new(|| {
    (0..=255u8)
        .map(|raw| match raw {
            0x60..=0x7f => Some(format!("PUSH{}", raw - 0x5f)),
            0x80..=0x8f => Some(format!("DUP{}", raw - 0x7f)),
            0x90..=0x9f => Some(format!("SWAP{}", raw - 0x8f)),
            _ => Opcode::from_u8(raw).map(|op| opcode_name(op).to_string()),
        })
        .collect()
});

/// Mnemonic of a raw instruction byte, `None` for bytes the interpreter
/// rejects.
pub fn mnemonic(raw: u8) -> Option<&'static str> {
    MNEMONICS[raw as usize].as_deref()
}

pub fn disasm(code: &[u8], line_breaks: bool) -> String {
    let bitmap = qledger::common::gen_code_bitmap(code);
    let mut asm = Vec::new();
    let mut bytes = Vec::new();
    for (i, (c, b)) in code.iter().zip(bitmap.iter().by_vals()).enumerate() {
        if b {
            if !bytes.is_empty() {
                asm.push(format!(
                    "{}0x{}",
                    if line_breaks { " " } else { "" },
                    hex::encode(&bytes)
                ));
                bytes.clear();
            }
            if !asm.is_empty() && line_breaks {
                asm.push("\n".into());
            }
            let prefix = if line_breaks {
                format!("{:04x} ", i)
            } else {
                "".into()
            };
            match mnemonic(*c) {
                Some(s) => asm.push(format!("{}{}", prefix, s)),
                None => asm.push(format!("{}0x{:02x}?", prefix, *c)),
            }
        } else {
            bytes.push(*c);
        }
    }
    if !bytes.is_empty() {
        asm.push(format!("0x{}", hex::encode(bytes)));
    }
    asm.join(if line_breaks { "" } else { " " })
}

#[test]
fn test_mnemonic() {
    assert_eq!(mnemonic(0x00), Some("STOP"));
    assert_eq!(mnemonic(0x7f), Some("PUSH32"));
    assert_eq!(mnemonic(0x8f), Some("DUP16"));
    assert_eq!(mnemonic(0x91), Some("SWAP2"));
    assert_eq!(mnemonic(0x0c), None);
}

#[test]
fn test_disasm() {
    let code = hex::decode("6001600201").unwrap();
    assert_eq!(disasm(&code, false), "PUSH1 0x01 PUSH1 0x02 ADD");
}
