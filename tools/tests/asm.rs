use qledger::error::CompileError;
use qledger::ledger::Compiler;
use qledger_tools::asm::Assembler;
use qledger_tools::disasm;

#[test]
fn test_labels() {
    let code = Assembler
        .assemble(
            "
            @end JUMP   ; forward reference
            start:
                stop
            end:
                @start jump
            ",
        )
        .unwrap();
    assert_eq!(
        code,
        vec![0x61, 0x00, 0x06, 0x56, 0x5b, 0x00, 0x5b, 0x61, 0x00, 0x04, 0x56]
    );
    assert_eq!(
        disasm(&code, false),
        "PUSH2 0x0006 JUMP JUMPDEST STOP JUMPDEST PUSH2 0x0004 JUMP"
    );
}

#[test]
fn test_errors() {
    assert_eq!(
        Assembler.assemble("1 2 ADD\nFROB"),
        Err(CompileError::UnknownInstruction {
            line: 2,
            token: "FROB".into()
        })
    );
    assert_eq!(
        Assembler.assemble("a:\nSTOP\na:"),
        Err(CompileError::DuplicateLabel {
            line: 3,
            label: "a".into()
        })
    );
    assert_eq!(
        Assembler.assemble("@nowhere JUMP"),
        Err(CompileError::UndefinedLabel("nowhere".into()))
    );
    assert_eq!(
        Assembler.assemble("PUSH1 256"),
        Err(CompileError::BadImmediate {
            line: 1,
            token: "256".into()
        })
    );
    assert_eq!(
        Assembler.assemble("PUSH2"),
        Err(CompileError::BadImmediate {
            line: 1,
            token: "".into()
        })
    );
    assert_eq!(
        Assembler.assemble("12abc"),
        Err(CompileError::BadImmediate {
            line: 1,
            token: "12abc".into()
        })
    );
}

#[test]
fn test_runtime_split() {
    let src = "
        42 0 SSTORE         ; constructor
    .runtime
    loop:
        @loop JUMP
    ";
    let init = Assembler.compile(src).unwrap();
    let ctor = Assembler.assemble("42 0 SSTORE").unwrap();
    let runtime = Assembler.assemble("loop: @loop JUMP").unwrap();
    assert_eq!(&init[..ctor.len()], &ctor[..]);
    // runtime labels count from the start of the runtime section
    assert_eq!(&init[init.len() - runtime.len()..], &runtime[..]);
    assert_eq!(runtime, vec![0x5b, 0x61, 0x00, 0x00, 0x56]);
    assert_eq!(init.len(), ctor.len() + 13 + runtime.len());
}

#[test]
fn test_disasm_roundtrip() {
    let code = Assembler
        .assemble("PUSH1 1 PUSH2 0x0100 ADD 0x0102030405 DUP3 SWAP16 LOG2")
        .unwrap();
    let text = disasm(&code, false);
    assert_eq!(
        text,
        "PUSH1 0x01 PUSH2 0x0100 ADD PUSH5 0x0102030405 DUP3 SWAP16 LOG2"
    );
    assert_eq!(Assembler.assemble(&text).unwrap(), code);
    assert!(disasm(&code, true).starts_with("0000 PUSH1 0x01\n0002 PUSH2"));
}
