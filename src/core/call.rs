use std::sync::Arc;

use sha3::Digest;

use super::alu;
use super::exec::{CallArgs, CallType, LogEntry, PlainCode};
use super::gas::GasMeter;
use super::memory::Memory;
use super::params::*;
use super::stack::Stack;
use super::{
    gas_checked_add, gas_checked_mul, get_data, word_count, Code, ExecError,
    Snapshot,
};
use crate::common::{checked_as_u64, Addr, Bytes, Gas, Wei, U256};

/// Effects of a frame that only take hold once the whole path back to the
/// root returns normally. A frame that fails drops them; one that returns
/// hands them to its parent.
#[derive(Default)]
pub(super) struct Effects {
    pub destroyed: Vec<Addr>,
    pub logs: Vec<LogEntry>,
}

impl Effects {
    pub fn absorb(&mut self, child: Effects) {
        for addr in child.destroyed {
            if !self.destroyed.contains(&addr) {
                self.destroyed.push(addr)
            }
        }
        self.logs.extend(child.logs)
    }
}

pub(super) struct CallFrame {
    /// position of the next instruction
    pub pc: usize,
    pub memory: Memory,
    pub stack: Stack,
    pub code: Arc<dyn Code>,
    /// storage context: the account whose storage and balance the code acts on
    pub callee: Addr,
    pub caller: Addr,
    pub call_type: CallType,
    input: Bytes,
    pub value: Wei,
    pub last_returned: Bytes,
    pub gas: GasMeter,
    pub effects: Effects,
}

impl CallFrame {
    #[inline]
    pub fn new(
        code: Arc<dyn Code>, input: Bytes, value: Wei, callee: Addr,
        caller: Addr, call_type: CallType, gas: Gas,
    ) -> Self {
        Self {
            pc: 0,
            memory: Memory::new(),
            stack: Stack::new(),
            code,
            callee,
            caller,
            call_type,
            input,
            value,
            last_returned: Bytes::empty(),
            gas: GasMeter::new(gas),
            effects: Effects::default(),
        }
    }

    /// Placeholder sitting below the root frame; it never runs.
    pub fn sentinel() -> Self {
        Self::new(
            Arc::new(PlainCode::new(Vec::new().into())),
            Bytes::empty(),
            Wei::zero().clone(),
            Addr::zero().clone(),
            Addr::zero().clone(),
            CallType::Call(CallArgs {
                snapshot: Snapshot::new(0, 0),
                ret_off: U256::zero(),
                ret_len: U256::zero(),
            }),
            0,
        )
    }

    #[inline(always)]
    pub fn use_gas(&mut self, gas: Gas) -> Result<(), ExecError> {
        self.gas.charge(gas)
    }

    #[inline(always)]
    pub fn address(&mut self) -> Result<(), ExecError> {
        self.push_quick(self.callee.clone().into())
    }

    #[inline(always)]
    pub fn caller(&mut self) -> Result<(), ExecError> {
        self.push_quick(self.caller.clone().into())
    }

    #[inline(always)]
    pub fn call_value(&mut self) -> Result<(), ExecError> {
        self.push_quick(self.value.clone().into())
    }

    #[inline(always)]
    pub fn unary(
        &mut self, gas: Gas, f: fn(U256) -> U256,
    ) -> Result<(), ExecError> {
        self.use_gas(gas)?;
        let a = self.stack.pop()?;
        self.stack.push(f(a))
    }

    #[inline(always)]
    pub fn binary(
        &mut self, gas: Gas, f: fn(U256, U256) -> U256,
    ) -> Result<(), ExecError> {
        self.use_gas(gas)?;
        let [a, b] = self.stack.pop_n()?;
        self.stack.push(f(a, b))
    }

    #[inline(always)]
    pub fn ternary(
        &mut self, gas: Gas, f: fn(U256, U256, U256) -> U256,
    ) -> Result<(), ExecError> {
        self.use_gas(gas)?;
        let [a, b, c] = self.stack.pop_n()?;
        self.stack.push(f(a, b, c))
    }

    /// Push a word that costs [GAS_QUICK] to produce.
    #[inline(always)]
    pub fn push_quick(&mut self, val: U256) -> Result<(), ExecError> {
        self.use_gas(GAS_QUICK)?;
        self.stack.push(val)
    }

    /// Grow memory over the range and pay for it.
    #[inline(always)]
    pub fn touch_memory(
        &mut self, off: &U256, len: &U256,
    ) -> Result<(), ExecError> {
        self.memory.expand(off, len, &mut self.gas)
    }

    #[inline(always)]
    pub fn exp(&mut self) -> Result<(), ExecError> {
        let [a, b] = self.stack.pop_n()?;
        let exp_bytes = (b.bits() as u64 + 7) >> 3;
        self.use_gas(gas_checked_add(
            GAS_SLOW,
            gas_checked_mul(GAS_EXP_BYTE, exp_bytes)?,
        )?)?;
        self.stack.push(alu::exp(a, b))
    }

    #[inline(always)]
    pub fn sha3(&mut self) -> Result<(), ExecError> {
        let [off, len] = self.stack.pop_n()?;
        self.use_gas(gas_checked_add(
            GAS_SHA3,
            gas_checked_mul(word_count(&len)?, GAS_SHA3_WORD)?,
        )?)?;
        self.touch_memory(&off, &len)?;
        let digest = sha3::Keccak256::digest(self.memory.slice(&off, &len));
        self.stack.push(U256::from_big_endian(digest.as_slice()))
    }

    #[inline(always)]
    pub fn call_data_load(&mut self) -> Result<(), ExecError> {
        self.use_gas(GAS_FASTEST)?;
        let off = self.stack.pop()?;
        let word = get_data(&self.input, &off, 32);
        self.stack.push(U256::from_big_endian(&word))
    }

    #[inline(always)]
    pub fn call_data_size(&mut self) -> Result<(), ExecError> {
        self.push_quick(self.input.len().into())
    }

    /// Shared body of the `*COPY` instructions: copy `len` bytes of `src`
    /// from `src_off` into memory at `mem_off`, zero-padded.
    #[inline(always)]
    fn copy_to_memory(
        &mut self, src: &[u8], mem_off: U256, src_off: U256, len: U256,
    ) -> Result<(), ExecError> {
        self.use_gas(gas_checked_add(
            GAS_FASTEST,
            gas_checked_mul(word_count(&len)?, GAS_COPY_WORD)?,
        )?)?;
        self.touch_memory(&mem_off, &len)?;
        let data = get_data(src, &src_off, len.low_u64() as usize);
        self.memory.write(&mem_off, &len, &data);
        Ok(())
    }

    #[inline(always)]
    pub fn call_data_copy(&mut self) -> Result<(), ExecError> {
        let [mem_off, data_off, len] = self.stack.pop_n()?;
        let input = self.input.clone();
        self.copy_to_memory(&input, mem_off, data_off, len)
    }

    #[inline(always)]
    pub fn code_size(&mut self) -> Result<(), ExecError> {
        self.push_quick(self.code.as_bytes().len().into())
    }

    #[inline(always)]
    pub fn code_copy(&mut self) -> Result<(), ExecError> {
        let [mem_off, code_off, len] = self.stack.pop_n()?;
        let code = self.code.clone();
        self.copy_to_memory(code.as_bytes(), mem_off, code_off, len)
    }

    #[inline(always)]
    pub fn return_data_size(&mut self) -> Result<(), ExecError> {
        self.push_quick(self.last_returned.len().into())
    }

    #[inline(always)]
    pub fn return_data_copy(&mut self) -> Result<(), ExecError> {
        let [mem_off, data_off, len] = self.stack.pop_n()?;
        // unlike the other copies, reading past the returned data is an error
        // rather than zero padding
        let end = data_off
            .checked_add(len)
            .and_then(|e| checked_as_u64(&e))
            .ok_or(ExecError::ReturnDataOutOfBounds)?;
        if end > self.last_returned.len() as u64 {
            return Err(ExecError::ReturnDataOutOfBounds)
        }
        let data = std::mem::take(&mut self.last_returned);
        let ret = self.copy_to_memory(&data, mem_off, data_off, len);
        self.last_returned = data;
        ret
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Result<(), ExecError> {
        self.use_gas(GAS_QUICK)?;
        self.stack.pop().map(|_| ())
    }

    #[inline(always)]
    pub fn mload(&mut self) -> Result<(), ExecError> {
        self.use_gas(GAS_FASTEST)?;
        let off = self.stack.pop()?;
        self.touch_memory(&off, &32.into())?;
        let word = U256::from_big_endian(self.memory.slice(&off, &32.into()));
        self.stack.push(word)
    }

    #[inline(always)]
    pub fn mstore(&mut self) -> Result<(), ExecError> {
        self.use_gas(GAS_FASTEST)?;
        let [off, val] = self.stack.pop_n()?;
        self.touch_memory(&off, &32.into())?;
        val.to_big_endian(self.memory.slice_mut(&off, &32.into()));
        Ok(())
    }

    #[inline(always)]
    pub fn mstore8(&mut self) -> Result<(), ExecError> {
        self.use_gas(GAS_FASTEST)?;
        let [off, val] = self.stack.pop_n()?;
        self.touch_memory(&off, &U256::one())?;
        self.memory.slice_mut(&off, &U256::one())[0] = val.byte(0);
        Ok(())
    }

    #[inline(always)]
    pub fn msize(&mut self) -> Result<(), ExecError> {
        self.push_quick(self.memory.len().into())
    }

    #[inline(always)]
    pub fn gas_left(&mut self) -> Result<(), ExecError> {
        self.use_gas(GAS_QUICK)?;
        self.stack.push(self.gas.remaining().into())
    }

    /// Push an immediate (big-endian, right-aligned).
    #[inline(always)]
    pub fn push(&mut self, data: &[u8]) -> Result<(), ExecError> {
        self.use_gas(GAS_FASTEST)?;
        self.stack.push(U256::from_big_endian(data))
    }

    #[inline(always)]
    pub fn dup(&mut self, pos: usize) -> Result<(), ExecError> {
        self.use_gas(GAS_FASTEST)?;
        self.stack.dup(pos)
    }

    #[inline(always)]
    pub fn swap(&mut self, pos: usize) -> Result<(), ExecError> {
        self.use_gas(GAS_FASTEST)?;
        self.stack.swap(pos)
    }

    #[inline(always)]
    fn jump_to(&mut self, dest: &U256) -> Result<(), ExecError> {
        if !self.code.is_valid_jumpdest(dest) {
            return Err(ExecError::InvalidJump)
        }
        self.pc = dest.as_usize();
        Ok(())
    }

    #[inline(always)]
    pub fn jump(&mut self) -> Result<(), ExecError> {
        self.use_gas(GAS_MID)?;
        let dest = self.stack.pop()?;
        self.jump_to(&dest)
    }

    #[inline(always)]
    pub fn jumpi(&mut self) -> Result<(), ExecError> {
        self.use_gas(GAS_SLOW)?;
        let [dest, cond] = self.stack.pop_n()?;
        if cond.is_zero() {
            return Ok(())
        }
        self.jump_to(&dest)
    }

    /// Pop `(offset, length)` and return a copy of that memory range, paying
    /// for any growth.
    #[inline(always)]
    pub fn take_memory_range(&mut self) -> Result<Bytes, ExecError> {
        let [off, len] = self.stack.pop_n()?;
        self.touch_memory(&off, &len)?;
        Ok(self.memory.slice(&off, &len).into())
    }

    pub fn log(&mut self, ntopics: usize) -> Result<(), ExecError> {
        let [off, len] = self.stack.pop_n()?;
        let data_gas = gas_checked_mul(
            checked_as_u64(&len).ok_or(ExecError::OutOfGas)?,
            GAS_LOG_DATA,
        )?;
        self.use_gas(gas_checked_add(
            GAS_LOG + GAS_LOG_TOPIC * ntopics as Gas,
            data_gas,
        )?)?;
        let mut topics = Vec::with_capacity(ntopics);
        for _ in 0..ntopics {
            topics.push(self.stack.pop()?.into());
        }
        self.touch_memory(&off, &len)?;
        let data = self.memory.slice(&off, &len).into();
        self.effects.logs.push(LogEntry {
            address: self.callee.clone(),
            topics,
            data,
        });
        Ok(())
    }
}

#[cfg(test)]
fn frame_with(code: &[u8], input: &[u8], gas: Gas) -> CallFrame {
    let mut f = CallFrame::sentinel();
    f.code = Arc::new(PlainCode::new(code.into()));
    f.input = input.into();
    f.gas = GasMeter::new(gas);
    f
}

#[test]
fn test_call_data_load_pads() {
    let mut f = frame_with(&[], &[0xaa, 0xbb], 100);
    f.stack.push(1.into()).unwrap();
    f.call_data_load().unwrap();
    let word = f.stack.pop().unwrap();
    assert_eq!(word.byte(31), 0xbb);
    assert_eq!(word.byte(30), 0);
    assert_eq!(word.byte(0), 0);
    assert_eq!(word >> 248, 0xbb.into());
}

#[test]
fn test_failed_charge_keeps_stack() {
    let mut f = frame_with(&[], &[], 2);
    f.stack.push(1.into()).unwrap();
    f.stack.push(2.into()).unwrap();
    let ret = f.binary(GAS_FASTEST, alu::add);
    assert!(matches!(ret, Err(ExecError::OutOfGas)));
    assert_eq!(f.stack.len(), 2);
}

#[test]
fn test_mstore_mload() {
    let mut f = frame_with(&[], &[], 1000);
    f.stack.push(0x1234.into()).unwrap();
    f.stack.push(4.into()).unwrap();
    f.mstore().unwrap();
    // two words of memory
    assert_eq!(f.memory.len(), 64);
    f.stack.push(4.into()).unwrap();
    f.mload().unwrap();
    assert_eq!(f.stack.pop().unwrap(), 0x1234.into());
    assert_eq!(f.gas.used(), 3 + 6 + 3);
}

#[test]
fn test_jump_requires_jumpdest() {
    // PUSH1 3 JUMP JUMPDEST
    let mut f = frame_with(&[0x60, 0x03, 0x56, 0x5b], &[], 100);
    f.stack.push(3.into()).unwrap();
    f.jump().unwrap();
    assert_eq!(f.pc, 3);
    f.stack.push(1.into()).unwrap();
    assert!(matches!(f.jump(), Err(ExecError::InvalidJump)));
}

#[test]
fn test_log_collects_topics() {
    let mut f = frame_with(&[], &[], 10_000);
    f.stack.push(7.into()).unwrap(); // topic
    f.stack.push(0.into()).unwrap(); // len
    f.stack.push(0.into()).unwrap(); // off
    f.log(1).unwrap();
    assert_eq!(f.effects.logs.len(), 1);
    assert_eq!(U256::from(f.effects.logs[0].topics[0].clone()), 7.into());
    assert_eq!(f.gas.used(), GAS_LOG + GAS_LOG_TOPIC);
}
