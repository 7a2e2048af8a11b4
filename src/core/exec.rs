use std::collections::hash_set::HashSet;
use std::sync::Arc;

use bitvec::vec::BitVec;
use log::{debug, warn};
use num_traits::FromPrimitive;

use super::call::{CallFrame, Effects};
use super::opcode::{push_width, Opcode};
use super::params::*;
use super::{
    alu, gas_checked_mul, Code, ExecError, Snapshot, TxExecEnv, WorldState,
    WorldStateR,
};
use crate::common::{create_addr, Addr, Bytes, Gas, Hash, Wei, U256};

/// Helper trait that adds funds transfer functions to any [WorldState]
/// objects.
pub trait Transferable {
    fn add_balance(&mut self, addr: &Addr, val: &Wei) -> Option<()>;
    fn sub_balance(&mut self, addr: &Addr, val: &Wei) -> Option<()>;
    /// Move `val` from one account to another. Nothing is written when the
    /// transfer fails.
    fn transfer_balance(
        &mut self, from: &Addr, to: &Addr, val: &Wei,
    ) -> Result<(), ExecError>;
}

impl<T> Transferable for T
where
    T: WorldState + ?Sized,
{
    fn add_balance(&mut self, addr: &Addr, val: &Wei) -> Option<()> {
        self.set_balance(addr, &self.get_balance(addr).checked_add(val)?);
        Some(())
    }

    fn sub_balance(&mut self, addr: &Addr, val: &Wei) -> Option<()> {
        self.set_balance(addr, &self.get_balance(addr).checked_sub(val)?);
        Some(())
    }

    fn transfer_balance(
        &mut self, from: &Addr, to: &Addr, val: &Wei,
    ) -> Result<(), ExecError> {
        let debited = self
            .get_balance(from)
            .checked_sub(val)
            .ok_or(ExecError::InsufficientBalance)?;
        if from == to {
            return Ok(())
        }
        // a credit that would overflow is refused like an overdraft
        let credited = self
            .get_balance(to)
            .checked_add(val)
            .ok_or(ExecError::InsufficientBalance)?;
        self.set_balance(from, &debited);
        self.set_balance(to, &credited);
        Ok(())
    }
}

pub trait WorldStateExtra {
    /// An account with no nonce, no balance and no code. Such an account is
    /// indistinguishable from one that does not exist.
    fn is_empty(&self, addr: &Addr) -> bool;
}

impl<T> WorldStateExtra for T
where
    T: WorldStateR + ?Sized,
{
    fn is_empty(&self, addr: &Addr) -> bool {
        self.get_nonce(addr) == 0 &&
            self.get_balance(addr).is_zero() &&
            self.get_code(addr).as_bytes().is_empty()
    }
}

/// Simple code object implementation that can be constructed from raw byte
/// code. PlainCode is standalone and caches code hash and valid jumps for the
/// code itself.
pub struct PlainCode {
    code: Box<[u8]>,
    bitmap: BitVec,
    hash: Hash,
}

impl PlainCode {
    pub fn new(code: Box<[u8]>) -> Self {
        let bitmap = crate::common::gen_code_bitmap(&code);
        let hash = Hash::hash(&code);
        Self { code, bitmap, hash }
    }
}

impl Code for PlainCode {
    fn is_valid_jumpdest(&self, dest: &U256) -> bool {
        if *dest >= U256::from(self.code.len()) {
            return false
        }
        let dest = dest.as_usize();
        self.bitmap[dest] && self.code[dest] == Opcode::JumpDest as u8
    }

    fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    fn get_hash(&self) -> &Hash {
        &self.hash
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// account whose code emitted the entry (the storage context)
    pub address: Addr,
    pub topics: Vec<Hash>,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Call(Addr),
    /// Run `input` as init code and install its output as the code of a new
    /// account.
    Create,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// The target code runs against the target's own storage and balance.
    Normal,
    /// The target code runs against the sender's storage and balance.
    Delegated,
}

/// A message handed to the interpreter.
#[derive(Clone, Debug)]
pub struct Message {
    pub sender: Addr,
    pub target: Target,
    pub value: Wei,
    /// gas available to the execution, after the intrinsic charge
    pub gas: Gas,
    pub input: Bytes,
    pub kind: CallKind,
}

impl Message {
    pub fn call(
        sender: Addr, to: Addr, value: Wei, gas: Gas, input: Bytes,
    ) -> Self {
        Self {
            sender,
            target: Target::Call(to),
            value,
            gas,
            input,
            kind: CallKind::Normal,
        }
    }

    pub fn create(sender: Addr, value: Wei, gas: Gas, code: Bytes) -> Self {
        Self {
            sender,
            target: Target::Create,
            value,
            gas,
            input: code,
            kind: CallKind::Normal,
        }
    }

    pub fn delegated(mut self) -> Self {
        self.kind = CallKind::Delegated;
        self
    }
}

pub(super) enum TxAux {
    Sender,
    Contract(Addr),
}

pub(super) struct TxArgs {
    snapshot: Snapshot,
    aux: TxAux,
}

pub(super) struct CallArgs {
    pub snapshot: Snapshot,
    pub ret_off: U256,
    pub ret_len: U256,
}

pub(super) struct CreateArgs {
    snapshot: Snapshot,
    contract_addr: Addr,
}

pub(super) enum CallType {
    Tx(TxArgs),
    Call(CallArgs),
    Create(CreateArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    Revert,
    OutOfGas,
}

/// The result of a message execution.
#[derive(Debug)]
pub enum TxExecResult {
    /// The execution finishes with some returned data, the gas left, the
    /// address of the created contract (for a creation) and the emitted logs.
    Succeeded(Bytes, Gas, Option<Addr>, Vec<LogEntry>),
    /// The execution reverts with some returned data, the gas left and the
    /// error.
    Reverted(Bytes, Gas, ExecError),
}

impl TxExecResult {
    pub fn status(&self) -> Status {
        match self {
            TxExecResult::Succeeded(..) => Status::Success,
            TxExecResult::Reverted(_, _, ExecError::OutOfGas) => {
                Status::OutOfGas
            }
            TxExecResult::Reverted(..) => Status::Revert,
        }
    }

    pub fn output(&self) -> &Bytes {
        match self {
            TxExecResult::Succeeded(data, ..) => data,
            TxExecResult::Reverted(data, ..) => data,
        }
    }

    pub fn gas_left(&self) -> Gas {
        match self {
            TxExecResult::Succeeded(_, gas, ..) => *gas,
            TxExecResult::Reverted(_, gas, _) => *gas,
        }
    }
}

struct TxExecContext<'a, S: WorldState> {
    call_stack: Vec<Box<CallFrame>>,
    /// Top of the call stack, not included in `call_stack`
    cur_call: Box<CallFrame>,
    state: &'a mut S,
    /// Accounts touched by the message, checked for emptiness at the end
    dirty: HashSet<Addr>,
    result: Option<TxExecResult>,

    // the following fields are immutable throughout the execution
    origin: Addr,
    env: &'a TxExecEnv,
}

/// Run one message to completion against `state`.
///
/// The call stack is kept on the heap and frames are switched in place, so
/// nesting depth is bounded by [MAX_CALL_DEPTH] rather than by the native
/// stack. Every child frame runs inside its own snapshot of `state`: it is
/// folded into the parent when the child returns and rolled back otherwise.
/// The same holds for the message as a whole, except that the sender's nonce
/// increment survives a failed message.
pub fn execute<S: WorldState>(
    state: &mut S, env: &TxExecEnv, msg: Message,
) -> TxExecResult {
    let mut ctx = TxExecContext {
        call_stack: Vec::new(),
        cur_call: Box::new(CallFrame::sentinel()),
        state,
        dirty: HashSet::new(),
        result: None,
        origin: msg.sender.clone(),
        env,
    };
    ctx.begin(msg);
    ctx.exec()
}

impl<'a, S: WorldState> TxExecContext<'a, S> {
    fn begin(&mut self, msg: Message) {
        let Message {
            sender,
            target,
            value,
            gas,
            input,
            kind,
        } = msg;
        let nonce = self.state.get_nonce(&sender);
        self.state.set_nonce(&sender, nonce.saturating_add(1));
        self.dirty.insert(sender.clone());
        let snapshot = self.state.snapshot();
        // the root frame always ends in tx_end, which records the result
        let _ = match target {
            Target::Call(to) => {
                let args = CallType::Tx(TxArgs {
                    snapshot,
                    aux: TxAux::Sender,
                });
                let callee = match kind {
                    CallKind::Normal => to.clone(),
                    CallKind::Delegated => sender.clone(),
                };
                let transfer = kind == CallKind::Normal;
                self.call_(
                    to, callee, sender, input, gas, value, transfer, args,
                )
            }
            Target::Create => {
                let contract_addr = create_addr(&sender, nonce);
                let args = CallType::Tx(TxArgs {
                    snapshot,
                    aux: TxAux::Contract(contract_addr.clone()),
                });
                self.create_(contract_addr, sender, input, value, gas, args)
            }
        };
    }

    #[inline(always)]
    fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    #[inline(always)]
    fn call_push(
        &mut self, code: Arc<dyn Code>, input: Bytes, value: Wei,
        callee: Addr, caller: Addr, call_type: CallType, gas: Gas,
    ) {
        let mut frame = Box::new(CallFrame::new(
            code, input, value, callee, caller, call_type, gas,
        ));
        std::mem::swap(&mut self.cur_call, &mut frame);
        self.call_stack.push(frame);
    }

    #[inline(always)]
    fn call_pop(&mut self) -> Box<CallFrame> {
        let parent = self
            .call_stack
            .pop()
            .unwrap_or_else(|| Box::new(CallFrame::sentinel()));
        std::mem::replace(&mut self.cur_call, parent)
    }

    /// Commit (`keep`) or roll back the revision started by `snapshot`.
    fn close(&mut self, snapshot: Snapshot, keep: bool) {
        let ret = if keep {
            self.state.discard(snapshot)
        } else {
            self.state.rollback(snapshot)
        };
        if let Err(e) = ret {
            warn!("frame snapshot {:?} could not be closed: {}", snapshot, e)
        }
    }

    /// Close the child's snapshot and hand its effects to the current frame.
    /// Returns how much of the child's gas goes back to the current frame.
    fn settle(
        &mut self, snapshot: Snapshot, ret: &Result<(), ExecError>,
        gas_left: Gas, effects: Effects,
    ) -> Gas {
        match ret {
            Ok(()) => {
                self.close(snapshot, true);
                self.cur_call.effects.absorb(effects);
                gas_left
            }
            Err(err) => {
                debug!("frame failed: {:?}", err);
                self.close(snapshot, false);
                if err.consumes_all_gas() {
                    0
                } else {
                    gas_left
                }
            }
        }
    }

    /// Store the output of init code as the new account's code, paid from the
    /// gas the init frame left.
    fn deposit_code(
        &mut self, addr: &Addr, code: &[u8], gas_left: &mut Gas,
    ) -> Result<(), ExecError> {
        if code.len() > MAX_CODE_SIZE {
            return Err(ExecError::MaxCodeSizeExceeded)
        }
        let cost = gas_checked_mul(code.len() as u64, GAS_CREATE_DATA)?;
        *gas_left = gas_left
            .checked_sub(cost)
            .ok_or(ExecError::CodeStoreOutOfGas)?;
        self.state.set_code(addr, code);
        Ok(())
    }

    /// Refuse to start a child frame. The gas set aside for it goes back.
    fn reject_child(
        &mut self, gas: Gas, err: ExecError,
    ) -> Result<(), ExecError> {
        debug!("child frame rejected: {:?}", err);
        let call = &mut self.cur_call;
        call.gas.refund(gas);
        call.last_returned = Bytes::empty();
        call.stack.push(U256::zero())
    }

    fn call_(
        &mut self, code_addr: Addr, callee: Addr, caller: Addr, input: Bytes,
        gas: Gas, value: Wei, transfer: bool, args: CallType,
    ) -> Result<(), ExecError> {
        if transfer && !value.is_zero() {
            if let Err(err) =
                self.state.transfer_balance(&caller, &callee, &value)
            {
                return self.end_frame(
                    args,
                    Bytes::empty(),
                    gas,
                    Err(err),
                    Effects::default(),
                )
            }
            self.dirty.insert(caller.clone());
            self.dirty.insert(callee.clone());
        }
        let code = self.state.get_code(&code_addr);
        if code.as_bytes().is_empty() {
            // nothing to run: the call trivially succeeds
            return self.end_frame(
                args,
                Bytes::empty(),
                gas,
                Ok(()),
                Effects::default(),
            )
        }
        self.call_push(code, input, value, callee, caller, args, gas);
        Ok(())
    }

    fn create_(
        &mut self, contract_addr: Addr, caller: Addr, init: Bytes, value: Wei,
        gas: Gas, args: CallType,
    ) -> Result<(), ExecError> {
        if self.state.get_nonce(&contract_addr) != 0 ||
            !self.state.get_code(&contract_addr).as_bytes().is_empty()
        {
            return self.end_frame(
                args,
                Bytes::empty(),
                gas,
                Err(ExecError::ContractAddrCollision),
                Effects::default(),
            )
        }
        self.state.create_account(&contract_addr);
        self.state.set_nonce(&contract_addr, 1);
        if !value.is_zero() {
            if let Err(err) =
                self.state.transfer_balance(&caller, &contract_addr, &value)
            {
                return self.end_frame(
                    args,
                    Bytes::empty(),
                    gas,
                    Err(err),
                    Effects::default(),
                )
            }
            self.dirty.insert(caller.clone());
        }
        self.dirty.insert(contract_addr.clone());
        if init.is_empty() {
            return self.end_frame(
                args,
                Bytes::empty(),
                gas,
                Ok(()),
                Effects::default(),
            )
        }
        let code = Arc::new(PlainCode::new(init.into_inner().into()));
        self.call_push(
            code,
            Bytes::empty(),
            value,
            contract_addr,
            caller,
            args,
            gas,
        );
        Ok(())
    }

    #[inline(always)]
    fn balance(&mut self) -> Result<(), ExecError> {
        let call = &mut self.cur_call;
        call.use_gas(GAS_BALANCE)?;
        let addr = call.stack.pop()?.into();
        call.stack.push(self.state.get_balance(&addr).into())
    }

    #[inline(always)]
    fn self_balance(&mut self) -> Result<(), ExecError> {
        let call = &mut self.cur_call;
        call.use_gas(GAS_FAST)?;
        call.stack.push(self.state.get_balance(&call.callee).into())
    }

    #[inline(always)]
    fn ext_code_size(&mut self) -> Result<(), ExecError> {
        let call = &mut self.cur_call;
        call.use_gas(GAS_EXT_CODE)?;
        let addr = call.stack.pop()?.into();
        let code = self.state.get_code(&addr);
        call.stack.push(code.as_bytes().len().into())
    }

    #[inline(always)]
    fn sload(&mut self) -> Result<(), ExecError> {
        let call = &mut self.cur_call;
        call.use_gas(GAS_SLOAD)?;
        let key = call.stack.pop()?.into();
        call.stack.push(self.state.get_state(&call.callee, &key))
    }

    #[inline(always)]
    fn sstore(&mut self) -> Result<(), ExecError> {
        let call = &mut self.cur_call;
        let [key, val] = call.stack.pop_n()?;
        let key = key.into();
        let cur = self.state.get_state(&call.callee, &key);
        call.use_gas(if cur.is_zero() && !val.is_zero() {
            GAS_SSTORE_SET
        } else {
            GAS_SSTORE_RESET
        })?;
        self.state.set_state(&call.callee, &key, &val);
        self.dirty.insert(call.callee.clone());
        Ok(())
    }

    fn call_begin(&mut self, op: Opcode) -> Result<(), ExecError> {
        let call = &mut self.cur_call;
        call.use_gas(GAS_CALL)?;
        let [gas, addr] = call.stack.pop_n()?;
        let val = match op {
            Opcode::DelegateCall => U256::zero(),
            _ => call.stack.pop()?,
        };
        let [in_off, in_len, ret_off, ret_len] = call.stack.pop_n()?;
        call.touch_memory(&in_off, &in_len)?;
        call.touch_memory(&ret_off, &ret_len)?;
        let addr: Addr = addr.into();
        if !val.is_zero() {
            call.use_gas(GAS_CALL_VALUE_TRANS)?;
            if op == Opcode::Call && self.state.is_empty(&addr) {
                call.use_gas(GAS_CALL_NEW_ACCOUNT)?;
            }
        }
        let gas = call.gas.allot(&gas)?;
        let input: Bytes = call.memory.slice(&in_off, &in_len).into();
        let (callee, caller, value) = match op {
            Opcode::Call => (addr.clone(), call.callee.clone(), val.into()),
            Opcode::CallCode => {
                (call.callee.clone(), call.callee.clone(), val.into())
            }
            // inherit all from the caller
            _ => (call.callee.clone(), call.caller.clone(), call.value.clone()),
        };
        if self.call_depth() >= MAX_CALL_DEPTH {
            return self.reject_child(gas, ExecError::Depth)
        }
        let snapshot = self.state.snapshot();
        let args = CallType::Call(CallArgs {
            snapshot,
            ret_off,
            ret_len,
        });
        let transfer = op != Opcode::DelegateCall;
        self.call_(addr, callee, caller, input, gas, value, transfer, args)
    }

    fn call_end(
        &mut self, args: CallArgs, data: Bytes, gas_left: Gas,
        ret: Result<(), ExecError>, effects: Effects,
    ) -> Result<(), ExecError> {
        let refund = self.settle(args.snapshot, &ret, gas_left, effects);
        let call = &mut self.cur_call;
        call.gas.refund(refund);
        if let Ok(()) | Err(ExecError::Reverted) = ret {
            call.memory.write(&args.ret_off, &args.ret_len, &data);
        }
        call.last_returned = data;
        call.stack.push(match ret {
            Ok(()) => U256::one(),
            Err(_) => U256::zero(),
        })
    }

    fn create_begin(&mut self) -> Result<(), ExecError> {
        let call = &mut self.cur_call;
        call.use_gas(GAS_CREATE)?;
        let [value, off, len] = call.stack.pop_n()?;
        call.touch_memory(&off, &len)?;
        let init: Bytes = call.memory.slice(&off, &len).into();
        // the init frame gets everything the cap allows
        let gas = call.gas.allot(&U256::MAX)?;
        let caller = call.callee.clone();
        let value: Wei = value.into();
        if self.call_depth() >= MAX_CALL_DEPTH {
            return self.reject_child(gas, ExecError::Depth)
        }
        if self.state.get_balance(&caller) < value {
            return self.reject_child(gas, ExecError::InsufficientBalance)
        }
        let nonce = self.state.get_nonce(&caller);
        self.state.set_nonce(&caller, nonce.saturating_add(1));
        let contract_addr = create_addr(&caller, nonce);
        let snapshot = self.state.snapshot();
        let args = CallType::Create(CreateArgs {
            snapshot,
            contract_addr: contract_addr.clone(),
        });
        self.create_(contract_addr, caller, init, value, gas, args)
    }

    fn create_end(
        &mut self, args: CreateArgs, data: Bytes, mut gas_left: Gas,
        ret: Result<(), ExecError>, effects: Effects,
    ) -> Result<(), ExecError> {
        let ret = ret.and_then(|()| {
            self.deposit_code(&args.contract_addr, &data, &mut gas_left)
        });
        let refund = self.settle(args.snapshot, &ret, gas_left, effects);
        let call = &mut self.cur_call;
        call.gas.refund(refund);
        call.last_returned = match ret {
            Err(ExecError::Reverted) => data,
            _ => Bytes::empty(),
        };
        call.stack.push(match ret {
            Ok(()) => args.contract_addr.into(),
            Err(_) => U256::zero(),
        })
    }

    fn tx_end(
        &mut self, args: TxArgs, data: Bytes, mut gas_left: Gas,
        ret: Result<(), ExecError>, effects: Effects,
    ) {
        let (ret, created) = match args.aux {
            TxAux::Contract(addr) => {
                let ret = ret.and_then(|()| {
                    self.deposit_code(&addr, &data, &mut gas_left)
                });
                (ret, Some(addr))
            }
            TxAux::Sender => (ret, None),
        };
        let res = match ret {
            Ok(()) => {
                for addr in effects.destroyed.iter() {
                    self.state.delete_account(addr)
                }
                for addr in self.dirty.iter() {
                    if self.state.exist(addr) && self.state.is_empty(addr) {
                        self.state.delete_account(addr)
                    }
                }
                self.close(args.snapshot, true);
                TxExecResult::Succeeded(data, gas_left, created, effects.logs)
            }
            Err(err) => {
                self.close(args.snapshot, false);
                if err.consumes_all_gas() {
                    gas_left = 0
                }
                TxExecResult::Reverted(data, gas_left, err)
            }
        };
        self.dirty.clear();
        self.result = Some(res)
    }

    /// Deliver the outcome of a frame (or of a child that never got a frame)
    /// to whatever started it.
    fn end_frame(
        &mut self, call_type: CallType, data: Bytes, gas_left: Gas,
        ret: Result<(), ExecError>, effects: Effects,
    ) -> Result<(), ExecError> {
        match call_type {
            CallType::Tx(args) => {
                self.tx_end(args, data, gas_left, ret, effects);
                Ok(())
            }
            CallType::Call(args) => {
                self.call_end(args, data, gas_left, ret, effects)
            }
            CallType::Create(args) => {
                self.create_end(args, data, gas_left, ret, effects)
            }
        }
    }

    #[inline(always)]
    fn finish_call(
        &mut self, data: Bytes, ret: Result<(), ExecError>,
    ) -> Result<(), ExecError> {
        let frame = self.call_pop();
        let CallFrame {
            call_type,
            gas,
            effects,
            ..
        } = *frame;
        self.end_frame(call_type, data, gas.remaining(), ret, effects)
    }

    #[inline(always)]
    fn return_(&mut self, ret: Result<(), ExecError>) -> Result<(), ExecError> {
        let data = self.cur_call.take_memory_range()?;
        self.finish_call(data, ret)
    }

    fn self_destruct(&mut self) -> Result<(), ExecError> {
        let call = &mut self.cur_call;
        call.use_gas(GAS_SELF_DESTRUCT)?;
        let beneficiary: Addr = call.stack.pop()?.into();
        let balance = self.state.get_balance(&call.callee);
        if !balance.is_zero() && self.state.is_empty(&beneficiary) {
            call.use_gas(GAS_CREATE_BY_SELF_DESTRUCT)?;
        }
        self.state
            .transfer_balance(&call.callee, &beneficiary, &balance)?;
        // a contract naming itself as beneficiary burns its balance
        self.state.set_balance(&call.callee, Wei::zero());
        self.dirty.insert(call.callee.clone());
        self.dirty.insert(beneficiary);
        call.effects.absorb(Effects {
            destroyed: vec![call.callee.clone()],
            logs: Vec::new(),
        });
        self.finish_call(Bytes::empty(), Ok(()))
    }

    fn exec(mut self) -> TxExecResult {
        use Opcode::*;
        loop {
            if let Some(res) = self.result.take() {
                return res
            }
            let call = &mut self.cur_call;
            let code = call.code.clone();
            let code = code.as_bytes();
            let pc = call.pc;
            let raw = code.get(pc).copied().unwrap_or(Stop as u8);
            let mut imm = Vec::new();
            let mut pos = 0;
            let opcode = match raw {
                0x60..=0x7f => {
                    let width = push_width(raw).unwrap_or(0);
                    let start = (pc + 1).min(code.len());
                    let end = (pc + 1 + width).min(code.len());
                    imm.extend_from_slice(&code[start..end]);
                    // immediates running off the end of the code read as
                    // zeros
                    imm.resize(width, 0);
                    Push
                }
                0x80..=0x8f => {
                    pos = (raw - 0x7f) as usize;
                    Dup
                }
                0x90..=0x9f => {
                    pos = (raw - 0x8f) as usize;
                    Swap
                }
                _ => Opcode::from_u8(raw).unwrap_or(Invalid),
            };
            call.pc = pc + 1 + imm.len();
            let mut ret = match opcode {
                Stop => self.finish_call(Bytes::empty(), Ok(())),
                Add => call.binary(GAS_FASTEST, alu::add),
                Mul => call.binary(GAS_FAST, alu::mul),
                Sub => call.binary(GAS_FASTEST, alu::sub),
                Div => call.binary(GAS_FAST, alu::div),
                SDiv => call.binary(GAS_FAST, alu::sdiv),
                Mod => call.binary(GAS_FAST, alu::rem),
                SMod => call.binary(GAS_FAST, alu::smod),
                AddMod => call.ternary(GAS_MID, alu::add_mod),
                MulMod => call.ternary(GAS_MID, alu::mul_mod),
                Exp => call.exp(),
                SignExtend => call.binary(GAS_FAST, alu::sign_extend),
                Lt => call.binary(GAS_FASTEST, alu::lt),
                Gt => call.binary(GAS_FASTEST, alu::gt),
                Slt => call.binary(GAS_FASTEST, alu::slt),
                Sgt => call.binary(GAS_FASTEST, alu::sgt),
                Eql => call.binary(GAS_FASTEST, alu::eq),
                IsZero => call.unary(GAS_FASTEST, alu::is_zero),
                And => call.binary(GAS_FASTEST, alu::and),
                Or => call.binary(GAS_FASTEST, alu::or),
                Xor => call.binary(GAS_FASTEST, alu::xor),
                Not => call.unary(GAS_FASTEST, alu::not),
                Byte => call.binary(GAS_FASTEST, alu::byte),
                Shl => call.binary(GAS_FASTEST, alu::shl),
                Shr => call.binary(GAS_FASTEST, alu::shr),
                Sar => call.binary(GAS_FASTEST, alu::sar),
                Sha3 => call.sha3(),
                Addr => call.address(),
                Balance => self.balance(),
                Origin => call.push_quick(self.origin.clone().into()),
                Caller => call.caller(),
                CallValue => call.call_value(),
                CallDataLoad => call.call_data_load(),
                CallDataSize => call.call_data_size(),
                CallDataCopy => call.call_data_copy(),
                CodeSize => call.code_size(),
                CodeCopy => call.code_copy(),
                ExtCodeSize => self.ext_code_size(),
                ReturnDataSize => call.return_data_size(),
                ReturnDataCopy => call.return_data_copy(),
                Coinbase => {
                    call.push_quick(self.env.block.coinbase.clone().into())
                }
                Timestamp => call.push_quick(self.env.block.timestamp),
                Number => call.push_quick(self.env.block.number),
                GasLimit => call.push_quick(self.env.block.gas_limit.into()),
                ChainId => call.push_quick(self.env.chain_id),
                SelfBalance => self.self_balance(),
                Pop => call.pop(),
                MLoad => call.mload(),
                MStore => call.mstore(),
                MStore8 => call.mstore8(),
                SLoad => self.sload(),
                SStore => self.sstore(),
                Jump => call.jump(),
                JumpI => call.jumpi(),
                PC => call.push_quick(pc.into()),
                MSize => call.msize(),
                Gas => call.gas_left(),
                JumpDest => call.use_gas(GAS_JUMPDEST),
                Push => call.push(&imm),
                Dup => call.dup(pos),
                Swap => call.swap(pos),
                Log0 => call.log(0),
                Log1 => call.log(1),
                Log2 => call.log(2),
                Log3 => call.log(3),
                Log4 => call.log(4),
                Create => self.create_begin(),
                Call | CallCode | DelegateCall => self.call_begin(opcode),
                Return => self.return_(Ok(())),
                Revert => self.return_(Err(ExecError::Reverted)),
                SelfDestruct => self.self_destruct(),
                Invalid => Err(ExecError::InvalidOpcode),
            };
            while let Err(err) = ret {
                ret = self.finish_call(Bytes::empty(), Err(err));
            }
        }
    }
}

#[cfg(test)]
use super::{BlockInfo, WorldStateW};
#[cfg(test)]
use crate::state::MemState;

#[cfg(test)]
fn test_env() -> TxExecEnv {
    TxExecEnv {
        chain_id: 1.into(),
        block: BlockInfo {
            coinbase: Addr::zero().clone(),
            timestamp: 0.into(),
            number: 0.into(),
            gas_limit: 10_000_000,
        },
    }
}

#[cfg(test)]
fn run_code(
    s: &mut MemState, to: &Addr, code: &str, gas: Gas,
) -> TxExecResult {
    s.set_code(to, &hex::decode(code).unwrap());
    let msg = Message::call(
        Addr::from_low_u64(0xaa),
        to.clone(),
        Wei::zero().clone(),
        gas,
        Bytes::empty(),
    );
    execute(s, &test_env(), msg)
}

#[test]
fn test_store_and_gas() {
    let mut s = MemState::new();
    let c = Addr::from_low_u64(0xc0);
    // PUSH1 42 PUSH1 0 SSTORE STOP
    let ret = run_code(&mut s, &c, "602a60005500", 100_000);
    assert_eq!(ret.status(), Status::Success);
    assert_eq!(ret.gas_left(), 100_000 - 3 - 3 - GAS_SSTORE_SET);
    assert_eq!(s.get_state(&c, &0.into()), 42.into());
    assert_eq!(s.get_nonce(&Addr::from_low_u64(0xaa)), 1);
}

#[test]
fn test_revert_returns_gas() {
    let mut s = MemState::new();
    let c = Addr::from_low_u64(0xc0);
    // PUSH1 1 PUSH1 0 SSTORE PUSH1 0 PUSH1 0 REVERT
    let ret = run_code(&mut s, &c, "6001600055600060006000fd", 100_000);
    assert_eq!(ret.status(), Status::Revert);
    assert_eq!(ret.gas_left(), 100_000 - 3 * 5 - GAS_SSTORE_SET);
    assert_eq!(s.get_state(&c, &0.into()), U256::zero());
    // the nonce increment outlives the revert
    assert_eq!(s.get_nonce(&Addr::from_low_u64(0xaa)), 1);
}

#[test]
fn test_out_of_gas_burns_everything() {
    let mut s = MemState::new();
    let c = Addr::from_low_u64(0xc0);
    let ret = run_code(&mut s, &c, "602a60005500", 20_000);
    assert_eq!(ret.status(), Status::OutOfGas);
    assert_eq!(ret.gas_left(), 0);
    assert_eq!(s.get_state(&c, &0.into()), U256::zero());
}

#[test]
fn test_failed_child_forfeits_allotment() {
    let mut s = MemState::new();
    let parent = Addr::from_low_u64(0xc0);
    let child = Addr::from_low_u64(0xcc);
    s.set_code(&child, &[Opcode::Invalid as u8]);
    // CALL(gas = 100000, child, 0, 0, 0, 0, 0); SSTORE(0, result); STOP
    let code = "60006000600060006000".to_string() +
        "60cc620186a0f1" +
        "60005500";
    let ret = run_code(&mut s, &parent, &code, 1_000_000);
    assert_eq!(ret.status(), Status::Success);
    assert_eq!(
        ret.gas_left(),
        1_000_000 - 7 * 3 - GAS_CALL - 100_000 - 3 - GAS_SSTORE_RESET
    );
    assert_eq!(s.get_state(&parent, &0.into()), U256::zero());
}

#[test]
fn test_reverted_child_refunds_unused_gas() {
    let mut s = MemState::new();
    let parent = Addr::from_low_u64(0xc0);
    let child = Addr::from_low_u64(0xcc);
    // PUSH1 0 PUSH1 0 REVERT
    s.set_code(&child, &hex::decode("60006000fd").unwrap());
    let code = "60006000600060006000".to_string() +
        "60cc620186a0f1" +
        "60005500";
    let ret = run_code(&mut s, &parent, &code, 1_000_000);
    assert_eq!(ret.status(), Status::Success);
    // only the child's two pushes are lost; the result 0 is a reset store
    assert_eq!(
        ret.gas_left(),
        1_000_000 - 7 * 3 - GAS_CALL - 2 * 3 - 3 - GAS_SSTORE_RESET
    );
    assert_eq!(ret.gas_left(), 994_270);
    assert_eq!(s.get_state(&parent, &0.into()), U256::zero());
}

#[test]
fn test_returned_child_refunds_unused_gas() {
    let mut s = MemState::new();
    let parent = Addr::from_low_u64(0xc0);
    let child = Addr::from_low_u64(0xcc);
    s.set_code(&child, &[Opcode::Stop as u8]);
    let code = "60006000600060006000".to_string() +
        "60cc620186a0f1" +
        "60005500";
    let ret = run_code(&mut s, &parent, &code, 1_000_000);
    assert_eq!(ret.status(), Status::Success);
    assert_eq!(
        ret.gas_left(),
        1_000_000 - 7 * 3 - GAS_CALL - 3 - GAS_SSTORE_SET
    );
    assert_eq!(ret.gas_left(), 979_276);
    assert_eq!(s.get_state(&parent, &0.into()), U256::one());
}

#[test]
fn test_parent_revert_undoes_child() {
    let mut s = MemState::new();
    let parent = Addr::from_low_u64(0xc0);
    let child = Addr::from_low_u64(0xcc);
    // PUSH1 7 PUSH1 1 SSTORE STOP
    s.set_code(&child, &hex::decode("600760015500").unwrap());
    let code = "60006000600060006000".to_string() +
        "60cc620186a0f1" +
        "60006000fd";
    let ret = run_code(&mut s, &parent, &code, 1_000_000);
    assert_eq!(ret.status(), Status::Revert);
    assert_eq!(s.get_state(&child, &1.into()), U256::zero());

    // without the revert the child's write lands
    let code = "60006000600060006000".to_string() + "60cc620186a0f1" + "00";
    let ret = run_code(&mut s, &parent, &code, 1_000_000);
    assert_eq!(ret.status(), Status::Success);
    assert_eq!(s.get_state(&child, &1.into()), 7.into());
}

#[test]
fn test_delegatecall_uses_caller_storage() {
    let mut s = MemState::new();
    let parent = Addr::from_low_u64(0xc0);
    let lib = Addr::from_low_u64(0xcc);
    // PUSH1 4 PUSH1 1 SSTORE STOP
    s.set_code(&lib, &hex::decode("600460015500").unwrap());
    // DELEGATECALL(gas = 100000, lib, 0, 0, 0, 0); STOP
    let code = "6000600060006000".to_string() + "60cc620186a0f4" + "00";
    let ret = run_code(&mut s, &parent, &code, 1_000_000);
    assert_eq!(ret.status(), Status::Success);
    assert_eq!(s.get_state(&parent, &1.into()), 4.into());
    assert_eq!(s.get_state(&lib, &1.into()), U256::zero());
}

#[test]
fn test_delegated_message_writes_sender_storage() {
    let mut s = MemState::new();
    let sender = Addr::from_low_u64(0xaa);
    let lib = Addr::from_low_u64(0xcc);
    // PUSH1 5 PUSH1 1 SSTORE STOP
    s.set_code(&lib, &hex::decode("600560015500").unwrap());
    let msg = Message::call(
        sender.clone(),
        lib.clone(),
        Wei::zero().clone(),
        100_000,
        Bytes::empty(),
    )
    .delegated();
    let ret = execute(&mut s, &test_env(), msg);
    assert_eq!(ret.status(), Status::Success);
    assert_eq!(s.get_state(&sender, &1.into()), 5.into());
    assert_eq!(s.get_state(&lib, &1.into()), U256::zero());
}

#[test]
fn test_create_installs_output() {
    let mut s = MemState::new();
    let sender = Addr::from_low_u64(0xaa);
    // MSTORE8(0, 0x2a); RETURN(0, 1)
    let init = hex::decode("602a60005360016000f3").unwrap();
    let msg = Message::create(
        sender.clone(),
        Wei::zero().clone(),
        100_000,
        init.into(),
    );
    let ret = execute(&mut s, &test_env(), msg);
    let addr = create_addr(&sender, 0);
    match ret {
        TxExecResult::Succeeded(_, _, created, _) => {
            assert_eq!(created, Some(addr.clone()))
        }
        r => panic!("unexpected result {:?}", r),
    }
    assert_eq!(s.get_code(&addr).as_bytes(), &[0x2a]);
    assert_eq!(s.get_nonce(&addr), 1);
}

#[test]
fn test_value_to_plain_account() {
    let mut s = MemState::new();
    let sender = Addr::from_low_u64(0xaa);
    let to = Addr::from_low_u64(0xbb);
    s.set_balance(&sender, &100u64.into());
    let msg = Message::call(
        sender.clone(),
        to.clone(),
        30u64.into(),
        0,
        Bytes::empty(),
    );
    let ret = execute(&mut s, &test_env(), msg);
    assert_eq!(ret.status(), Status::Success);
    assert_eq!(s.get_balance(&to), 30u64.into());
    assert_eq!(s.get_balance(&sender), 70u64.into());

    let msg =
        Message::call(sender.clone(), to, 71u64.into(), 0, Bytes::empty());
    let ret = execute(&mut s, &test_env(), msg);
    assert!(matches!(
        ret,
        TxExecResult::Reverted(_, _, ExecError::InsufficientBalance)
    ));
    assert_eq!(s.get_balance(&sender), 70u64.into());
    // the message's revision is closed exactly once
    assert_eq!(s.depth(), 0);
    assert_eq!(s.get_nonce(&sender), 2);
}
