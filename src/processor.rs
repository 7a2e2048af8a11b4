//! Applies messages to a world state, one at a time. See [crate::core] for
//! how a single message is interpreted.

use log::info;

use crate::abi::decode_words;
use crate::common::{Addr, Bytes, Gas, U256};
use crate::core::{
    execute, ExecError, LogEntry, Message, Status, Target, TxExecEnv,
    TxExecResult, WorldState,
};

/// Outcome of one applied message.
#[derive(Clone, Debug)]
pub struct Receipt {
    pub status: Status,
    pub output: Bytes,
    /// Includes the intrinsic charge.
    pub gas_used: Gas,
    /// Address of the account a successful creation installed code at.
    pub created: Option<Addr>,
    /// Logs of the frames that took effect, in emission order. Empty unless
    /// the message succeeded.
    pub logs: Vec<LogEntry>,
    /// Why the message failed.
    pub error: Option<ExecError>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == Status::Success
    }

    /// The output read as 32-byte words.
    pub fn words(&self) -> Vec<U256> {
        decode_words(&self.output)
    }
}

/// Charge the intrinsic gas and run `msg` to completion.
///
/// A budget below the intrinsic charge fails with [Status::OutOfGas] and
/// leaves `state` untouched. Otherwise everything the message did takes
/// effect if it succeeded and is rolled back if it did not, except the
/// increment of the sender's nonce.
pub fn run_message<S: WorldState>(
    state: &mut S, env: &TxExecEnv, intrinsic_gas: Gas, mut msg: Message,
) -> Receipt {
    let budget = msg.gas;
    let to = match &msg.target {
        Target::Call(addr) => Some(addr.clone()),
        Target::Create => None,
    };
    if budget < intrinsic_gas {
        info!(
            "message from {} rejected: gas {} < intrinsic {}",
            msg.sender, budget, intrinsic_gas
        );
        return Receipt {
            status: Status::OutOfGas,
            output: Bytes::empty(),
            gas_used: budget,
            created: None,
            logs: Vec::new(),
            error: Some(ExecError::OutOfGas),
        }
    }
    msg.gas = budget - intrinsic_gas;
    let sender = msg.sender.clone();
    let ret = execute(state, env, msg);
    let gas_used = budget - ret.gas_left();
    let status = ret.status();
    match ret {
        TxExecResult::Succeeded(output, _, created, logs) => {
            info!(
                "message from {} to {:?} committed (gas used = {}, logs = {})",
                sender,
                to,
                gas_used,
                logs.len()
            );
            Receipt {
                status,
                output,
                gas_used,
                created,
                logs,
                error: None,
            }
        }
        TxExecResult::Reverted(output, _, err) => {
            info!(
                "message from {} to {:?} rolled back: {:?} (gas used = {})",
                sender, to, err, gas_used
            );
            Receipt {
                status,
                output,
                gas_used,
                created: None,
                logs: Vec::new(),
                error: Some(err),
            }
        }
    }
}
