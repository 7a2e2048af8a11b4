//! # qledger: a deterministic contract-execution ledger
//!
//! qledger keeps a set of accounts (balance, nonce, storage, code) and applies
//! messages to them. A message either calls an account, running its code, or
//! creates one from init code. Code runs on a 256-bit stack machine with
//! strict gas accounting, and may in turn call other accounts, so a message
//! unfolds into a stack of frames.
//!
//! # Overview
//! The crate is layered so that each piece can be used on its own:
//!
//! - [core]: the interpreter. [core::execute] runs one message against
//!   anything that implements [core::WorldState], in a non-recursive fashion:
//!   frames live on a heap-allocated call stack and switch in place.
//! - [state]: [state::MemState], an in-memory world state with nested
//!   revisions.
//! - [processor]: charges intrinsic gas, runs a message and turns the outcome
//!   into a [processor::Receipt].
//! - [block]: block height, time and rewards.
//! - [ledger]: [ledger::Ledger], which ties the above together behind a lock,
//!   together with snapshots and the [ledger::Compiler] boundary.
//! - [abi]: the call data layout (function id plus width-tagged arguments).
//! - [common]: basic types shared by everything else.
//!
//! # Atomicity
//! Every frame runs inside a revision of the world state. A frame that
//! returns normally folds its revision into its parent's; a frame that
//! reverts, runs out of gas or otherwise fails drops it, undoing every write
//! made by the frame and by all of its children. Self-destructs and logs
//! follow the same discipline: they are held by the frame that produced them
//! and only take effect if every frame on the way back to the root returns.
//!
//! # Revisions instead of a journal
//! [state::MemState] does not journal writes to play them back on a revert.
//! Writes go in place into the topmost revision, a snapshot stacks a fresh
//! revision on top, a rollback drops revisions and a commit squashes them
//! into the one below. Lookups walk down the stack until they hit a recorded
//! value. Snapshots are therefore O(1), rollbacks cost nothing beyond freeing
//! the dropped deltas, and the stack itself is the journal. The price is a
//! lookup walk that grows with the nesting depth, which in practice is
//! bounded by the call depth of the message being run.
//!
//! Snapshot tokens are checked: reverting to a token that has already been
//! used, or that an older revert has invalidated, fails with
//! [error::SnapshotError::Stale] rather than touching the state.
//!
//! See `demos/hello-world.rs` for a small end-to-end example.

#[macro_use] extern crate num_derive;

pub mod common;
pub mod abi;
pub mod block;
pub mod config;
pub mod core;
pub mod error;
pub mod ledger;
pub mod processor;
pub mod state;

pub use ledger::{Compiler, Ledger};
