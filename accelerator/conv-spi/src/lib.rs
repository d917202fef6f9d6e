#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate num_derive;

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

mod bench;
mod block;
mod clock;
mod command;
mod config;
mod driver;
mod error;
mod link;
mod poller;
mod session;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
mod statusbyte;
pub mod traits;
mod verify;

pub use self::{
    bench::{BenchmarkRecorder, BenchmarkTrace, Phase, Throughput},
    block::{BlockKind, BlockLayout, DataBlock, LengthMismatch},
    clock::BitBangClock,
    command::{Command, FILLER},
    config::{Config, FrameTiming, PollConfig, ResetTiming},
    driver::Driver,
    error::DriverError,
    link::SerialLink,
    poller::{PollOutcome, PollSession, PollState},
    session::{Operands, SessionReport},
    statusbyte::StatusByte,
    verify::{verify, Mismatch, VerifyOutcome},
};
