//! End-to-end run of the protocol with timing capture and verification.
//!
//! Sequence          Phase boundary
//! (start)           SessionStart
//! WriteWeights
//! WritePatch
//! WriteBiases       LoadComplete
//! StartProcessing   StartIssued
//! ReadStatus *      DoneObserved
//! ReadResults       ResultsRead

use alloc::vec::Vec;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::{
    bench::{BenchmarkRecorder, BenchmarkTrace, Phase},
    traits::BusClock,
    verify, BlockKind, DataBlock, Driver, DriverError, VerifyOutcome,
};

/// The pre-quantized operands of one session.
#[derive(Clone, Copy, Debug)]
pub struct Operands<'a> {
    pub weights: &'a [u8],
    pub patch: &'a [u8],
    pub biases: &'a [u8],
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub results: Vec<u8>,
    pub outcome: VerifyOutcome,
    pub trace: BenchmarkTrace,
    /// Status reads until done
    pub polls: u32,
}

impl SessionReport {
    pub fn passed(&self) -> bool {
        self.outcome.passed()
    }

    /// Fail the run if the results differ from the reference.
    pub fn check(&self) -> Result<(), DriverError> {
        if self.passed() {
            Ok(())
        } else {
            Err(DriverError::Verification {
                mismatches: self.outcome.mismatch_count(),
            })
        }
    }
}

impl<Clock, Mosi, Miso, Cs> Driver<Clock, Mosi, Miso, Cs>
where
    Clock: BusClock,
    Mosi: OutputPin,
    Miso: InputPin,
    Cs: OutputPin,
{
    /// Load the operands, compute, wait for done, read and verify the results.
    ///
    /// All block lengths are checked before the first byte is sent. A timeout aborts the
    /// session without reading results. A result mismatch is reported in the returned report,
    /// see [`SessionReport::check`].
    pub async fn run_session(
        &mut self,
        operands: &Operands<'_>,
        expected: &[u8],
    ) -> Result<SessionReport, DriverError> {
        let layout = self.config.layout;
        let weights = DataBlock::new(BlockKind::Weights, operands.weights, &layout)?;
        let patch = DataBlock::new(BlockKind::Patch, operands.patch, &layout)?;
        let biases = DataBlock::new(BlockKind::Biases, operands.biases, &layout)?;
        let expected = DataBlock::new(BlockKind::Results, expected, &layout)?;

        let mut recorder = BenchmarkRecorder::new();
        recorder.record(Phase::SessionStart, self.link.now_ns());

        info!("Loading weights");
        self.write_weights(weights.bytes()).await?;
        info!("Loading patch");
        self.write_patch(patch.bytes()).await?;
        info!("Loading biases");
        self.write_biases(biases.bytes()).await?;
        recorder.record(Phase::LoadComplete, self.link.now_ns());

        info!("Starting processing");
        self.start_processing().await?;
        recorder.record(Phase::StartIssued, self.link.now_ns());

        let polls = self.wait_done().await?.into_result()?;
        recorder.record(Phase::DoneObserved, self.link.now_ns());

        info!("Reading results");
        let results = self.read_results().await?;
        recorder.record(Phase::ResultsRead, self.link.now_ns());

        let outcome = verify(&results, expected.bytes())?;
        for mismatch in &outcome.mismatches {
            error!(
                "Byte {}: observed 0x{:02x}, expected 0x{:02x}",
                mismatch.index,
                mismatch.observed,
                mismatch.expected
            );
        }
        if outcome.passed() {
            info!("All {} result bytes match the reference", outcome.compared);
        } else {
            error!("{} of {} result bytes differ", outcome.mismatch_count(), outcome.compared);
        }

        let trace = recorder.finish();
        if let Some(total) = trace.total_time() {
            info!("Total time: {} ns", total.as_nanos() as u64);
        }
        if let Some(latency) = trace.core_latency() {
            info!("Core latency: {} ns", latency.as_nanos() as u64);
        }

        Ok(SessionReport {
            results,
            outcome,
            trace,
            polls,
        })
    }
}
