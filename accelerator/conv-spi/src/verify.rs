use alloc::vec::Vec;

use crate::{BlockKind, LengthMismatch};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mismatch {
    pub index: usize,
    pub observed: u8,
    pub expected: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// Number of bytes compared
    pub compared: usize,
    /// Every differing position, in index order
    pub mismatches: Vec<Mismatch>,
}

impl VerifyOutcome {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn mismatch_count(&self) -> usize {
        self.mismatches.len()
    }
}

/// Compare an observed result block against the reference, byte for byte.
///
/// Blocks of different length are not compared at all.
pub fn verify(observed: &[u8], expected: &[u8]) -> Result<VerifyOutcome, LengthMismatch> {
    if observed.len() != expected.len() {
        return Err(LengthMismatch {
            block: BlockKind::Results,
            expected: expected.len(),
            actual: observed.len(),
        });
    }

    let mismatches = observed
        .iter()
        .zip(expected)
        .enumerate()
        .filter(|(_, (observed, expected))| observed != expected)
        .map(|(index, (&observed, &expected))| Mismatch {
            index,
            observed,
            expected,
        })
        .collect();

    Ok(VerifyOutcome {
        compared: expected.len(),
        mismatches,
    })
}
