#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockKind {
    Weights,
    Patch,
    Biases,
    Results,
}

/// Expected length in bytes of each data block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    /// Output-channel-major, then row-major, then column-major
    pub weights: usize,
    /// Row-major
    pub patch: usize,
    pub biases: usize,
    pub results: usize,
}

/// A data block does not have its declared length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LengthMismatch {
    pub block: BlockKind,
    pub expected: usize,
    pub actual: usize,
}

impl BlockLayout {
    /// 5 filters of 5x5 16 bit weights, a 5x5 8 bit patch and 5 16 bit biases and results.
    pub const REFERENCE: BlockLayout = BlockLayout {
        weights: 250,
        patch: 25,
        biases: 10,
        results: 10,
    };

    pub const fn len(&self, kind: BlockKind) -> usize {
        match kind {
            BlockKind::Weights => self.weights,
            BlockKind::Patch => self.patch,
            BlockKind::Biases => self.biases,
            BlockKind::Results => self.results,
        }
    }

    /// Verify that `bytes` has the length declared for `kind`.
    pub fn check(&self, kind: BlockKind, bytes: &[u8]) -> Result<(), LengthMismatch> {
        let expected = self.len(kind);
        if bytes.len() != expected {
            return Err(LengthMismatch {
                block: kind,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(())
    }
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// A length-checked operand or result block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataBlock<'a> {
    kind: BlockKind,
    bytes: &'a [u8],
}

impl<'a> DataBlock<'a> {
    pub fn new(
        kind: BlockKind,
        bytes: &'a [u8],
        layout: &BlockLayout,
    ) -> Result<Self, LengthMismatch> {
        layout.check(kind, bytes)?;
        Ok(Self { kind, bytes })
    }

    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for DataBlock<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}
