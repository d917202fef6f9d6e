use num_traits::FromPrimitive;

use crate::BlockKind;

/// Don't-care byte clocked out while a status or result byte is clocked in.
pub const FILLER: u8 = 0xAA;

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Load the convolution kernels
    WriteWeights = 0x01,
    /// Load the input patch
    WritePatch = 0x02,
    /// Load one bias per output channel
    WriteBiases = 0x03,
    /// Start a compute pass on whatever was last written
    StartProcessing = 0x10,
    /// Read the status byte
    ReadStatus = 0x20,
    /// Read the result block
    ReadResults = 0x30,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::WriteWeights,
        Command::WritePatch,
        Command::WriteBiases,
        Command::StartProcessing,
        Command::ReadStatus,
        Command::ReadResults,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a command byte, `None` for codes outside the vocabulary.
    pub fn from_u8(code: u8) -> Option<Self> {
        FromPrimitive::from_u8(code)
    }

    /// The data block carried in the payload of this command, if any.
    pub const fn block(self) -> Option<BlockKind> {
        match self {
            Command::WriteWeights => Some(BlockKind::Weights),
            Command::WritePatch => Some(BlockKind::Patch),
            Command::WriteBiases => Some(BlockKind::Biases),
            Command::ReadResults => Some(BlockKind::Results),
            Command::StartProcessing | Command::ReadStatus => None,
        }
    }

    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Command::WriteWeights | Command::WritePatch | Command::WriteBiases
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes() {
        assert_eq!(0x01, Command::WriteWeights.as_u8());
        assert_eq!(0x02, Command::WritePatch.as_u8());
        assert_eq!(0x03, Command::WriteBiases.as_u8());
        assert_eq!(0x10, Command::StartProcessing.as_u8());
        assert_eq!(0x20, Command::ReadStatus.as_u8());
        assert_eq!(0x30, Command::ReadResults.as_u8());
    }

    #[test]
    fn codes_are_distinct() {
        for (i, a) in Command::ALL.iter().enumerate() {
            for b in &Command::ALL[i + 1..] {
                assert_ne!(a.as_u8(), b.as_u8());
            }
        }
    }

    #[test]
    fn can_decode() {
        for command in Command::ALL {
            assert_eq!(Some(command), Command::from_u8(command.as_u8()));
        }
        assert_eq!(None, Command::from_u8(0x00));
        assert_eq!(None, Command::from_u8(FILLER));
    }

    #[test]
    fn payload_blocks() {
        assert_eq!(Some(BlockKind::Weights), Command::WriteWeights.block());
        assert_eq!(Some(BlockKind::Results), Command::ReadResults.block());
        assert_eq!(None, Command::StartProcessing.block());
        assert!(Command::WriteBiases.is_write());
        assert!(!Command::ReadResults.is_write());
    }
}
