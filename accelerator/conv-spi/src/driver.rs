use alloc::{vec, vec::Vec};
use embedded_hal::digital::{InputPin, OutputPin};

use crate::{
    command::FILLER, link::SerialLink, traits::BusClock, BlockKind, Command, Config,
    DriverError, LengthMismatch, StatusByte,
};

/// Command protocol driver.
///
/// Every operation is one framed transaction: select, command byte, payload, deselect.
/// The driver does not check the order of operations. Starting before the operands are
/// written, starting twice, or reading results before done are caller errors.
pub struct Driver<Clock, Mosi, Miso, Cs>
where
    Clock: BusClock,
    Mosi: OutputPin,
    Miso: InputPin,
    Cs: OutputPin,
{
    pub(crate) link: SerialLink<Clock, Mosi, Miso, Cs>,
    pub(crate) config: Config,
}

impl<Clock, Mosi, Miso, Cs> Driver<Clock, Mosi, Miso, Cs>
where
    Clock: BusClock,
    Mosi: OutputPin,
    Miso: InputPin,
    Cs: OutputPin,
{
    pub const fn new(link: SerialLink<Clock, Mosi, Miso, Cs>, config: Config) -> Self {
        Self { link, config }
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Give the link back to the caller.
    pub fn release(self) -> SerialLink<Clock, Mosi, Miso, Cs> {
        self.link
    }

    /// Park the bus lines before the first transaction.
    pub async fn init(&mut self) -> Result<(), DriverError> {
        self.link.idle().await
    }

    /// Pulse the active low accelerator reset line.
    pub async fn hw_reset<Reset: OutputPin>(
        &mut self,
        reset: &mut Reset,
    ) -> Result<(), DriverError> {
        let timing = self.config.reset;

        debug!("Resetting accelerator");
        reset.set_high().map_err(DriverError::pin)?;
        self.link.delay_ns(timing.pre_ns).await?;
        reset.set_low().map_err(DriverError::pin)?;
        self.link.delay_ns(timing.hold_ns).await?;
        reset.set_high().map_err(DriverError::pin)?;
        self.link.delay_ns(timing.recovery_ns).await?;

        Ok(())
    }

    pub async fn write_weights(&mut self, weights: &[u8]) -> Result<(), DriverError> {
        self.write(Command::WriteWeights, weights).await
    }

    pub async fn write_patch(&mut self, patch: &[u8]) -> Result<(), DriverError> {
        self.write(Command::WritePatch, patch).await
    }

    pub async fn write_biases(&mut self, biases: &[u8]) -> Result<(), DriverError> {
        self.write(Command::WriteBiases, biases).await
    }

    /// Start a compute pass on the last written operands.
    pub async fn start_processing(&mut self) -> Result<(), DriverError> {
        debug!("Sending command 0x{:02x}", Command::StartProcessing.as_u8());

        let body = self.command_frame(Command::StartProcessing).await;
        self.end_frame(body).await?;

        self.link.wait_cycles(self.config.start_settle_cycles).await
    }

    pub async fn read_status(&mut self) -> Result<StatusByte, DriverError> {
        let body = self.read_status_frame().await;
        self.end_frame(body).await
    }

    /// Read the result block.
    pub async fn read_results(&mut self) -> Result<Vec<u8>, DriverError> {
        let mut results = vec![0; self.config.layout.results];
        self.read_results_into(&mut results).await?;
        Ok(results)
    }

    /// Read the result block into `buffer`, which must have the configured result length.
    pub async fn read_results_into(&mut self, buffer: &mut [u8]) -> Result<(), DriverError> {
        let expected = self.config.layout.results;
        if buffer.len() != expected {
            return Err(LengthMismatch {
                block: BlockKind::Results,
                expected,
                actual: buffer.len(),
            }
            .into());
        }

        debug!(
            "Sending command 0x{:02x}, reading {} bytes",
            Command::ReadResults.as_u8(),
            buffer.len()
        );

        let body = self.read_results_frame(buffer).await;
        self.end_frame(body).await
    }

    async fn write(&mut self, command: Command, bytes: &[u8]) -> Result<(), DriverError> {
        assert!(command.is_write());
        if let Some(kind) = command.block() {
            self.config.layout.check(kind, bytes)?;
        }

        debug!(
            "Sending command 0x{:02x} with {} bytes",
            command.as_u8(),
            bytes.len()
        );

        let body = self.write_frame(command, bytes).await;
        self.end_frame(body).await?;

        self.link.wait_cycles(self.config.command_gap_cycles).await
    }

    async fn command_frame(&mut self, command: Command) -> Result<(), DriverError> {
        self.link.assert_select().await?;
        self.link.transfer_byte(command.as_u8()).await?;
        Ok(())
    }

    async fn write_frame(&mut self, command: Command, bytes: &[u8]) -> Result<(), DriverError> {
        self.command_frame(command).await?;
        for &byte in bytes {
            // The accelerator does not acknowledge payload bytes.
            self.link.transfer_byte(byte).await?;
        }
        Ok(())
    }

    async fn read_status_frame(&mut self) -> Result<StatusByte, DriverError> {
        self.command_frame(Command::ReadStatus).await?;
        let status = self.link.transfer_byte(FILLER).await?;
        Ok(StatusByte(status))
    }

    async fn read_results_frame(&mut self, buffer: &mut [u8]) -> Result<(), DriverError> {
        self.command_frame(Command::ReadResults).await?;
        for byte in buffer.iter_mut() {
            *byte = self.link.transfer_byte(FILLER).await?;
        }
        Ok(())
    }

    /// Close the frame opened by a transaction body.
    ///
    /// When the body or the deselect fails, the bus is parked so that chip select is
    /// released and the next transaction starts from an idle link.
    async fn end_frame<T>(&mut self, body: Result<T, DriverError>) -> Result<T, DriverError> {
        let result = match body {
            Ok(value) => self.link.deassert_select().await.map(|()| value),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("Transaction failed: {:?}, releasing the bus", e);
            if self.link.idle().await.is_err() {
                error!("Unable to release the bus");
            }
        }

        result
    }
}
