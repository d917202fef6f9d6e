use embedded_hal::digital::{self, ErrorKind};
use mockall::{mock, Sequence};

#[derive(Debug, Clone, Copy)]
pub struct PinError;

impl digital::Error for PinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

mock! {
    #[derive(Debug)]
    pub OutputPin {}

    impl digital::ErrorType for OutputPin {
        type Error = PinError;
    }

    impl digital::OutputPin for OutputPin {
        fn set_low(&mut self) -> Result<(), PinError>;
        fn set_high(&mut self) -> Result<(), PinError>;
    }
}

mock! {
    #[derive(Debug)]
    pub InputPin {}

    impl digital::ErrorType for InputPin {
        type Error = PinError;
    }

    impl digital::InputPin for InputPin {
        fn is_high(&mut self) -> Result<bool, PinError>;
        fn is_low(&mut self) -> Result<bool, PinError>;
    }
}

impl MockOutputPin {
    /// Expect the pin to be driven to each of `levels` in order, `true` being high.
    pub fn expect_levels(&mut self, seq: &mut Sequence, levels: &[bool]) {
        for &level in levels {
            if level {
                self.expect_set_high()
                    .times(1)
                    .in_sequence(seq)
                    .return_const(Ok(()));
            } else {
                self.expect_set_low()
                    .times(1)
                    .in_sequence(seq)
                    .return_const(Ok(()));
            }
        }
    }

    /// Accept any level changes.
    pub fn permissive() -> Self {
        let mut pin = Self::new();
        pin.expect_set_low().return_const(Ok(()));
        pin.expect_set_high().return_const(Ok(()));
        pin
    }
}

impl MockInputPin {
    /// Return the bits of `byte` from `is_high`, most significant bit first.
    pub fn expect_byte(&mut self, seq: &mut Sequence, byte: u8) {
        for i in (0..8).rev() {
            let level = byte & (1 << i) != 0;
            self.expect_is_high()
                .times(1)
                .in_sequence(seq)
                .return_const(Ok(level));
        }
    }

    /// A line that always fails to be sampled.
    pub fn failing() -> Self {
        let mut pin = Self::new();
        pin.expect_is_high().return_const(Err(PinError));
        pin.expect_is_low().return_const(Err(PinError));
        pin
    }
}
