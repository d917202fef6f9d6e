use bitfield::bitfield;

bitfield! {
    /// The status byte returned by the accelerator in a ReadStatus transaction.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct StatusByte(u8);
    impl Debug;
    /// Reserved, ignored by the host
    pub reserved, _: 7, 2;
    /// The last compute pass has completed
    pub done, set_done: 1;
    /// A compute pass is in progress
    pub busy, set_busy: 0;
}

impl StatusByte {
    pub const IDLE: StatusByte = StatusByte(0x00);

    pub fn new(busy: bool, done: bool) -> Self {
        let mut status = Self::IDLE;
        status.set_busy(busy);
        status.set_done(done);
        status
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn can_get_flags() {
        // Given
        let byte = StatusByte(0b1111_1110);

        // Then
        assert!(byte.done());
        assert!(!byte.busy());
        assert_eq!(0b11_1111, byte.reserved());
    }

    #[test]
    fn can_build() {
        assert_eq!(0x01, StatusByte::new(true, false).0);
        assert_eq!(0x02, StatusByte::new(false, true).0);
        assert_eq!(0x03, StatusByte::new(true, true).0);
        assert_eq!(StatusByte::IDLE, StatusByte::new(false, false));
    }
}
