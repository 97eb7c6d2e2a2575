use bitflags::bitflags;

bitflags! {
    /// R1 status byte returned after most commands.
    ///
    /// Bit 7 is always 0 in a valid response; the response poll keys on that.
    /// An all-clear (empty) value means the card is ready.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct R1Status: u8 {
        const IDLE = 1 << 0;                 /* in idle state, initialising */
        const ERASE_RESET = 1 << 1;
        const ILLEGAL_COMMAND = 1 << 2;
        const COM_CRC_ERROR = 1 << 3;
        const ERASE_SEQUENCE_ERROR = 1 << 4;
        const ADDRESS_ERROR = 1 << 5;
        const PARAMETER_ERROR = 1 << 6;
    }
}

impl R1Status {
    /// True when no error or idle flag is set.
    pub fn is_ready(self) -> bool {
        self.is_empty()
    }
}
