//! 8253/8254 PIT (Programmable Interval Timer) driver.
//!
//! Channel 0 of the PIT is wired to IRQ 0. Programmed as a rate
//! generator it fires a hardware interrupt at `1193182 / divisor` Hz;
//! the kernel's tick counter is incremented by the handler registered on
//! the remapped vector 32.

use crate::port::PortBus;

/// The PIT input clock in Hz. Fixed by the hardware.
pub const INPUT_FREQUENCY_HZ: u32 = 1_193_182;

/// Channel 0 data port.
const CHANNEL0: u16 = 0x40;
/// Mode/command register.
const COMMAND: u16 = 0x43;

/// Command byte: channel 0, access lobyte/hibyte, mode 2 (rate
/// generator), binary counting.
const CHANNEL0_RATE_GENERATOR: u8 = 0x34;

/// An 8253/8254 PIT on the given port bus.
pub struct Pit<B: PortBus> {
    bus: B,
}

impl<B: PortBus> Pit<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Program channel 0 to fire at approximately `hz` interrupts per
    /// second. Returns the actual frequency after divisor rounding.
    ///
    /// The divisor is 16 bits, so the achievable range is roughly
    /// 19 Hz - 1.19 MHz; requests outside it are clamped.
    pub fn set_frequency(&mut self, hz: u32) -> u32 {
        let divisor = Self::divisor_for(hz);
        self.bus.write(COMMAND, CHANNEL0_RATE_GENERATOR);
        self.bus.write(CHANNEL0, (divisor & 0xFF) as u8);
        self.bus.write(CHANNEL0, (divisor >> 8) as u8);
        INPUT_FREQUENCY_HZ / u32::from(divisor)
    }

    fn divisor_for(hz: u32) -> u16 {
        let raw = INPUT_FREQUENCY_HZ / hz.max(1);
        raw.clamp(1, u32::from(u16::MAX)) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingBus {
        writes: Vec<(u16, u8)>,
    }

    impl PortBus for RecordingBus {
        fn read(&mut self, _port: u16) -> u8 {
            0
        }

        fn write(&mut self, port: u16, value: u8) {
            self.writes.push((port, value));
        }
    }

    #[test]
    fn hundred_hertz_programs_expected_divisor() {
        // 1193182 / 100 = 11931 = 0x2E9B.
        let mut pit = Pit::new(RecordingBus { writes: Vec::new() });
        let actual = pit.set_frequency(100);
        assert_eq!(
            pit.bus.writes,
            vec![(COMMAND, 0x34), (CHANNEL0, 0x9B), (CHANNEL0, 0x2E)]
        );
        assert_eq!(actual, 1_193_182 / 11931);
    }

    #[test]
    fn requests_beyond_the_input_clock_clamp_to_divisor_one() {
        let mut pit = Pit::new(RecordingBus { writes: Vec::new() });
        let actual = pit.set_frequency(u32::MAX);
        assert_eq!(
            pit.bus.writes,
            vec![(COMMAND, 0x34), (CHANNEL0, 0x01), (CHANNEL0, 0x00)]
        );
        assert_eq!(actual, INPUT_FREQUENCY_HZ);
    }

    #[test]
    fn very_slow_requests_clamp_to_the_sixteen_bit_divisor() {
        let mut pit = Pit::new(RecordingBus { writes: Vec::new() });
        pit.set_frequency(1);
        assert_eq!(
            pit.bus.writes,
            vec![(COMMAND, 0x34), (CHANNEL0, 0xFF), (CHANNEL0, 0xFF)]
        );
    }
}
