use failure::Fail;

use super::{
	Direction,
	Hardware,
};

/// How often DATA is sampled while waiting for the receiver to acknowledge
pub const ACK_POLLS: u32 = 250;

// hold time around START/STOP edges
const CONDITION_HOLD_US: u32 = 4;
// setup/hold per data bit
const BIT_US: u32 = 2;
// settle time before sampling an acknowledge, and after sampling a data bit
const SAMPLE_US: u32 = 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Fail)]
#[fail(display = "no acknowledge after {} polls", polls)]
pub struct AckTimeout {
	pub polls: u32,
}

trait InternalLowLevel: Hardware {
	// one full clock cycle with DATA already set up; leaves CLK low
	fn clock_pulse(&mut self) {
		self.delay_us(BIT_US);
		self.set_clock(true);
		self.delay_us(BIT_US);
		self.set_clock(false);
	}

	// acknowledge slot driven by us as receiver
	fn respond(&mut self, ack: bool) {
		self.set_clock(false);
		self.set_data_direction(Direction::Output);
		self.set_data(!ack);
		self.clock_pulse();
	}
}

impl<H: Hardware + ?Sized> InternalLowLevel for H {
}

pub trait LowLevel: Hardware {
	/// Both lines as outputs, released high: the idle bus.
	fn init(&mut self) {
		self.set_data_direction(Direction::Output);
		self.set_clock(true);
		self.set_data(true);
	}

	/// START (or repeated START); leaves CLK low, the bus is claimed.
	fn start(&mut self) {
		self.set_data_direction(Direction::Output);
		self.set_data(true);
		self.set_clock(true);
		self.delay_us(CONDITION_HOLD_US);
		// DATA falls while CLK is high
		self.set_data(false);
		self.delay_us(CONDITION_HOLD_US);
		self.set_clock(false);
	}

	/// STOP; leaves the bus idle (both lines high).
	fn stop(&mut self) {
		self.set_data_direction(Direction::Output);
		self.set_clock(false);
		self.set_data(false);
		self.delay_us(CONDITION_HOLD_US);
		self.set_clock(true);
		// DATA rises while CLK is high
		self.set_data(true);
		self.delay_us(CONDITION_HOLD_US);
	}

	/// Clock the acknowledge slot after a sent byte.
	///
	/// DATA is polled `ACK_POLLS` times; if the receiver never pulls it low
	/// the bus is released with STOP and `AckTimeout` is returned.
	fn wait_ack(&mut self) -> crate::AResult<()> {
		// release DATA before turning it around
		self.set_data(true);
		self.set_data_direction(Direction::Input);
		self.delay_us(SAMPLE_US);
		self.set_clock(true);
		self.delay_us(SAMPLE_US);

		for _ in 0..ACK_POLLS {
			if !self.read_data() {
				self.set_clock(false);
				return Ok(());
			}
		}

		trace!("no acknowledge after {} polls", ACK_POLLS);
		self.stop();
		Err(AckTimeout { polls: ACK_POLLS }.into())
	}

	fn send_ack(&mut self) {
		self.respond(true);
	}

	fn send_nack(&mut self) {
		self.respond(false);
	}

	/// Shift out 8 bits, MSB first. The acknowledge is not handled here.
	fn send_byte(&mut self, value: u8) {
		trace!("send 0x{:02x}", value);
		self.set_data_direction(Direction::Output);
		self.set_clock(false);
		for bit in (0..8).rev() {
			self.set_data(0 != value & (1 << bit));
			self.clock_pulse();
			self.delay_us(BIT_US);
		}
	}

	/// Shift in 8 bits, MSB first, then ACK (`ack == true`) or NACK them.
	fn receive_byte(&mut self, ack: bool) -> u8 {
		self.set_data_direction(Direction::Input);
		let mut value = 0u8;
		for _ in 0..8 {
			self.set_clock(false);
			self.delay_us(BIT_US);
			self.set_clock(true);
			value <<= 1;
			if self.read_data() {
				value |= 1;
			}
			self.delay_us(SAMPLE_US);
		}
		if ack {
			self.send_ack();
		} else {
			self.send_nack();
		}
		trace!("received 0x{:02x} ({})", value, if ack { "ACK" } else { "NACK" });
		value
	}

	fn start_transaction(&mut self) -> Transaction<Self> {
		self.start();

		Transaction {
			hardware: self,
			open: true,
		}
	}
}

impl<H: Hardware + ?Sized> LowLevel for H {
}

/// A claimed bus, between START and STOP.
///
/// STOP is sent exactly once: either by a failed acknowledge wait (which
/// aborts the transaction) or when the transaction gets dropped.
pub struct Transaction<'a, H: ?Sized + LowLevel + 'a> {
	hardware: &'a mut H,
	open: bool,
}

impl<'a, H: ?Sized + LowLevel> Transaction<'a, H> {
	/// Send a byte and require the receiver to acknowledge it
	pub fn write(&mut self, value: u8) -> crate::AResult<()> {
		self.hardware.send_byte(value);
		match self.hardware.wait_ack() {
			Ok(()) => Ok(()),
			Err(e) => {
				// wait_ack already sent STOP
				self.open = false;
				Err(e)
			},
		}
	}

	/// Receive a byte; `ack` asks the transmitter to continue.
	pub fn read(&mut self, ack: bool) -> u8 {
		self.hardware.receive_byte(ack)
	}

	/// Repeated START without releasing the bus
	pub fn restart(&mut self) {
		self.hardware.start();
	}

	pub fn finish(self) {
	}
}

impl<'a, H: ?Sized + LowLevel> Drop for Transaction<'a, H> {
	fn drop(&mut self) {
		if self.open {
			self.hardware.stop();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::at24::Chip;
	use crate::sim::{
		Event,
		SimBus,
	};

	#[test]
	fn init_idles_bus() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.init();
		assert!(bus.is_idle());
		assert!(bus.events().is_empty());
	}

	#[test]
	fn start_and_stop_conditions() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.init();
		bus.start();
		assert!(!bus.clock_level());
		assert!(!bus.is_idle());
		bus.stop();
		assert!(bus.is_idle());
		assert_eq!(bus.events(), &[Event::Start, Event::Stop]);
	}

	#[test]
	fn condition_hold_times() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.init();
		let before = bus.elapsed_us();
		bus.start();
		assert!(bus.elapsed_us() - before >= 2 * CONDITION_HOLD_US as u64);
		let before = bus.elapsed_us();
		bus.stop();
		assert!(bus.elapsed_us() - before >= 2 * CONDITION_HOLD_US as u64);
	}

	#[test]
	fn device_acknowledges_its_select_byte() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.init();
		bus.start();
		bus.send_byte(0xa0);
		bus.wait_ack().unwrap();
		bus.stop();
		assert_eq!(bus.events(), &[Event::Start, Event::Received(0xa0), Event::Stop]);
		assert!(bus.is_idle());
	}

	#[test]
	fn send_byte_spends_three_bit_delays_per_bit() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.init();
		bus.start();
		let before = bus.elapsed_us();
		bus.send_byte(0xa0);
		assert_eq!(bus.elapsed_us() - before, 8 * 3 * BIT_US as u64);
		bus.wait_ack().unwrap();
		bus.stop();
	}

	#[test]
	fn foreign_select_byte_times_out() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.init();
		bus.start();
		let before = bus.elapsed_us();
		bus.send_byte(0x5a);
		assert_eq!(bus.elapsed_us() - before, 8 * 3 * BIT_US as u64);
		assert!(bus.wait_ack().is_err());
		assert!(bus.is_idle());
		assert_eq!(bus.events(), &[Event::Start, Event::Rejected(0x5a), Event::Stop]);
	}

	#[test]
	fn ack_timeout_releases_bus() {
		let mut bus = SimBus::absent();
		bus.init();
		bus.start();
		bus.send_byte(0xa0);

		let reads = bus.data_reads();
		let err = bus.wait_ack().unwrap_err();
		assert_eq!(bus.data_reads() - reads, ACK_POLLS as u64);
		assert_eq!(err.downcast_ref::<AckTimeout>(), Some(&AckTimeout { polls: ACK_POLLS }));

		assert!(bus.clock_level());
		assert!(bus.data_level());
		assert!(bus.is_idle());
		assert_eq!(bus.events(), &[Event::Start, Event::Stop]);
	}

	#[test]
	fn failed_transaction_stops_once() {
		let mut bus = SimBus::absent();
		bus.init();
		{
			let mut tx = bus.start_transaction();
			assert!(tx.write(0xa0).is_err());
		}
		assert_eq!(bus.events(), &[Event::Start, Event::Stop]);
	}

	#[test]
	fn dropped_transaction_stops() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.init();
		{
			let mut tx = bus.start_transaction();
			tx.write(0xa0).unwrap();
		}
		assert!(bus.is_idle());
		assert_eq!(bus.events(), &[Event::Start, Event::Received(0xa0), Event::Stop]);
	}

	#[test]
	fn random_read_with_repeated_start() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.memory_mut()[0x42] = 0xc3;
		bus.init();
		{
			let mut tx = bus.start_transaction();
			tx.write(0xa0).unwrap();
			tx.write(0x42).unwrap();
			tx.restart();
			tx.write(0xa1).unwrap();
			assert_eq!(tx.read(false), 0xc3);
			tx.finish();
		}
		assert_eq!(bus.events(), &[
			Event::Start,
			Event::Received(0xa0),
			Event::Received(0x42),
			Event::RepeatedStart,
			Event::Received(0xa1),
			Event::Sent(0xc3),
			Event::Stop,
		]);
		assert!(bus.is_idle());
	}

	#[test]
	fn acknowledged_receive_continues_sequentially() {
		let mut bus = SimBus::new(Chip::At24c02.geometry());
		bus.memory_mut()[0x10] = 0x01;
		bus.memory_mut()[0x11] = 0x80;
		bus.init();
		{
			let mut tx = bus.start_transaction();
			tx.write(0xa0).unwrap();
			tx.write(0x10).unwrap();
			tx.restart();
			tx.write(0xa1).unwrap();
			assert_eq!(tx.read(true), 0x01);
			assert_eq!(tx.read(false), 0x80);
		}
		assert!(bus.is_idle());
	}
}
