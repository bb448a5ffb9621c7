//! Software model of an AT24Cxx device sitting on the two bus lines
//!
//! `SimBus` implements the line and delay capabilities: it decodes START,
//! STOP and data bits from the line edges the master produces, answers like
//! the real part (including NACKs during the internal write cycle) and
//! records what happened on the bus. Time is virtual; delays only advance a
//! counter.
//!
//! DATA is modelled as a wired AND: the device can only pull it low, the
//! master drives it only while its side is an output.

mod slave;

use crate::at24::Geometry;
use crate::i2c::{
	Delay,
	Direction,
	Lines,
};

use self::slave::Slave;

/// Time the simulated device stays busy after a write
pub const WRITE_CYCLE_US: u64 = 5_000;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Event {
	/// START on an idle bus
	Start,
	/// START while a transaction is in progress
	RepeatedStart,
	Stop,
	/// byte shifted in and acknowledged by the device
	Received(u8),
	/// byte shifted out by the device
	Sent(u8),
	/// byte shifted in but not acknowledged by the device
	Rejected(u8),
}

#[derive(Debug)]
pub struct SimBus {
	clock: bool,
	latch: bool,
	direction: Direction,
	prev_clock: bool,
	prev_data: bool,
	busy: bool,
	now_us: u64,
	data_reads: u64,
	events: Vec<Event>,
	slave: Option<Slave>,
}

impl SimBus {
	fn with_slave(slave: Option<Slave>) -> Self {
		SimBus {
			clock: true,
			latch: true,
			direction: Direction::Output,
			prev_clock: true,
			prev_data: true,
			busy: false,
			now_us: 0,
			data_reads: 0,
			events: Vec::new(),
			slave,
		}
	}

	/// Blank device (all bytes 0xff)
	pub fn new(geometry: Geometry) -> Self {
		Self::with_slave(Some(Slave::new(geometry)))
	}

	/// Nothing connected: DATA is never pulled low
	pub fn absent() -> Self {
		Self::with_slave(None)
	}

	/// Device acknowledges writes but doesn't store them (WP pin tied high)
	pub fn set_write_protect(&mut self, write_protect: bool) {
		if let Some(slave) = self.slave.as_mut() {
			slave.write_protect = write_protect;
		}
	}

	pub fn memory(&self) -> &[u8] {
		match &self.slave {
			Some(slave) => &slave.memory,
			None => &[],
		}
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		match &mut self.slave {
			Some(slave) => &mut slave.memory,
			None => &mut [],
		}
	}

	pub fn events(&self) -> &[Event] {
		&self.events
	}

	pub fn clear_events(&mut self) {
		self.events.clear();
	}

	/// number of DATA samples taken by the master
	pub fn data_reads(&self) -> u64 {
		self.data_reads
	}

	pub fn elapsed_us(&self) -> u64 {
		self.now_us
	}

	pub fn clock_level(&self) -> bool {
		self.clock
	}

	pub fn data_level(&self) -> bool {
		let master = self.direction == Direction::Input || self.latch;
		let device = self.slave.as_ref().map_or(true, |s| !s.pull_low);
		master && device
	}

	/// Both lines high and no transaction open
	pub fn is_idle(&self) -> bool {
		!self.busy && self.clock_level() && self.data_level()
	}

	// evaluate the line change the master just made
	fn settle(&mut self) {
		let clock = self.clock;
		let data = self.data_level();
		let now = self.now_us;

		if clock != self.prev_clock {
			if let Some(slave) = self.slave.as_mut() {
				if clock {
					slave.clock_rise(data);
				} else {
					slave.clock_fall(now, &mut self.events);
				}
			}
		} else if clock && data != self.prev_data {
			if data {
				self.busy = false;
				self.events.push(Event::Stop);
				if let Some(slave) = self.slave.as_mut() {
					slave.stop(now);
				}
			} else {
				let event = if self.busy { Event::RepeatedStart } else { Event::Start };
				self.busy = true;
				self.events.push(event);
				if let Some(slave) = self.slave.as_mut() {
					slave.start();
				}
			}
		}

		self.prev_clock = clock;
		// the device may have reacted to a falling clock
		self.prev_data = self.data_level();
	}
}

impl Lines for SimBus {
	fn set_clock(&mut self, high: bool) {
		self.clock = high;
		self.settle();
	}

	fn set_data(&mut self, high: bool) {
		self.latch = high;
		self.settle();
	}

	fn set_data_direction(&mut self, direction: Direction) {
		self.direction = direction;
		self.settle();
	}

	fn read_data(&mut self) -> bool {
		self.data_reads += 1;
		self.data_level()
	}
}

impl Delay for SimBus {
	fn delay_us(&mut self, us: u32) {
		self.now_us += us as u64;
	}

	fn delay_ms(&mut self, ms: u32) {
		self.now_us += ms as u64 * 1000;
	}
}
