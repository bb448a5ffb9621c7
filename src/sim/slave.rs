use crate::at24::{
	AddressMode,
	Geometry,
	DEVICE_BASE,
};

use super::{
	Event,
	WRITE_CYCLE_US,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum AfterAck {
	Receive,
	Transmit,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
	// not addressed; wait for START
	Idle,
	// shifting in a byte on rising CLK
	Receive { shift: u8, bits: u8 },
	// holding DATA low through the ninth clock
	Ack { then: AfterAck },
	// `bits` of `byte` have been put on DATA already
	Transmit { byte: u8, bits: u8 },
	// master acknowledge slot after a transmitted byte
	MasterAck { acked: Option<bool> },
}

#[derive(Debug)]
pub(super) struct Slave {
	pub(super) memory: Vec<u8>,
	pub(super) write_protect: bool,
	pub(super) pull_low: bool,
	geometry: Geometry,
	phase: Phase,
	// bytes received since START
	index: usize,
	// address bytes received since the device select
	address_bytes: usize,
	block: u16,
	pointer: u16,
	pending: Vec<(u16, u8)>,
	busy_until: u64,
}

impl Slave {
	pub(super) fn new(geometry: Geometry) -> Self {
		Slave {
			memory: vec![0xff; geometry.capacity() as usize],
			write_protect: false,
			pull_low: false,
			geometry,
			phase: Phase::Idle,
			index: 0,
			address_bytes: 0,
			block: 0,
			pointer: 0,
			pending: Vec::new(),
			busy_until: 0,
		}
	}

	fn wrap(&self, address: u32) -> u16 {
		(address % self.geometry.capacity()) as u16
	}

	pub(super) fn start(&mut self) {
		// an interrupted write is discarded
		self.pending.clear();
		self.pull_low = false;
		self.index = 0;
		self.phase = Phase::Receive { shift: 0, bits: 0 };
	}

	pub(super) fn stop(&mut self, now: u64) {
		self.pull_low = false;
		self.phase = Phase::Idle;
		if self.pending.is_empty() {
			return;
		}
		if !self.write_protect {
			for &(address, value) in &self.pending {
				self.memory[address as usize] = value;
			}
		}
		self.pending.clear();
		self.busy_until = now + WRITE_CYCLE_US;
	}

	pub(super) fn clock_rise(&mut self, data: bool) {
		let phase = self.phase;
		match phase {
			Phase::Receive { shift, bits } if bits < 8 => {
				self.phase = Phase::Receive {
					shift: shift << 1 | data as u8,
					bits: bits + 1,
				};
			},
			Phase::MasterAck { acked: None } => {
				self.phase = Phase::MasterAck { acked: Some(!data) };
			},
			_ => (),
		}
	}

	pub(super) fn clock_fall(&mut self, now: u64, events: &mut Vec<Event>) {
		let phase = self.phase;
		match phase {
			Phase::Receive { shift, bits: 8 } => {
				match self.accept(shift, now) {
					Some(then) => {
						events.push(Event::Received(shift));
						self.pull_low = true;
						self.phase = Phase::Ack { then };
					},
					None => {
						events.push(Event::Rejected(shift));
						self.phase = Phase::Idle;
					},
				}
			},
			Phase::Ack { then: AfterAck::Receive } => {
				self.pull_low = false;
				self.phase = Phase::Receive { shift: 0, bits: 0 };
			},
			Phase::Ack { then: AfterAck::Transmit } | Phase::MasterAck { acked: Some(true) } => {
				self.load(events);
			},
			Phase::Transmit { byte, bits } if bits < 8 => {
				self.pull_low = 0 == byte & (0x80 >> bits);
				self.phase = Phase::Transmit { byte, bits: bits + 1 };
			},
			Phase::Transmit { .. } => {
				self.pull_low = false;
				self.phase = Phase::MasterAck { acked: None };
			},
			Phase::MasterAck { .. } => {
				// NACK: done sending until the next START
				self.phase = Phase::Idle;
			},
			_ => (),
		}
	}

	// fetch the byte at the address pointer and present its MSB
	fn load(&mut self, events: &mut Vec<Event>) {
		let byte = self.memory[self.pointer as usize];
		events.push(Event::Sent(byte));
		self.pointer = self.wrap(self.pointer as u32 + 1);
		self.pull_low = 0 == byte & 0x80;
		self.phase = Phase::Transmit { byte, bits: 1 };
	}

	// decide whether to acknowledge a received byte
	fn accept(&mut self, byte: u8, now: u64) -> Option<AfterAck> {
		let index = self.index;
		self.index += 1;

		if index == 0 {
			if now < self.busy_until || byte & 0xf0 != DEVICE_BASE {
				return None;
			}
			let block = ((byte >> 1) & 0x07) as u16;
			let selected = match self.geometry.address_mode() {
				AddressMode::SingleByte => (block as u32) << 8 < self.geometry.capacity(),
				// A2..A0 pins tied low
				AddressMode::TwoByte => block == 0,
			};
			if !selected {
				return None;
			}
			if 0 != byte & 0x01 {
				// current address read
				return Some(AfterAck::Transmit);
			}
			self.block = block;
			self.address_bytes = 0;
			return Some(AfterAck::Receive);
		}

		if self.address_bytes < self.geometry.address_mode().address_bytes() {
			let address = match (self.geometry.address_mode(), self.address_bytes) {
				(AddressMode::SingleByte, _) => (self.block as u32) << 8 | byte as u32,
				(AddressMode::TwoByte, 0) => (byte as u32) << 8,
				(AddressMode::TwoByte, _) => self.pointer as u32 | byte as u32,
			};
			self.pointer = self.wrap(address);
			self.address_bytes += 1;
			return Some(AfterAck::Receive);
		}

		self.pending.push((self.pointer, byte));
		self.pointer = self.wrap(self.pointer as u32 + 1);
		Some(AfterAck::Receive)
	}
}
