//! Byte access to AT24Cxx serial EEPROMs over the bit-banged bus
//!
//! Random read:
//! - START, device select (write), address byte(s)
//! - repeated START, device select (read), receive one byte, NACK, STOP
//!
//! Byte write:
//! - START, device select (write), address byte(s), data byte, STOP
//! - the device then runs its internal write cycle and ignores the bus
//!
//! Parts up to 2 KiB take a single address byte; the address bits above
//! that go into the block bits of the device select byte. Bigger parts take
//! two address bytes, high byte first.
//!
//! Every operation comes in two flavours: `try_*` reports bus failures, the
//! plain one logs them and returns whatever the bus delivered (0xff for a
//! byte nobody drove).

mod chip;

pub use self::chip::{
	AddressMode,
	Chip,
	Geometry,
	DEVICE_BASE,
	SINGLE_BYTE_LIMIT,
};

use crate::i2c::{
	Hardware,
	LowLevel,
	Transaction,
};

/// Value stored in the last byte of the device to mark it as initialized
pub const PRESENCE_SENTINEL: u8 = 0x55;

/// Time the device needs to finish its internal write cycle
pub const WRITE_CYCLE_MS: u32 = 10;

// what a released DATA line reads as
const FLOATING_BYTE: u8 = 0xff;

/// Width of an integer stored with `write_len` / read with `read_len`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Length {
	Two,
	Four,
}

impl Length {
	pub fn from_bytes(bytes: usize) -> crate::AResult<Self> {
		match bytes {
			2 => Ok(Length::Two),
			4 => Ok(Length::Four),
			_ => bail!("unsupported integer length {} (expected 2 or 4)", bytes),
		}
	}

	pub fn bytes(self) -> usize {
		match self {
			Length::Two => 2,
			Length::Four => 4,
		}
	}
}

fn send_address<H: ?Sized + LowLevel>(tx: &mut Transaction<H>, geometry: Geometry, address: u16) -> crate::AResult<()> {
	let select = geometry.device_select(address, false);
	with_context!(("device select 0x{:02x}", select), tx.write(select))?;
	if geometry.address_mode() == AddressMode::TwoByte {
		with_context!(("address high byte 0x{:02x}", address >> 8), tx.write((address >> 8) as u8))?;
	}
	with_context!(("address low byte 0x{:02x}", address & 0xff), tx.write(address as u8))?;
	Ok(())
}

fn swallow<T>(what: &str, result: crate::AResult<T>, fallback: T) -> T {
	match result {
		Ok(v) => v,
		Err(e) => {
			warn!("{} failed: {}", what, e);
			fallback
		},
	}
}

pub struct Eeprom<H: Hardware> {
	hardware: H,
	geometry: Geometry,
}

impl<H: Hardware> Eeprom<H> {
	/// Takes over the bus lines and puts the bus into idle state.
	pub fn new(hardware: H, geometry: Geometry) -> Self {
		let mut eeprom = Eeprom {
			hardware,
			geometry,
		};
		eeprom.init();
		eeprom
	}

	/// Release both lines high (idle bus)
	pub fn init(&mut self) {
		self.hardware.init();
	}

	pub fn geometry(&self) -> Geometry {
		self.geometry
	}

	pub fn hardware(&mut self) -> &mut H {
		&mut self.hardware
	}

	pub fn into_inner(self) -> H {
		self.hardware
	}

	fn read_transaction(&mut self, address: u16) -> crate::AResult<u8> {
		let geometry = self.geometry;
		let mut tx = self.hardware.start_transaction();
		send_address(&mut tx, geometry, address)?;
		tx.restart();
		let select = geometry.device_select(address, true);
		with_context!(("device select 0x{:02x}", select), tx.write(select))?;
		// single byte: NACK tells the device to stop sending
		let value = tx.read(false);
		tx.finish();
		Ok(value)
	}

	fn write_transaction(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		let geometry = self.geometry;
		let mut tx = self.hardware.start_transaction();
		send_address(&mut tx, geometry, address)?;
		with_context!(("data byte 0x{:02x}", value), tx.write(value))?;
		tx.finish();
		Ok(())
	}

	pub fn try_read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		self.geometry.check_range(address, 1)?;
		let value = with_context!(("read at 0x{:04x}", address), self.read_transaction(address))?;
		debug!("read 0x{:04x}: 0x{:02x}", address, value);
		Ok(value)
	}

	pub fn read_byte(&mut self, address: u16) -> u8 {
		let result = self.try_read_byte(address);
		swallow("read_byte", result, FLOATING_BYTE)
	}

	/// Write one byte and wait for the write cycle to finish.
	///
	/// The write cycle delay also happens if the device didn't acknowledge;
	/// it might still have latched the data.
	pub fn try_write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		self.geometry.check_range(address, 1)?;
		debug!("write 0x{:04x}: 0x{:02x}", address, value);
		let result = with_context!(("write at 0x{:04x}", address), self.write_transaction(address, value));
		self.hardware.delay_ms(WRITE_CYCLE_MS);
		result
	}

	pub fn write_byte(&mut self, address: u16, value: u8) {
		let result = self.try_write_byte(address, value);
		swallow("write_byte", result, ())
	}

	/// Store the low `length` bytes of `value`, least significant byte at
	/// `address`. Bytes are written one by one: a failure in between leaves
	/// a mix of old and new bytes.
	pub fn try_write_len(&mut self, address: u16, value: u32, length: Length) -> crate::AResult<()> {
		self.geometry.check_range(address, length.bytes())?;
		for i in 0..length.bytes() {
			self.try_write_byte(address + i as u16, (value >> (8 * i)) as u8)?;
		}
		Ok(())
	}

	pub fn write_len(&mut self, address: u16, value: u32, length: Length) {
		if let Err(e) = self.geometry.check_range(address, length.bytes()) {
			warn!("write_len failed: {}", e);
			return;
		}
		for i in 0..length.bytes() {
			self.write_byte(address + i as u16, (value >> (8 * i)) as u8);
		}
	}

	/// Inverse of `try_write_len`
	pub fn try_read_len(&mut self, address: u16, length: Length) -> crate::AResult<u32> {
		self.geometry.check_range(address, length.bytes())?;
		let mut value = 0u32;
		// most significant (highest address) first
		for i in (0..length.bytes()).rev() {
			value = (value << 8) | self.try_read_byte(address + i as u16)? as u32;
		}
		Ok(value)
	}

	pub fn read_len(&mut self, address: u16, length: Length) -> u32 {
		if let Err(e) = self.geometry.check_range(address, length.bytes()) {
			warn!("read_len failed: {}", e);
			return 0;
		}
		let mut value = 0u32;
		for i in (0..length.bytes()).rev() {
			value = (value << 8) | self.read_byte(address + i as u16) as u32;
		}
		value
	}

	/// Read `count` bytes starting at `address`, one random read per byte.
	pub fn try_read(&mut self, address: u16, count: usize) -> crate::AResult<Vec<u8>> {
		self.geometry.check_range(address, count)?;
		let mut buf = Vec::with_capacity(count);
		for i in 0..count {
			buf.push(self.try_read_byte(address + i as u16)?);
		}
		Ok(buf)
	}

	pub fn read(&mut self, address: u16, count: usize) -> Vec<u8> {
		if let Err(e) = self.geometry.check_range(address, count) {
			warn!("read failed: {}", e);
			// never more than the device could have delivered
			let available = (self.geometry.capacity() as usize).saturating_sub(address as usize);
			return vec![FLOATING_BYTE; count.min(available)];
		}
		(0..count).map(|i| self.read_byte(address + i as u16)).collect()
	}

	/// Write `data` starting at `address`, one byte write per byte.
	pub fn try_write(&mut self, address: u16, data: &[u8]) -> crate::AResult<()> {
		self.geometry.check_range(address, data.len())?;
		for (i, b) in data.iter().enumerate() {
			self.try_write_byte(address + i as u16, *b)?;
		}
		Ok(())
	}

	pub fn write(&mut self, address: u16, data: &[u8]) {
		if let Err(e) = self.geometry.check_range(address, data.len()) {
			warn!("write failed: {}", e);
			return;
		}
		for (i, b) in data.iter().enumerate() {
			self.write_byte(address + i as u16, *b);
		}
	}

	/// Detect the device through the sentinel in its last byte.
	///
	/// A blank device gets the sentinel written on the first call, so only
	/// a device that doesn't respond or doesn't keep the value is reported
	/// as missing.
	pub fn check_presence(&mut self) -> bool {
		let address = self.geometry.last_address();
		if self.read_byte(address) == PRESENCE_SENTINEL {
			return true;
		}
		info!("no presence sentinel at 0x{:04x}, writing it", address);
		self.write_byte(address, PRESENCE_SENTINEL);
		self.read_byte(address) == PRESENCE_SENTINEL
	}

	pub fn try_check_presence(&mut self) -> crate::AResult<()> {
		let address = self.geometry.last_address();
		let value = self.try_read_byte(address)?;
		if value == PRESENCE_SENTINEL {
			return Ok(());
		}
		info!("no presence sentinel at 0x{:04x} (found 0x{:02x}), writing it", address, value);
		self.try_write_byte(address, PRESENCE_SENTINEL)?;
		let value = self.try_read_byte(address)?;
		ensure!(value == PRESENCE_SENTINEL,
			"presence sentinel didn't stick at 0x{:04x}: read back 0x{:02x}", address, value
		);
		Ok(())
	}
}
