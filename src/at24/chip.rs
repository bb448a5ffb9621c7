use std::fmt;
use std::str;

/// Upper nibble of every device select byte
pub const DEVICE_BASE: u8 = 0xa0;

/// Largest capacity that still fits its address into one byte plus the
/// three block bits of the device select byte.
pub const SINGLE_BYTE_LIMIT: u32 = 2048;

const MAX_CAPACITY: u32 = 0x1_0000;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum AddressMode {
	/// one address byte; bits 8..10 travel in the device select byte
	SingleByte,
	/// two address bytes (high byte first) after a plain device select
	TwoByte,
}

impl AddressMode {
	pub const fn for_capacity(capacity: u32) -> Self {
		if capacity <= SINGLE_BYTE_LIMIT {
			AddressMode::SingleByte
		} else {
			AddressMode::TwoByte
		}
	}

	/// number of address bytes following the device select byte
	pub fn address_bytes(self) -> usize {
		match self {
			AddressMode::SingleByte => 1,
			AddressMode::TwoByte => 2,
		}
	}
}

/// Size of a device and how it gets addressed
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Geometry {
	capacity: u32,
	address_mode: AddressMode,
}

impl Geometry {
	pub fn with_capacity(capacity: u32) -> crate::AResult<Self> {
		ensure!(capacity > 0, "device capacity must not be zero");
		ensure!(capacity <= MAX_CAPACITY, "device capacity {} too big (maximum {})", capacity, MAX_CAPACITY);
		Ok(Geometry {
			capacity,
			address_mode: AddressMode::for_capacity(capacity),
		})
	}

	pub fn capacity(&self) -> u32 {
		self.capacity
	}

	pub fn address_mode(&self) -> AddressMode {
		self.address_mode
	}

	/// highest valid memory address
	pub fn last_address(&self) -> u16 {
		(self.capacity - 1) as u16
	}

	pub fn check_range(&self, address: u16, len: usize) -> crate::AResult<()> {
		let end = (address as u64).saturating_add(len as u64);
		ensure!(end <= self.capacity as u64,
			"range 0x{:04x}+{} exceeds device capacity of {} bytes", address, len, self.capacity
		);
		Ok(())
	}

	/// Device select byte for a transfer at `address`
	pub fn device_select(&self, address: u16, read: bool) -> u8 {
		let block = match self.address_mode {
			AddressMode::SingleByte => ((address >> 8) as u8 & 0x07) << 1,
			AddressMode::TwoByte => 0,
		};
		DEVICE_BASE | block | (read as u8)
	}
}

impl fmt::Display for Geometry {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} bytes, {:?} addressing", self.capacity, self.address_mode)
	}
}

/// AT24Cxx family members
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Chip {
	At24c01,
	At24c02,
	At24c04,
	At24c08,
	At24c16,
	At24c32,
	At24c64,
	At24c128,
	At24c256,
	At24c512,
}

impl Chip {
	pub const ALL: [Chip; 10] = [
		Chip::At24c01, Chip::At24c02, Chip::At24c04, Chip::At24c08,
		Chip::At24c16, Chip::At24c32, Chip::At24c64, Chip::At24c128,
		Chip::At24c256, Chip::At24c512,
	];

	/// capacity in bytes
	pub const fn capacity(self) -> u32 {
		match self {
			Chip::At24c01 => 128,
			Chip::At24c02 => 256,
			Chip::At24c04 => 512,
			Chip::At24c08 => 1024,
			Chip::At24c16 => 2048,
			Chip::At24c32 => 4096,
			Chip::At24c64 => 8192,
			Chip::At24c128 => 16384,
			Chip::At24c256 => 32768,
			Chip::At24c512 => 65536,
		}
	}

	pub const fn geometry(self) -> Geometry {
		Geometry {
			capacity: self.capacity(),
			address_mode: AddressMode::for_capacity(self.capacity()),
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Chip::At24c01 => "24c01",
			Chip::At24c02 => "24c02",
			Chip::At24c04 => "24c04",
			Chip::At24c08 => "24c08",
			Chip::At24c16 => "24c16",
			Chip::At24c32 => "24c32",
			Chip::At24c64 => "24c64",
			Chip::At24c128 => "24c128",
			Chip::At24c256 => "24c256",
			Chip::At24c512 => "24c512",
		}
	}
}

impl fmt::Display for Chip {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "AT{}", self.name().to_uppercase())
	}
}

impl str::FromStr for Chip {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lower = s.to_ascii_lowercase();
		// accept "at24c02" and "24c02"
		let name = lower.trim_start_matches("at");
		for chip in Chip::ALL.iter() {
			if chip.name() == name {
				return Ok(*chip);
			}
		}
		bail!("unknown chip {:?} (expected one of 24c01 .. 24c512)", s);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn catalogue_address_modes() {
		for chip in Chip::ALL.iter() {
			let expected = if chip.capacity() <= 2048 {
				AddressMode::SingleByte
			} else {
				AddressMode::TwoByte
			};
			assert_eq!(chip.geometry().address_mode(), expected, "{}", chip);
		}
		assert_eq!(Chip::At24c16.geometry().address_mode(), AddressMode::SingleByte);
		assert_eq!(Chip::At24c32.geometry().address_mode(), AddressMode::TwoByte);
	}

	#[test]
	fn mode_boundary() {
		assert_eq!(Geometry::with_capacity(2047).unwrap().address_mode(), AddressMode::SingleByte);
		assert_eq!(Geometry::with_capacity(2048).unwrap().address_mode(), AddressMode::SingleByte);
		assert_eq!(Geometry::with_capacity(2049).unwrap().address_mode(), AddressMode::TwoByte);
		assert_eq!(Geometry::with_capacity(4095).unwrap().address_mode(), AddressMode::TwoByte);
		assert_eq!(AddressMode::SingleByte.address_bytes(), 1);
		assert_eq!(AddressMode::TwoByte.address_bytes(), 2);
	}

	#[test]
	fn invalid_capacity() {
		assert!(Geometry::with_capacity(0).is_err());
		assert!(Geometry::with_capacity(65537).is_err());
		assert!(Geometry::with_capacity(65536).is_ok());
	}

	#[test]
	fn block_bits_in_device_select() {
		let g = Chip::At24c16.geometry();
		assert_eq!(g.device_select(0x000, false), 0xa0);
		assert_eq!(g.device_select(0x1ff, false), 0xa2);
		assert_eq!(g.device_select(0x7fe, false), 0xae);
		assert_eq!(g.device_select(0x7fe, true), 0xaf);

		let g = Chip::At24c256.geometry();
		assert_eq!(g.device_select(0x7fff, false), 0xa0);
		assert_eq!(g.device_select(0x7fff, true), 0xa1);
	}

	#[test]
	fn range_checks() {
		let g = Chip::At24c02.geometry();
		assert_eq!(g.last_address(), 255);
		assert!(g.check_range(0, 256).is_ok());
		assert!(g.check_range(255, 1).is_ok());
		assert!(g.check_range(255, 2).is_err());
		assert!(g.check_range(0x100, 1).is_err());
		assert!(g.check_range(0x100, 0).is_ok());
		assert_eq!(Chip::At24c512.geometry().last_address(), 0xffff);
		assert!(g.check_range(0xffff, usize::MAX).is_err());
		assert!(Chip::At24c512.geometry().check_range(0xffff, 1).is_ok());
	}

	#[test]
	fn parse_names() {
		assert_eq!("24c02".parse::<Chip>().unwrap(), Chip::At24c02);
		assert_eq!("AT24C256".parse::<Chip>().unwrap(), Chip::At24c256);
		assert!("24c03".parse::<Chip>().is_err());
		assert_eq!(Chip::At24c64.to_string(), "AT24C64");
	}
}
