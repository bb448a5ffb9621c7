//! Bus lines on Linux GPIOs through the sysfs interface (/sys/class/gpio)
//!
//! Slow (every edge is a syscall), but the protocol only requires minimum
//! delays, so that is fine.

use linux_embedded_hal::sysfs_gpio::Direction as PinDirection;
use linux_embedded_hal::SysfsPin;

use crate::i2c::{
	Direction,
	Lines,
};

// sysfs switches to output and sets the level in one write
fn pin_direction(direction: Direction, level: bool) -> PinDirection {
	match direction {
		Direction::Input => PinDirection::In,
		Direction::Output if level => PinDirection::High,
		Direction::Output => PinDirection::Low,
	}
}

fn open_pin(number: u32) -> crate::AResult<SysfsPin> {
	with_context!(("couldn't set up GPIO {}", number), {
		let pin = SysfsPin::new(number as u64);
		pin.export()?;
		pin.set_direction(PinDirection::High)?;
		Ok(pin)
	})
}

pub struct SysfsLines {
	clock: SysfsPin,
	data: SysfsPin,
	data_direction: Direction,
	data_level: bool,
}

impl SysfsLines {
	/// Export both GPIOs and leave them as outputs driving high (bus idle).
	pub fn open(clock: u32, data: u32) -> crate::AResult<Self> {
		ensure!(clock != data, "clock and data need different GPIOs (both {})", clock);
		let clock = open_pin(clock)?;
		let data = open_pin(data)?;
		info!("bus on GPIO {} (clock) and GPIO {} (data)", clock.get_pin_num(), data.get_pin_num());

		Ok(SysfsLines {
			clock,
			data,
			data_direction: Direction::Output,
			data_level: true,
		})
	}
}

impl Lines for SysfsLines {
	fn set_clock(&mut self, high: bool) {
		self.clock.set_value(high as u8).expect("writing GPIO value must not fail");
	}

	fn set_data(&mut self, high: bool) {
		self.data_level = high;
		if self.data_direction == Direction::Output {
			self.data.set_value(high as u8).expect("writing GPIO value must not fail");
		}
	}

	fn set_data_direction(&mut self, direction: Direction) {
		if direction == self.data_direction {
			return;
		}
		self.data.set_direction(pin_direction(direction, self.data_level))
			.expect("switching GPIO direction must not fail");
		self.data_direction = direction;
	}

	fn read_data(&mut self) -> bool {
		0 != self.data.get_value().expect("reading GPIO value must not fail")
	}
}
