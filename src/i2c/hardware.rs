use std::thread;
use std::time::{
	Duration,
	Instant,
};

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Input,
	Output,
}

/// Drive and sample the two bus lines.
///
/// CLK is always an output. DATA has to be switched to `Direction::Input`
/// before it is sampled and back to `Direction::Output` before it is driven;
/// implementations own the direction state.
pub trait Lines {
	fn set_clock(&mut self, high: bool);
	fn set_data(&mut self, high: bool);
	fn set_data_direction(&mut self, direction: Direction);
	fn read_data(&mut self) -> bool;
}

/// Busy-wait capability; all protocol timing goes through this.
pub trait Delay {
	fn delay_us(&mut self, us: u32);

	fn delay_ms(&mut self, ms: u32) {
		for _ in 0..ms {
			self.delay_us(1000);
		}
	}
}

/// Everything the bus master needs
pub trait Hardware: Lines + Delay {
}

impl<H: Lines + Delay + ?Sized> Hardware for H {
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
	fn delay_us(&mut self, us: u32) {
		reliable_sleep(Duration::from_micros(us as u64));
	}

	fn delay_ms(&mut self, ms: u32) {
		reliable_sleep(Duration::from_millis(ms as u64));
	}
}

/// Combines a line driver with a separate delay source
#[derive(Debug)]
pub struct Wired<L, D> {
	pub lines: L,
	pub delay: D,
}

impl<L: Lines, D: Delay> Wired<L, D> {
	pub fn new(lines: L, delay: D) -> Self {
		Wired { lines, delay }
	}
}

impl<L: Lines, D> Lines for Wired<L, D> {
	fn set_clock(&mut self, high: bool) {
		self.lines.set_clock(high)
	}

	fn set_data(&mut self, high: bool) {
		self.lines.set_data(high)
	}

	fn set_data_direction(&mut self, direction: Direction) {
		self.lines.set_data_direction(direction)
	}

	fn read_data(&mut self) -> bool {
		self.lines.read_data()
	}
}

impl<L, D: Delay> Delay for Wired<L, D> {
	fn delay_us(&mut self, us: u32) {
		self.delay.delay_us(us)
	}

	fn delay_ms(&mut self, ms: u32) {
		self.delay.delay_ms(ms)
	}
}
