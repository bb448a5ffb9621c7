//! Bit-banged two-wire (I²C style) bus master
//!
//! There is no bus peripheral involved: both lines are driven by software
//! through the `Lines` capability, timing comes from the `Delay` capability.
//!
//! Conditions (idle bus: CLK and DATA both high):
//! - START: DATA falls while CLK is high
//! - STOP: DATA rises while CLK is high
//! - data bits: DATA only changes while CLK is low, sampled on CLK high
//!
//! Every byte is shifted MSB first and followed by a ninth clock in which
//! the receiver pulls DATA low to acknowledge (ACK) or leaves it high (NACK).
//!
//! Only a single master with fixed delays is supported: no arbitration, no
//! clock stretching.

mod hardware;
mod low_level;

pub use self::hardware::{
	reliable_sleep,
	Delay,
	Direction,
	Hardware,
	Lines,
	StdDelay,
	Wired,
};

pub use self::low_level::{
	AckTimeout,
	LowLevel,
	Transaction,
	ACK_POLLS,
};
