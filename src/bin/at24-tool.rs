#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate at24_bitbang;
use at24_bitbang::*;

use std::process::exit;

use at24_bitbang::at24::{
	Chip,
	Eeprom,
	Geometry,
	Length,
};
use at24_bitbang::i2c::{
	Hardware,
	StdDelay,
	Wired,
};
use at24_bitbang::sim::SimBus;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid paramater {}: {}", name, e);
		e.context(msg).into()
	})
}

// decimal or 0x-prefixed hex
fn parse_number(param: &str) -> AResult<u32> {
	if param.starts_with("0x") || param.starts_with("0X") {
		Ok(u32::from_str_radix(&param[2..], 16)?)
	} else {
		Ok(param.parse::<u32>()?)
	}
}

fn get_number(matches: &clap::ArgMatches, name: &str) -> AResult<u32> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	parse_number(param).map_err(|e| {
		let msg = format!("invalid number for {} ({:?}): {}", name, param, e);
		e.context(msg).into()
	})
}

fn get_address(matches: &clap::ArgMatches, name: &str) -> AResult<u16> {
	let address = get_number(matches, name)?;
	ensure!(address <= 0xffff, "address 0x{:x} out of range", address);
	Ok(address as u16)
}

// whitespace between the digits is ignored
fn parse_hex_bytes(s: &str) -> AResult<Vec<u8>> {
	let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
	Ok(hex::decode(&digits)?)
}

fn get_hex_bytes(matches: &clap::ArgMatches, name: &str) -> AResult<Vec<u8>> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	parse_hex_bytes(param).map_err(|e| {
		let msg = format!("invalid hex bytes for {} ({:?}): {}", name, param, e);
		e.context(msg).into()
	})
}

fn hexdump(start: u16, data: &[u8]) {
	for (row, chunk) in data.chunks(16).enumerate() {
		let mut line = format!("{:04x} ", start as usize + row * 16);
		for (i, b) in chunk.iter().enumerate() {
			if i == 8 {
				line.push(' ');
			}
			line.push_str(&format!(" {:02x}", b));
		}
		println!("{}", line);
	}
}

// exit code 2: no device detected
fn run<H: Hardware>(eeprom: &mut Eeprom<H>, matches: &clap::ArgMatches) -> AResult<i32> {
	match matches.subcommand() {
		("info", _) => {
			println!("{}", eeprom.geometry());
		},
		("check", _) => {
			if let Err(e) = eeprom.try_check_presence() {
				error!("EEPROM not detected: {}", e);
				return Ok(2);
			}
			println!("EEPROM present");
		},
		("read-byte", Some(sub_m)) => {
			let address = get_address(sub_m, "ADDRESS")?;
			println!("0x{:02x}", eeprom.try_read_byte(address)?);
		},
		("write-byte", Some(sub_m)) => {
			let address = get_address(sub_m, "ADDRESS")?;
			let value = get_number(sub_m, "VALUE")?;
			ensure!(value <= 0xff, "byte value 0x{:x} too big", value);
			eeprom.try_write_byte(address, value as u8)?;
		},
		("read-len", Some(sub_m)) => {
			let address = get_address(sub_m, "ADDRESS")?;
			let length = Length::from_bytes(get_param(sub_m, "LEN")?)?;
			println!("0x{:0width$x}", eeprom.try_read_len(address, length)?, width = 2 * length.bytes());
		},
		("write-len", Some(sub_m)) => {
			let address = get_address(sub_m, "ADDRESS")?;
			let value = get_number(sub_m, "VALUE")?;
			let length = Length::from_bytes(get_param(sub_m, "LEN")?)?;
			eeprom.try_write_len(address, value, length)?;
		},
		("dump", Some(sub_m)) => {
			let address = if sub_m.is_present("ADDRESS") { get_address(sub_m, "ADDRESS")? } else { 0 };
			let count = if sub_m.is_present("COUNT") {
				get_number(sub_m, "COUNT")? as usize
			} else {
				(eeprom.geometry().capacity() as usize).saturating_sub(address as usize)
			};
			let data = eeprom.try_read(address, count)?;
			hexdump(address, &data);
		},
		("write", Some(sub_m)) => {
			let address = get_address(sub_m, "ADDRESS")?;
			let data = get_hex_bytes(sub_m, "DATA")?;
			eeprom.try_write(address, &data)?;
			info!("wrote {} bytes at 0x{:04x}", data.len(), address);
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}

	Ok(0)
}

fn app() -> clap::App<'static, 'static> {
	clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg chip: -c --chip +takes_value default_value("24c02") "EEPROM type (24c01 .. 24c512)")
		(@arg simulate: --simulate "use a simulated blank EEPROM instead of GPIOs")
		(@arg clock: --clock +takes_value "GPIO number of the clock line")
		(@arg data: --data +takes_value "GPIO number of the data line")
		(@subcommand info =>
			(about: "show capacity and addressing mode")
		)
		(@subcommand check =>
			(about: "detect EEPROM (writes presence marker into the last byte if missing)")
		)
		(subcommand: clap_app!(@app (clap::SubCommand::with_name("read-byte"))
			(about: "read a single byte")
			(@arg ADDRESS: +required "memory address")
		))
		(subcommand: clap_app!(@app (clap::SubCommand::with_name("write-byte"))
			(about: "write a single byte")
			(@arg ADDRESS: +required "memory address")
			(@arg VALUE: +required "byte to write")
		))
		(subcommand: clap_app!(@app (clap::SubCommand::with_name("read-len"))
			(about: "read a little endian 16/32-bit integer")
			(@arg ADDRESS: +required "memory address")
			(@arg LEN: +required "integer size in bytes (2 or 4)")
		))
		(subcommand: clap_app!(@app (clap::SubCommand::with_name("write-len"))
			(about: "write a little endian 16/32-bit integer")
			(@arg ADDRESS: +required "memory address")
			(@arg VALUE: +required "integer to write")
			(@arg LEN: +required "integer size in bytes (2 or 4)")
		))
		(@subcommand dump =>
			(about: "hex dump memory")
			(@arg ADDRESS: "start address (default: 0)")
			(@arg COUNT: "number of bytes (default: up to the end)")
		)
		(@subcommand write =>
			(about: "write hex encoded bytes")
			(@arg ADDRESS: +required "start address")
			(@arg DATA: +required "hex bytes, e.g. \"de ad be ef\"")
		)
	)
}

fn main_app(matches: &clap::ArgMatches) -> AResult<i32> {
	let chip: Chip = get_param(matches, "chip")?;
	let geometry: Geometry = chip.geometry();
	debug!("{}: {}", chip, geometry);

	if matches.is_present("simulate") {
		let mut eeprom = Eeprom::new(SimBus::new(geometry), geometry);
		run(&mut eeprom, matches)
	} else {
		let clock: u32 = get_param(matches, "clock")?;
		let data: u32 = get_param(matches, "data")?;
		let lines = gpio::SysfsLines::open(clock, data)?;
		let mut eeprom = Eeprom::new(Wired::new(lines, StdDelay), geometry);
		run(&mut eeprom, matches)
	}
}

fn exit_code(result: AResult<i32>) -> i32 {
	match result {
		Ok(code) => code,
		Err(e) => {
			error!("Error: {}", e);
			1
		},
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let matches = app().get_matches();
	let code = exit_code(main_app(&matches));
	if code != 0 {
		exit(code);
	}
}
