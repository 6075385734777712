//! Tester command builders.
//!
//! Each function produces one `$…$` command frame for an operator action on
//! the bench tester. The frames are returned before NUL insertion; the
//! streaming engine applies the terminator rule when they are queued.
//!
//! All functions are pure -- they produce byte vectors without performing any
//! I/O.
//!
//! # Command reference
//!
//! - `L3` travel to a station
//! - `L4` leave tester mode
//! - `L5 T<n>` toggle or pulse a tester function (`T0` pump, `T2` button LED,
//!   `T3` power LED, `T4` flow-sensor logging, `T5` temperature logging,
//!   `T6` beeper, `T7` water heating)
//! - `L6` drive or read a raw controller pin
//! - `G0` relative jog, `G28` homing

use crate::pin::PinAddress;

// ---------------------------------------------------------------
// Tester functions
// ---------------------------------------------------------------

/// `L5` function codes.
const FN_PUMP: u8 = 0;
const FN_BUTTON_LED: u8 = 2;
const FN_POWER_LED: u8 = 3;
const FN_FLOW_LOG: u8 = 4;
const FN_TEMPERATURE_LOG: u8 = 5;
const FN_BEEPER: u8 = 6;
const FN_WATER_HEATING: u8 = 7;

/// `L6` pin mode for a digital input.
pub const PIN_MODE_INPUT: u8 = 0;
/// `L6` pin mode for a digital output.
pub const PIN_MODE_OUTPUT: u8 = 1;

/// One of the three resistive heaters on the tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heater {
    /// Hot-end 0.
    Th0,
    /// Hot-end 1.
    Th1,
    /// Heated bed.
    Bed,
}

impl Heater {
    /// Flat controller pin the heater is wired to.
    pub fn pin(self) -> u16 {
        match self {
            Heater::Th0 => 69,
            Heater::Th1 => 16,
            Heater::Bed => 0,
        }
    }

    /// Label shown to the operator.
    pub fn label(self) -> &'static str {
        match self {
            Heater::Th0 => "TH0",
            Heater::Th1 => "TH1",
            Heater::Bed => "Bed",
        }
    }
}

/// Jog axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
        }
    }
}

fn frame(body: String) -> Vec<u8> {
    format!("${body}$").into_bytes()
}

fn flag(on: bool) -> u8 {
    u8::from(on)
}

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Switch the pump on or off at the given drive value (`$L5 T0 S{0|1} V{v}$`).
pub fn cmd_pump(on: bool, value: u32) -> Vec<u8> {
    frame(format!("L5 T{FN_PUMP} S{} V{value}", flag(on)))
}

/// Light the button LED of a station (`$L5 T2 V{n}$`).
pub fn cmd_button_led(station: u8) -> Vec<u8> {
    frame(format!("L5 T{FN_BUTTON_LED} V{station}"))
}

/// Light the power LED of a station (`$L5 T3 V{n}$`).
pub fn cmd_power_led(station: u8) -> Vec<u8> {
    frame(format!("L5 T{FN_POWER_LED} V{station}"))
}

/// Enable or disable flow-sensor logging (`$L5 T4 S{0|1}$`).
pub fn cmd_flow_logging(on: bool) -> Vec<u8> {
    frame(format!("L5 T{FN_FLOW_LOG} S{}", flag(on)))
}

/// Enable or disable temperature logging (`$L5 T5 S{0|1}$`).
pub fn cmd_temperature_logging(on: bool) -> Vec<u8> {
    frame(format!("L5 T{FN_TEMPERATURE_LOG} S{}", flag(on)))
}

/// Sound the beeper at `frequency` (`$L5 T6 S1 V{f}$`).
pub fn cmd_beeper_on(frequency: u32) -> Vec<u8> {
    frame(format!("L5 T{FN_BEEPER} S1 V{frequency}"))
}

/// Silence the beeper (`$L5 T6 S0$`).
pub fn cmd_beeper_off() -> Vec<u8> {
    frame(format!("L5 T{FN_BEEPER} S0"))
}

/// Enable or disable water heating (`$L5 T7 S{0|1}$`).
pub fn cmd_water_heating(on: bool) -> Vec<u8> {
    frame(format!("L5 T{FN_WATER_HEATING} S{}", flag(on)))
}

/// Drive a heater with a PWM duty value; `None` switches it off.
pub fn cmd_heater(heater: Heater, pwm: Option<u32>) -> Vec<u8> {
    cmd_pin_write_id(heater.pin(), PIN_MODE_OUTPUT, pwm.unwrap_or(0))
}

/// Write `value` to a pin configured with `mode` (`$L6 P{id} M{m} V{v} W$`).
pub fn cmd_pin_write(pin: PinAddress, mode: u8, value: u32) -> Vec<u8> {
    cmd_pin_write_id(pin.id(), mode, value)
}

fn cmd_pin_write_id(id: u16, mode: u8, value: u32) -> Vec<u8> {
    frame(format!("L6 P{id} M{mode} V{value} W"))
}

/// Read a pin configured with `mode` (`$L6 P{id} M{m} R$`).
pub fn cmd_pin_read(pin: PinAddress, mode: u8) -> Vec<u8> {
    frame(format!("L6 P{} M{mode} R", pin.id()))
}

/// Jog one step along `axis`; `forward` picks the sign (`$G0 X1$`, `$G0 Y-1$`).
pub fn cmd_jog(axis: Axis, forward: bool) -> Vec<u8> {
    let step = if forward { 1 } else { -1 };
    frame(format!("G0 {}{step}", axis.letter()))
}

/// Home the X and Y axes (`$G28 XY$`).
pub fn cmd_home() -> Vec<u8> {
    frame("G28 XY".to_string())
}

/// Travel to a station (`$L3 N{n}$`).
pub fn cmd_travel_to_station(station: u8) -> Vec<u8> {
    frame(format!("L3 N{station}"))
}

/// Leave tester mode (`$L4 K0$`).
pub fn cmd_leave_tester_mode() -> Vec<u8> {
    frame("L4 K0".to_string())
}

/// Announce a firmware image of `len` bytes (`#{"cmdFirmwareUpdate":len}#`).
pub fn cmd_firmware_announcement(len: u64) -> Vec<u8> {
    format!("#{{\"cmdFirmwareUpdate\":{len}}}#").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(cmd: Vec<u8>) -> String {
        String::from_utf8(cmd).unwrap()
    }

    #[test]
    fn pump() {
        assert_eq!(text(cmd_pump(true, 180)), "$L5 T0 S1 V180$");
        assert_eq!(text(cmd_pump(false, 180)), "$L5 T0 S0 V180$");
    }

    #[test]
    fn station_leds() {
        assert_eq!(text(cmd_button_led(2)), "$L5 T2 V2$");
        assert_eq!(text(cmd_power_led(0)), "$L5 T3 V0$");
    }

    #[test]
    fn logging_toggles() {
        assert_eq!(text(cmd_flow_logging(true)), "$L5 T4 S1$");
        assert_eq!(text(cmd_temperature_logging(false)), "$L5 T5 S0$");
        assert_eq!(text(cmd_water_heating(true)), "$L5 T7 S1$");
    }

    #[test]
    fn beeper() {
        assert_eq!(text(cmd_beeper_on(2000)), "$L5 T6 S1 V2000$");
        assert_eq!(text(cmd_beeper_off()), "$L5 T6 S0$");
    }

    #[test]
    fn heaters() {
        assert_eq!(text(cmd_heater(Heater::Th0, Some(120))), "$L6 P69 M1 V120 W$");
        assert_eq!(text(cmd_heater(Heater::Th1, Some(255))), "$L6 P16 M1 V255 W$");
        assert_eq!(text(cmd_heater(Heater::Bed, None)), "$L6 P0 M1 V0 W$");
        assert_eq!(Heater::Bed.label(), "Bed");
    }

    #[test]
    fn raw_pins() {
        let pin = PinAddress::parse("PC3").unwrap();
        assert_eq!(text(cmd_pin_write(pin, PIN_MODE_OUTPUT, 1)), "$L6 P35 M1 V1 W$");
        assert_eq!(text(cmd_pin_read(pin, PIN_MODE_INPUT)), "$L6 P35 M0 R$");
    }

    #[test]
    fn motion() {
        assert_eq!(text(cmd_jog(Axis::X, false)), "$G0 X-1$");
        assert_eq!(text(cmd_jog(Axis::X, true)), "$G0 X1$");
        assert_eq!(text(cmd_jog(Axis::Y, false)), "$G0 Y-1$");
        assert_eq!(text(cmd_jog(Axis::Y, true)), "$G0 Y1$");
        assert_eq!(text(cmd_home()), "$G28 XY$");
        assert_eq!(text(cmd_travel_to_station(3)), "$L3 N3$");
    }

    #[test]
    fn leave_tester_mode() {
        assert_eq!(text(cmd_leave_tester_mode()), "$L4 K0$");
    }

    #[test]
    fn firmware_announcement() {
        assert_eq!(
            text(cmd_firmware_announcement(491_520)),
            "#{\"cmdFirmwareUpdate\":491520}#"
        );
    }
}
