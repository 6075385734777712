//! Controller pin addressing.
//!
//! Operators name pins the way the board silkscreen does: `P`, a bank letter
//! `A`..`E`, and an index `0`..`15` (`PA5`, `PE15`). The controller wants a
//! flat numeric id. Each bank spans 16 ids, computed as
//! `bank * 15 + bank + index` with `bank` counted from `A = 0`.

use std::fmt;
use std::str::FromStr;

use testerlink_core::{Error, Result};

/// Marker byte every pin token starts with.
const PIN_MARKER: u8 = b'P';

/// First and last bank letters.
const FIRST_BANK: u8 = b'A';
const LAST_BANK: u8 = b'E';

/// Highest pin index within a bank.
pub const MAX_PIN_INDEX: u8 = 15;

/// A validated controller pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinAddress {
    bank: u8,
    index: u8,
}

impl PinAddress {
    /// Build a pin from its bank letter and index.
    pub fn new(bank: char, index: u8) -> Result<Self> {
        let letter = u8::try_from(bank).unwrap_or(0);
        if !(FIRST_BANK..=LAST_BANK).contains(&letter) || index > MAX_PIN_INDEX {
            return Err(Error::InvalidPin(format!("P{bank}{index}")));
        }
        Ok(PinAddress {
            bank: letter,
            index,
        })
    }

    /// Parse a pin token such as `PB7`.
    ///
    /// Checks, in order: at least three bytes, leading `P`, bank letter in
    /// `A`..`E`, a non-negative decimal index, index at most 15.
    pub fn parse(token: &str) -> Result<Self> {
        let invalid = || Error::InvalidPin(token.to_string());
        let raw = token.as_bytes();

        if raw.len() < 3 || raw[0] != PIN_MARKER {
            return Err(invalid());
        }
        let bank = raw[1];
        if !(FIRST_BANK..=LAST_BANK).contains(&bank) {
            return Err(invalid());
        }

        let digits = &token[2..];
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let index: u32 = digits.parse().map_err(|_| invalid())?;
        if index > u32::from(MAX_PIN_INDEX) {
            return Err(invalid());
        }

        Ok(PinAddress {
            bank,
            index: index as u8,
        })
    }

    /// Recover a pin from its flat id. `None` when the id is out of range.
    pub fn from_id(id: u16) -> Option<Self> {
        let bank = id / 16;
        let index = id % 16;
        if bank > u16::from(LAST_BANK - FIRST_BANK) {
            return None;
        }
        Some(PinAddress {
            bank: FIRST_BANK + bank as u8,
            index: index as u8,
        })
    }

    /// Flat numeric id sent to the controller.
    pub fn id(&self) -> u16 {
        let letter = u16::from(self.bank - FIRST_BANK);
        letter * 15 + letter + u16::from(self.index)
    }

    /// Bank letter (`'A'`..`'E'`).
    pub fn bank(&self) -> char {
        char::from(self.bank)
    }

    /// Index within the bank (`0`..=`15`).
    pub fn index(&self) -> u8 {
        self.index
    }
}

impl FromStr for PinAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PinAddress::parse(s)
    }
}

impl fmt::Display for PinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.bank(), self.index)
    }
}

/// Parse a pin token straight to its flat id.
pub fn parse_pin_id(token: &str) -> Result<u16> {
    PinAddress::parse(token).map(|pin| pin.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_first_bank() {
        assert_eq!(parse_pin_id("PA0").unwrap(), 0);
        assert_eq!(parse_pin_id("PA5").unwrap(), 5);
        assert_eq!(parse_pin_id("PA15").unwrap(), 15);
    }

    #[test]
    fn parse_later_banks() {
        assert_eq!(parse_pin_id("PB0").unwrap(), 16);
        assert_eq!(parse_pin_id("PC3").unwrap(), 35);
        assert_eq!(parse_pin_id("PE5").unwrap(), 69);
        assert_eq!(parse_pin_id("PE15").unwrap(), 79);
    }

    #[test]
    fn parse_leading_zero_index() {
        assert_eq!(parse_pin_id("PB07").unwrap(), 23);
    }

    #[test]
    fn reject_short_token() {
        assert!(matches!(parse_pin_id("PA"), Err(Error::InvalidPin(_))));
        assert!(matches!(parse_pin_id(""), Err(Error::InvalidPin(_))));
    }

    #[test]
    fn reject_missing_marker() {
        assert!(matches!(parse_pin_id("QA1"), Err(Error::InvalidPin(_))));
        assert!(matches!(parse_pin_id("pa1"), Err(Error::InvalidPin(_))));
    }

    #[test]
    fn reject_bank_out_of_range() {
        assert!(matches!(parse_pin_id("PF1"), Err(Error::InvalidPin(_))));
        assert!(matches!(parse_pin_id("Pa1"), Err(Error::InvalidPin(_))));
    }

    #[test]
    fn reject_bad_index() {
        assert!(matches!(parse_pin_id("PA16"), Err(Error::InvalidPin(_))));
        assert!(matches!(parse_pin_id("PAx"), Err(Error::InvalidPin(_))));
        assert!(matches!(parse_pin_id("PA-1"), Err(Error::InvalidPin(_))));
        assert!(matches!(parse_pin_id("PA+1"), Err(Error::InvalidPin(_))));
        assert!(matches!(parse_pin_id("PA99999999999"), Err(Error::InvalidPin(_))));
    }

    #[test]
    fn invalid_pin_keeps_token() {
        match parse_pin_id("PZ3") {
            Err(Error::InvalidPin(token)) => assert_eq!(token, "PZ3"),
            other => panic!("expected InvalidPin, got {other:?}"),
        }
    }

    #[test]
    fn every_pin_round_trips_through_its_id() {
        for bank in ['A', 'B', 'C', 'D', 'E'] {
            for index in 0..=MAX_PIN_INDEX {
                let token = format!("P{bank}{index}");
                let pin: PinAddress = token.parse().unwrap();
                let back = PinAddress::from_id(pin.id()).unwrap();
                assert_eq!(back.bank(), bank);
                assert_eq!(back.index(), index);
                assert_eq!(back.to_string(), token);
            }
        }
    }

    #[test]
    fn from_id_out_of_range() {
        assert!(PinAddress::from_id(80).is_none());
        assert_eq!(PinAddress::from_id(79).unwrap().to_string(), "PE15");
    }

    #[test]
    fn new_validates() {
        assert_eq!(PinAddress::new('C', 2).unwrap().id(), 34);
        assert!(PinAddress::new('F', 0).is_err());
        assert!(PinAddress::new('A', 16).is_err());
        assert!(PinAddress::new('é', 1).is_err());
    }
}
