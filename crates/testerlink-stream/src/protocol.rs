//! Line classification and command framing for the tester protocol.
//!
//! Outbound, every message is a frame `<d> … [NUL] <d>` where `<d>` is `#` or
//! `$` and both delimiters of one frame are the same byte. A `$` frame carries
//! a NUL terminator marker right before its closing `$`; the controller's
//! line reader only honors the closing `$` when the marker is present.
//!
//! Inbound, the controller sends newline-separated ASCII lines: the readiness
//! literal, `ERRO:` error reports, `X:` telemetry, framed protocol echo, and
//! free text.

use bytes::{BufMut, Bytes, BytesMut};
use testerlink_core::{DELIM_DOLLAR, ERROR_PREFIX, Error, InboundLine, NUL, Result, is_delimiter};

/// Classify one received line.
///
/// `line` must already be stripped of its newline and surrounding whitespace.
/// Rules are applied in priority order: readiness literal, `ERRO:` prefix,
/// single-letter telemetry tag, leading delimiter, plain text. Every input maps
/// to exactly one variant; the returned parts are slices of `line`.
pub fn classify(line: Bytes, readiness: &[u8]) -> InboundLine {
    if line.as_ref() == readiness {
        return InboundLine::Readiness;
    }

    if line.starts_with(ERROR_PREFIX) {
        let split = ERROR_PREFIX.len();
        return InboundLine::Error {
            label: line.slice(..split),
            remainder: line.slice(split..),
        };
    }

    if line.len() >= 2 && line[0].is_ascii_alphabetic() && line[1] == b':' {
        return InboundLine::Telemetry {
            tag: line.slice(..2),
            remainder: line.slice(2..),
        };
    }

    match line.first() {
        Some(&first) if is_delimiter(first) => InboundLine::Framed(line),
        _ => InboundLine::Plain(line),
    }
}

/// Whether a frame needs a NUL inserted before its closing `$`.
///
/// A one-byte `$` has no predecessor and counts as unterminated.
pub fn needs_terminator(frame: &[u8]) -> bool {
    match frame {
        [.., prev, last] => *last == DELIM_DOLLAR && *prev != NUL,
        [last] => *last == DELIM_DOLLAR,
        [] => false,
    }
}

/// Insert the NUL terminator before a closing `$`, in place.
///
/// Idempotent: a frame that already ends in `NUL $` is left alone.
pub fn terminate(frame: &mut BytesMut) {
    if needs_terminator(frame) {
        frame.truncate(frame.len() - 1);
        frame.put_u8(NUL);
        frame.put_u8(DELIM_DOLLAR);
    }
}

/// Frame a command for dispatch.
///
/// Returns `None` for an empty command. Firmware payload is passed through
/// untouched; anything else gets the NUL terminator rule applied.
pub fn frame_command(cmd: &[u8], firmware: bool) -> Option<Bytes> {
    if cmd.is_empty() {
        return None;
    }
    let mut frame = BytesMut::from(cmd);
    if !firmware {
        terminate(&mut frame);
    }
    Some(frame.freeze())
}

/// Check that a queued command is a complete frame: it opens with `#` or
/// `$` and closes with the same byte.
pub fn check_framed(cmd: &[u8]) -> Result<()> {
    match cmd {
        [] => Err(Error::EmptyCommand),
        [open, .., close] if is_delimiter(*open) && open == close => Ok(()),
        _ => Err(Error::UnframedInput),
    }
}

/// Frame free text typed by the operator.
///
/// The text must open with a delimiter or it is refused. A missing closing
/// delimiter (the same byte as the opening one) is appended, then the NUL
/// rule applies.
pub fn frame_operator_input(input: &[u8]) -> Result<Bytes> {
    let Some(&open) = input.first() else {
        return Err(Error::EmptyCommand);
    };
    if !is_delimiter(open) {
        return Err(Error::UnframedInput);
    }

    let mut frame = BytesMut::with_capacity(input.len() + 2);
    frame.extend_from_slice(input);
    if input.last() != Some(&open) {
        frame.put_u8(open);
    }
    terminate(&mut frame);
    Ok(frame.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use testerlink_core::{READY_OK, READY_STRUCTURED};

    fn line(s: &'static [u8]) -> Bytes {
        Bytes::from_static(s)
    }

    // -----------------------------------------------------------------------
    // classify
    // -----------------------------------------------------------------------

    #[test]
    fn classify_structured_readiness() {
        let got = classify(line(READY_STRUCTURED), READY_STRUCTURED);
        assert_eq!(got, InboundLine::Readiness);
    }

    #[test]
    fn classify_ok_readiness_only_when_configured() {
        assert_eq!(classify(line(b"ok"), READY_OK), InboundLine::Readiness);
        assert_eq!(
            classify(line(b"ok"), READY_STRUCTURED),
            InboundLine::Plain(line(b"ok"))
        );
    }

    #[test]
    fn classify_readiness_must_match_exactly() {
        assert_eq!(classify(line(b"ok "), READY_OK), InboundLine::Plain(line(b"ok ")));
        assert_eq!(classify(line(b"okay"), READY_OK), InboundLine::Plain(line(b"okay")));
    }

    #[test]
    fn classify_error_line() {
        let got = classify(line(b"ERRO:motor stall"), READY_STRUCTURED);
        assert_eq!(
            got,
            InboundLine::Error {
                label: line(b"ERRO:"),
                remainder: line(b"motor stall"),
            }
        );
    }

    #[test]
    fn classify_error_wins_over_telemetry_shape() {
        // "E:" would be telemetry, but "ERRO:" is checked first.
        let got = classify(line(b"ERRO:"), READY_STRUCTURED);
        assert_eq!(
            got,
            InboundLine::Error {
                label: line(b"ERRO:"),
                remainder: Bytes::new(),
            }
        );
    }

    #[test]
    fn classify_telemetry() {
        let got = classify(line(b"T:210.5"), READY_STRUCTURED);
        assert_eq!(
            got,
            InboundLine::Telemetry {
                tag: line(b"T:"),
                remainder: line(b"210.5"),
            }
        );
    }

    #[test]
    fn classify_telemetry_lowercase_tag() {
        let got = classify(line(b"f:12"), READY_STRUCTURED);
        assert!(matches!(got, InboundLine::Telemetry { .. }));
    }

    #[test]
    fn classify_digit_colon_is_plain() {
        assert_eq!(
            classify(line(b"1:23"), READY_STRUCTURED),
            InboundLine::Plain(line(b"1:23"))
        );
    }

    #[test]
    fn classify_framed() {
        assert_eq!(
            classify(line(b"$L5 T0 S1$"), READY_STRUCTURED),
            InboundLine::Framed(line(b"$L5 T0 S1$"))
        );
        assert_eq!(
            classify(line(b"#{\"infoOther\":{}}#"), READY_STRUCTURED),
            InboundLine::Framed(line(b"#{\"infoOther\":{}}#"))
        );
    }

    #[test]
    fn classify_plain() {
        assert_eq!(
            classify(line(b"tester mode"), READY_STRUCTURED),
            InboundLine::Plain(line(b"tester mode"))
        );
    }

    #[test]
    fn classify_single_letter_is_plain() {
        assert_eq!(classify(line(b"X"), READY_STRUCTURED), InboundLine::Plain(line(b"X")));
    }

    // -----------------------------------------------------------------------
    // terminator rule
    // -----------------------------------------------------------------------

    #[test]
    fn frame_inserts_nul_before_closing_dollar() {
        let framed = frame_command(b"$G28 XY$", false).unwrap();
        assert_eq!(framed.as_ref(), b"$G28 XY\0$");
        assert_eq!(framed.len(), 9);
    }

    #[test]
    fn frame_is_idempotent() {
        let once = frame_command(b"$L4 K0$", false).unwrap();
        let twice = frame_command(&once, false).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.iter().filter(|&&b| b == NUL).count(), 1);
    }

    #[test]
    fn frame_leaves_hash_frames_alone() {
        let framed = frame_command(b"#{\"cmdFirmwareUpdate\":10}#", false).unwrap();
        assert_eq!(framed.as_ref(), b"#{\"cmdFirmwareUpdate\":10}#");
    }

    #[test]
    fn frame_firmware_payload_untouched() {
        let framed = frame_command(b"\x01\x02$", true).unwrap();
        assert_eq!(framed.as_ref(), b"\x01\x02$");
    }

    #[test]
    fn frame_empty_is_none() {
        assert!(frame_command(b"", false).is_none());
        assert!(frame_command(b"", true).is_none());
    }

    #[test]
    fn lone_dollar_gets_terminator() {
        let framed = frame_command(b"$", false).unwrap();
        assert_eq!(framed.as_ref(), b"\0$");
    }

    #[test]
    fn terminator_every_dollar_suffix() {
        let bodies: [&[u8]; 4] = [b"$A$", b"$G0 X-1$", b"$L6 P69 M1 V0 W$", b"xy$"];
        for body in bodies {
            let framed = frame_command(body, false).unwrap();
            assert_eq!(framed.len(), body.len() + 1);
            assert_eq!(&framed[framed.len() - 2..], b"\0$");
            assert_eq!(frame_command(&framed, false).unwrap(), framed);
        }
    }

    #[test]
    fn check_framed_accepts_complete_frames() {
        assert!(check_framed(b"$G28 XY$").is_ok());
        assert!(check_framed(b"$G28 XY\0$").is_ok());
        assert!(check_framed(b"##").is_ok());
    }

    #[test]
    fn check_framed_refuses_partial_frames() {
        assert!(matches!(check_framed(b""), Err(Error::EmptyCommand)));
        for bad in [&b"abc"[..], b"#", b"$", b"#abc$", b"$abc", b"abc$"] {
            assert!(matches!(check_framed(bad), Err(Error::UnframedInput)), "{bad:?}");
        }
    }

    // -----------------------------------------------------------------------
    // operator input
    // -----------------------------------------------------------------------

    #[test]
    fn operator_input_closed_frame() {
        let framed = frame_operator_input(b"$G0 X1$").unwrap();
        assert_eq!(framed.as_ref(), b"$G0 X1\0$");
    }

    #[test]
    fn operator_input_gets_closing_delimiter() {
        let framed = frame_operator_input(b"$G0 X1").unwrap();
        assert_eq!(framed.as_ref(), b"$G0 X1\0$");

        let framed = frame_operator_input(b"#{\"ping\":1}").unwrap();
        assert_eq!(framed.as_ref(), b"#{\"ping\":1}#");
    }

    #[test]
    fn operator_input_mismatched_close_is_completed() {
        // Opens with '#', ends with '$': the '#' is appended to close it.
        let framed = frame_operator_input(b"#abc$").unwrap();
        assert_eq!(framed.as_ref(), b"#abc$#");
    }

    #[test]
    fn operator_input_without_delimiter_refused() {
        assert!(matches!(
            frame_operator_input(b"G28 XY"),
            Err(Error::UnframedInput)
        ));
    }

    #[test]
    fn operator_input_empty_refused() {
        assert!(matches!(frame_operator_input(b""), Err(Error::EmptyCommand)));
    }
}
