use thiserror::Error;

/// Size of the frame header: a right-aligned, space-padded ASCII decimal
/// (`%4d`) encoding the body length.
pub const HEADER_LEN: usize = 4;
/// Largest body a single frame may carry.
pub const MAX_BODY_LEN: usize = 512;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("body of {0} bytes exceeds the {MAX_BODY_LEN}-byte frame limit")]
    OversizedBody(usize),
    #[error("frame header is not a valid length prefix")]
    MalformedHeader,
}

/// Encodes `body` as a complete frame: `HEADER_LEN` bytes of `%4d`-style
/// ASCII length prefix followed by `body` itself.
pub fn encode(body: &[u8]) -> Result<Vec<u8>, FrameError> {
    if body.len() > MAX_BODY_LEN {
        return Err(FrameError::OversizedBody(body.len()));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&encode_header(body.len()));
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Encodes `len` as a 4-byte right-aligned, space-padded ASCII decimal.
///
/// Callers are expected to have already checked `len <= MAX_BODY_LEN`; this
/// function never fails, it just won't produce a sensible header for a
/// length that doesn't fit in 4 decimal digits.
pub fn encode_header(len: usize) -> [u8; HEADER_LEN] {
    debug_assert!(len <= MAX_BODY_LEN, "body length {len} doesn't fit a {HEADER_LEN}-digit header");
    let formatted = format!("{len:>width$}", width = HEADER_LEN);
    let mut header = [b' '; HEADER_LEN];
    header.copy_from_slice(formatted.as_bytes());
    header
}

/// Decodes a 4-byte header into a body length.
///
/// Leading ASCII spaces are accepted (the `%4d` encoding pads with them);
/// any other non-digit byte, or a decoded value exceeding `MAX_BODY_LEN`,
/// is `MalformedHeader`.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<usize, FrameError> {
    let mut seen_digit = false;
    let mut value: usize = 0;
    for &b in header {
        match b {
            b' ' if !seen_digit => {}
            b'0'..=b'9' => {
                seen_digit = true;
                value = value * 10 + usize::from(b - b'0');
            }
            _ => return Err(FrameError::MalformedHeader),
        }
    }
    if value > MAX_BODY_LEN {
        return Err(FrameError::MalformedHeader);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_for_every_length_up_to_the_cap() {
        for len in 0..=MAX_BODY_LEN {
            let header = encode_header(len);
            assert_eq!(header.len(), HEADER_LEN);
            assert!(header.iter().all(|&b| b == b' ' || b.is_ascii_digit()));
            assert_eq!(decode_header(&header).unwrap(), len);
        }
    }

    #[test]
    fn decode_header_accepts_leading_spaces() {
        assert_eq!(decode_header(b"   5").unwrap(), 5);
        assert_eq!(decode_header(b"  42").unwrap(), 42);
        assert_eq!(decode_header(b"0000").unwrap(), 0);
    }

    #[test]
    fn decode_header_rejects_space_after_digit() {
        assert_eq!(decode_header(b"1 23").unwrap_err(), FrameError::MalformedHeader);
    }

    #[test]
    fn decode_header_rejects_non_decimal() {
        assert_eq!(decode_header(b"abcd").unwrap_err(), FrameError::MalformedHeader);
        assert_eq!(decode_header(b"-123").unwrap_err(), FrameError::MalformedHeader);
    }

    #[test]
    fn decode_header_rejects_over_cap() {
        assert_eq!(decode_header(b"9999").unwrap_err(), FrameError::MalformedHeader);
        assert_eq!(decode_header(b" 513").unwrap_err(), FrameError::MalformedHeader);
    }

    #[test]
    fn encode_rejects_oversized_body() {
        let body = vec![0u8; MAX_BODY_LEN + 1];
        assert_eq!(encode(&body).unwrap_err(), FrameError::OversizedBody(MAX_BODY_LEN + 1));
    }

    #[test]
    fn encode_emits_header_then_body() {
        let frame = encode(b"hello").unwrap();
        assert_eq!(&frame[..HEADER_LEN], b"   5");
        assert_eq!(&frame[HEADER_LEN..], b"hello");
    }
}
