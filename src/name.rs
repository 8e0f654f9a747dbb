//! Domain name label decoding and validation

use crate::error::ProtocolError;

pub const MAX_LABEL_LEN: usize = 63;
/// Longest encoded name (labels + length octets + terminator).
pub const MAX_WIRE_NAME_LEN: usize = 255;
pub const MAX_NAME_LEN: usize = 253;

const POINTER_MASK: u8 = 0xC0;

/// Decodes an uncompressed label sequence starting at `offset`.
///
/// Reads never go past `limit` (clamped to the buffer). Returns the dotted
/// name and the number of bytes spanned, terminator included.
pub fn decode(buf: &[u8], offset: usize, limit: usize) -> Result<(String, usize), ProtocolError> {
    let limit = limit.min(buf.len());
    let mut pos = offset;
    let mut name = String::new();

    loop {
        if pos >= limit {
            return Err(ProtocolError::Truncated);
        }
        let len = buf[pos];
        if len == 0 {
            pos += 1;
            break;
        }
        match len & POINTER_MASK {
            POINTER_MASK => return Err(ProtocolError::UnsupportedEncoding),
            0 => {}
            _ => return Err(ProtocolError::InvalidLabel),
        }

        let start = pos + 1;
        let end = start + len as usize;
        if end > limit {
            return Err(ProtocolError::Truncated);
        }
        if end + 1 - offset > MAX_WIRE_NAME_LEN {
            return Err(ProtocolError::InvalidLabel);
        }
        // a '.' inside one label would read back as a different, multi-label name
        if buf[start..end].contains(&b'.') {
            return Err(ProtocolError::InvalidLabel);
        }

        if !name.is_empty() {
            name.push('.');
        }
        name.extend(buf[start..end].iter().map(|&b| b as char));
        pos = end;
    }

    Ok((name, pos - offset))
}

/// Hostname check used before a name may enter the table: letters, digits,
/// '-' and '.', with every label 1..=63 long.
pub fn is_valid(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-') {
        return false;
    }
    name.split('.').all(|label| !label.is_empty() && label.len() <= MAX_LABEL_LEN)
}

#[cfg(test)]
pub(crate) fn encode(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 2);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_dotted_name_and_exact_span() {
        let mut buf = vec![0xAA, 0xBB];
        buf.extend(encode("www.example.com"));
        buf.extend([0x00, 0x01, 0x00, 0x01]);

        let (name, used) = decode(&buf, 2, buf.len()).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(used, 17);
        assert_eq!(buf[2 + used..], [0x00, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn root_name_is_a_single_byte() {
        let (name, used) = decode(&[0], 0, 1).unwrap();
        assert_eq!(name, "");
        assert_eq!(used, 1);
    }

    #[test]
    fn label_past_limit_is_truncated() {
        let buf = [5, b'a', b'b'];
        assert_eq!(decode(&buf, 0, buf.len()), Err(ProtocolError::Truncated));
    }

    #[test]
    fn missing_terminator_is_truncated() {
        let buf = [3, b'c', b'o', b'm'];
        assert_eq!(decode(&buf, 0, buf.len()), Err(ProtocolError::Truncated));
    }

    #[test]
    fn limit_narrower_than_buffer_is_honoured() {
        let buf = encode("host.lan");
        assert_eq!(decode(&buf, 0, 5), Err(ProtocolError::Truncated));
        assert!(decode(&buf, 0, buf.len()).is_ok());
    }

    #[test]
    fn compression_pointer_is_rejected() {
        let buf = [3, b'w', b'w', b'w', 0xC0, 0x0C];
        assert_eq!(decode(&buf, 0, buf.len()), Err(ProtocolError::UnsupportedEncoding));
    }

    #[test]
    fn reserved_length_prefixes_are_invalid() {
        assert_eq!(decode(&[0x40, 0], 0, 2), Err(ProtocolError::InvalidLabel));
        assert_eq!(decode(&[0x80, 0], 0, 2), Err(ProtocolError::InvalidLabel));
    }

    #[test]
    fn dot_inside_a_label_is_invalid() {
        let one_label = [3, b'a', b'.', b'b', 0];
        assert_eq!(decode(&one_label, 0, one_label.len()), Err(ProtocolError::InvalidLabel));

        let two_labels = [1, b'a', 1, b'b', 0];
        assert_eq!(decode(&two_labels, 0, two_labels.len()), Ok(("a.b".to_string(), 5)));
    }

    #[test]
    fn overlong_names_are_invalid() {
        let label = "a".repeat(63);
        let name = [label.as_str(); 5].join(".");
        let buf = encode(&name);
        assert_eq!(decode(&buf, 0, buf.len()), Err(ProtocolError::InvalidLabel));
    }

    #[test]
    fn hostname_charset() {
        assert!(is_valid("localhost"));
        assert!(is_valid("my-host.example.COM"));
        assert!(is_valid("10.in-addr"));
        assert!(!is_valid(""));
        assert!(!is_valid("under_score.lan"));
        assert!(!is_valid("space host"));
        assert!(!is_valid("double..dot"));
        assert!(!is_valid(&"x".repeat(64)));
    }
}
