//! Line framing
//!
//! Events are delimited by `\n`. A trailing `\r` is tolerated and blank
//! lines are skipped. A peer that sends more than `max_frame_size` bytes
//! without a newline is cut off.

use bytes::{Bytes, BytesMut};

use crate::error::ProtocolError;

/// Split the next complete line off the front of `buf`
///
/// Returns `Ok(None)` when more data is needed. The returned line excludes
/// its terminator.
pub fn next_line(buf: &mut BytesMut, max_frame_size: usize) -> Result<Option<Bytes>, ProtocolError> {
    loop {
        let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
            if buf.len() > max_frame_size {
                return Err(ProtocolError::FrameTooLarge {
                    size: buf.len(),
                    max: max_frame_size,
                });
            }
            return Ok(None);
        };

        if pos > max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: pos,
                max: max_frame_size,
            });
        }

        let mut line = buf.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(pos - 1);
        }

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        return Ok(Some(line.freeze()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_then_complete() {
        let mut buf = BytesMut::from(&b"{\"event\":"[..]);
        assert_eq!(next_line(&mut buf, 1024), Ok(None));

        buf.extend_from_slice(b"\"list tracks\"}\n");
        let line = next_line(&mut buf, 1024).unwrap().unwrap();
        assert_eq!(&line[..], b"{\"event\":\"list tracks\"}");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_lines_and_crlf() {
        let mut buf = BytesMut::from(&b"one\r\n\n  \ntwo\nthr"[..]);

        assert_eq!(next_line(&mut buf, 1024).unwrap().as_deref(), Some(&b"one"[..]));
        assert_eq!(next_line(&mut buf, 1024).unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(next_line(&mut buf, 1024), Ok(None));
        assert_eq!(&buf[..], b"thr");
    }

    #[test]
    fn test_frame_too_large() {
        let mut buf = BytesMut::from(&[b'x'; 20][..]);
        assert_eq!(
            next_line(&mut buf, 16),
            Err(ProtocolError::FrameTooLarge { size: 20, max: 16 })
        );

        let mut buf = BytesMut::from(&b"0123456789abcdefghij\nok\n"[..]);
        assert!(next_line(&mut buf, 16).is_err());
    }
}
