//! Blocking stream reader feeding callbacks

use crate::runner::{Buffering, Flow};
use std::io::{self, BufRead, BufReader, Read};

const READ_CHUNK: usize = 8192;

/// Read `reader` until EOF or until `deliver` returns [`Flow::Stop`]
///
/// Output is decoded lossily. In line mode the trailing `\n` (and `\r`) is
/// removed before delivery. In the raw modes a multibyte character split by
/// a read boundary is held back and delivered whole with the next piece.
pub fn read_stream<R, F>(reader: R, buffering: Buffering, mut deliver: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(&str) -> Flow,
{
    match buffering {
        Buffering::Line => {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf)? == 0 {
                    break;
                }
                let line = String::from_utf8_lossy(trim_newline(&buf));
                if deliver(&line) == Flow::Stop {
                    break;
                }
            }
        }
        Buffering::Unbuffered => {
            let mut reader = reader;
            let mut buf = [0u8; READ_CHUNK];
            let mut pending = Vec::new();
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                pending.extend_from_slice(&buf[..n]);
                let text = take_complete(&mut pending);
                if !text.is_empty() && deliver(&text) == Flow::Stop {
                    return Ok(());
                }
            }
            flush(&pending, &mut deliver);
        }
        Buffering::Chunk(size) => {
            let mut reader = reader;
            let mut buf = vec![0u8; size];
            let mut pending = Vec::new();
            loop {
                let n = fill(&mut reader, &mut buf)?;
                if n == 0 {
                    break;
                }
                pending.extend_from_slice(&buf[..n]);
                let text = take_complete(&mut pending);
                if !text.is_empty() && deliver(&text) == Flow::Stop {
                    return Ok(());
                }
                if n < size {
                    break;
                }
            }
            flush(&pending, &mut deliver);
        }
    }
    Ok(())
}

/// Decode `pending`, keeping back a multibyte character cut off at the end
fn take_complete(pending: &mut Vec<u8>) -> String {
    let tail = pending.split_off(pending.len() - incomplete_tail(pending));
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = tail;
    text
}

/// Deliver whatever is left at EOF
fn flush<F: FnMut(&str) -> Flow>(pending: &[u8], deliver: &mut F) {
    if !pending.is_empty() {
        deliver(&String::from_utf8_lossy(pending));
    }
}

/// Length of a truncated UTF-8 sequence at the end of `bytes`
fn incomplete_tail(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for (i, &byte) in bytes.iter().enumerate().skip(start).rev() {
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        let available = bytes.len() - i;
        return if available < needed { available } else { 0 };
    }
    0
}

/// Read until `buf` is full or EOF, returning the number of bytes read
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

pub(crate) fn trim_newline(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Decode process output into a `String`, replacing invalid UTF-8
pub(crate) fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
