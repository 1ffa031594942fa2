//! Sidecar JSON encoding and content hashing.
//!
//! Existing sidecar trees were written by an encoder that escapes every non-ASCII
//! character as `\uXXXX` (lowercase hex, UTF-16 units) and, in its compact form, also
//! escapes `/`. Hashes are taken over that compact form and files are written in the
//! pretty form with slashes left alone, so both stay bit-compatible with those trees.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use sha2::{Digest, Sha256};

use super::error::PoffResult;

/// Wraps a serde_json formatter and re-escapes string fragments.
pub struct LegacyFormatter<F> {
    inner: F,
    escape_slashes: bool,
}

impl<F> LegacyFormatter<F> {
    pub fn new(inner: F, escape_slashes: bool) -> Self {
        Self { inner, escape_slashes }
    }
}

impl<F: Formatter> Formatter for LegacyFormatter<F> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            let slash = ch == '/' && self.escape_slashes;
            if ch.is_ascii() && !slash {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            if slash {
                writer.write_all(b"\\/")?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }
}

fn encode_with<T, F>(value: &T, formatter: F) -> PoffResult<Vec<u8>>
where
    T: Serialize + ?Sized,
    F: Formatter,
{
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Compact canonical encoding used as hash input.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> PoffResult<Vec<u8>> {
    encode_with(value, LegacyFormatter::new(CompactFormatter, true))
}

/// Pretty encoding written to sidecar files (4-space indent, slashes unescaped).
pub fn to_sidecar_string<T: Serialize + ?Sized>(value: &T) -> PoffResult<String> {
    let bytes = encode_with(value, LegacyFormatter::new(PrettyFormatter::with_indent(b"    "), false))?;
    // Formatter output is ASCII-only by construction.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// SHA-256 (lowercase hex) over the canonical encoding of `value`.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> PoffResult<String> {
    let bytes = to_canonical_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}
