//! Minimal CBOR reader and writer.
//!
//! Covers exactly what the ledger wire format needs: unsigned and negative
//! integers, byte strings (definite and chunked), arrays and maps (definite
//! and indefinite), tags, booleans and null. The reader can hand back the raw
//! byte span of any item, which is what lets the assembler keep a transaction
//! body verbatim while rewriting its witness set.

use thiserror::Error;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

const BREAK: u8 = 0xff;
const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const NULL: u8 = 0xf6;

/// Nesting limit for [`Decoder::skip`].
const MAX_DEPTH: usize = 64;

/// Error raised by the CBOR reader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("CBOR error at byte {offset}: {message}")]
pub struct CborError {
    /// Byte offset where decoding failed.
    pub offset: usize,
    /// Description of the failure.
    pub message: String,
}

/// Result type alias for CBOR decoding.
pub type CborResult<T> = std::result::Result<T, CborError>;

/// Append-only CBOR writer.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Create an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the encoder and return the written bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write an item head using the shortest argument form.
    fn head(&mut self, major: u8, value: u64) -> &mut Self {
        let major = major << 5;
        if value < 24 {
            self.buf.push(major | value as u8);
        } else if value <= u64::from(u8::MAX) {
            self.buf.push(major | 24);
            self.buf.push(value as u8);
        } else if value <= u64::from(u16::MAX) {
            self.buf.push(major | 25);
            self.buf.extend_from_slice(&(value as u16).to_be_bytes());
        } else if value <= u64::from(u32::MAX) {
            self.buf.push(major | 26);
            self.buf.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buf.push(major | 27);
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
        self
    }

    /// Write an unsigned integer.
    pub fn uint(&mut self, value: u64) -> &mut Self {
        self.head(MAJOR_UNSIGNED, value)
    }

    /// Write the negative integer `-1 - n`.
    pub fn negative(&mut self, n: u64) -> &mut Self {
        self.head(MAJOR_NEGATIVE, n)
    }

    /// Write a definite-length byte string.
    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.head(MAJOR_BYTES, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Write a definite-length text string.
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.head(MAJOR_TEXT, text.len() as u64);
        self.buf.extend_from_slice(text.as_bytes());
        self
    }

    /// Start a definite-length array.
    pub fn array(&mut self, len: u64) -> &mut Self {
        self.head(MAJOR_ARRAY, len)
    }

    /// Start an indefinite-length array; close it with [`Encoder::end`].
    pub fn array_indefinite(&mut self) -> &mut Self {
        self.buf.push((MAJOR_ARRAY << 5) | 31);
        self
    }

    /// Start an indefinite-length byte string; close it with [`Encoder::end`].
    pub fn bytes_indefinite(&mut self) -> &mut Self {
        self.buf.push((MAJOR_BYTES << 5) | 31);
        self
    }

    /// Start a definite-length map.
    pub fn map(&mut self, len: u64) -> &mut Self {
        self.head(MAJOR_MAP, len)
    }

    /// Close an indefinite-length item.
    pub fn end(&mut self) -> &mut Self {
        self.buf.push(BREAK);
        self
    }

    /// Write a tag; the tagged item follows.
    pub fn tag(&mut self, tag: u64) -> &mut Self {
        self.head(MAJOR_TAG, tag)
    }

    /// Write a boolean.
    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf.push(if value { TRUE } else { FALSE });
        self
    }

    /// Write null.
    pub fn null(&mut self) -> &mut Self {
        self.buf.push(NULL);
        self
    }

    /// Append already encoded CBOR verbatim.
    pub fn raw(&mut self, item: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(item);
        self
    }
}

/// The type of the next item, as reported by [`Decoder::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Unsigned integer.
    Unsigned,
    /// Negative integer.
    Negative,
    /// Byte string.
    Bytes,
    /// Text string.
    Text,
    /// Array.
    Array,
    /// Map.
    Map,
    /// Tagged item.
    Tag,
    /// Simple value, float or break.
    Simple,
}

/// Cursor over a CBOR byte buffer.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder positioned at the start of `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// True once every byte has been consumed.
    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn error(&self, message: impl Into<String>) -> CborError {
        CborError {
            offset: self.pos,
            message: message.into(),
        }
    }

    /// Fail unless the whole buffer has been consumed.
    pub fn finish(&self) -> CborResult<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error(format!(
                "{} trailing bytes",
                self.buf.len() - self.pos
            )))
        }
    }

    fn peek(&self) -> CborResult<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unexpected end of input"))
    }

    fn byte(&mut self) -> CborResult<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: u64) -> CborResult<&'a [u8]> {
        let len = usize::try_from(len).map_err(|_| self.error("length overflows usize"))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| self.error(format!("need {len} bytes, input too short")))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read an item head. `None` as argument means indefinite length.
    fn head(&mut self) -> CborResult<(u8, Option<u64>)> {
        let initial = self.byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;
        let argument = match info {
            0..=23 => Some(u64::from(info)),
            24 => Some(u64::from(self.byte()?)),
            25 => {
                let s = self.take(2)?;
                Some(u64::from(u16::from_be_bytes([s[0], s[1]])))
            }
            26 => {
                let s = self.take(4)?;
                Some(u64::from(u32::from_be_bytes([s[0], s[1], s[2], s[3]])))
            }
            27 => {
                let s = self.take(8)?;
                let mut be = [0u8; 8];
                be.copy_from_slice(s);
                Some(u64::from_be_bytes(be))
            }
            31 => None,
            _ => {
                self.pos -= 1;
                return Err(self.error(format!("reserved additional info {info}")));
            }
        };
        Ok((major, argument))
    }

    fn expect_head(&mut self, major: u8, what: &str) -> CborResult<Option<u64>> {
        let start = self.pos;
        let (found, argument) = self.head()?;
        if found != major {
            self.pos = start;
            return Err(self.error(format!("expected {what}, found major type {found}")));
        }
        Ok(argument)
    }

    /// Type of the next item without consuming it.
    pub fn kind(&self) -> CborResult<Kind> {
        Ok(match self.peek()? >> 5 {
            MAJOR_UNSIGNED => Kind::Unsigned,
            MAJOR_NEGATIVE => Kind::Negative,
            MAJOR_BYTES => Kind::Bytes,
            MAJOR_TEXT => Kind::Text,
            MAJOR_ARRAY => Kind::Array,
            MAJOR_MAP => Kind::Map,
            MAJOR_TAG => Kind::Tag,
            _ => Kind::Simple,
        })
    }

    /// Read an unsigned integer.
    pub fn uint(&mut self) -> CborResult<u64> {
        self.expect_head(MAJOR_UNSIGNED, "unsigned integer")?
            .ok_or_else(|| self.error("integer cannot be indefinite"))
    }

    /// Read an unsigned or negative integer.
    pub fn int(&mut self) -> CborResult<i128> {
        let start = self.pos;
        match self.head()? {
            (MAJOR_UNSIGNED, Some(v)) => Ok(i128::from(v)),
            (MAJOR_NEGATIVE, Some(n)) => Ok(-1 - i128::from(n)),
            (major, _) => {
                self.pos = start;
                Err(self.error(format!("expected integer, found major type {major}")))
            }
        }
    }

    /// Read a byte string, joining chunks of an indefinite-length string.
    pub fn bytes(&mut self) -> CborResult<Vec<u8>> {
        match self.expect_head(MAJOR_BYTES, "byte string")? {
            Some(len) => Ok(self.take(len)?.to_vec()),
            None => {
                let mut out = Vec::new();
                while !self.is_break()? {
                    let len = self
                        .expect_head(MAJOR_BYTES, "byte string chunk")?
                        .ok_or_else(|| self.error("nested indefinite byte string"))?;
                    out.extend_from_slice(self.take(len)?);
                }
                self.pos += 1;
                Ok(out)
            }
        }
    }

    /// Read an array head. `None` means indefinite length.
    pub fn array(&mut self) -> CborResult<Option<u64>> {
        self.expect_head(MAJOR_ARRAY, "array")
    }

    /// Read a map head. `None` means indefinite length.
    pub fn map(&mut self) -> CborResult<Option<u64>> {
        self.expect_head(MAJOR_MAP, "map")
    }

    /// Read a tag number; the tagged item follows.
    pub fn tag(&mut self) -> CborResult<u64> {
        self.expect_head(MAJOR_TAG, "tag")?
            .ok_or_else(|| self.error("tag cannot be indefinite"))
    }

    /// Read a boolean.
    pub fn bool(&mut self) -> CborResult<bool> {
        match self.peek()? {
            TRUE => {
                self.pos += 1;
                Ok(true)
            }
            FALSE => {
                self.pos += 1;
                Ok(false)
            }
            other => Err(self.error(format!("expected bool, found 0x{other:02x}"))),
        }
    }

    /// True if the next byte is the break marker of an indefinite item.
    pub fn is_break(&self) -> CborResult<bool> {
        Ok(self.peek()? == BREAK)
    }

    /// Consume a break marker.
    pub fn end(&mut self) -> CborResult<()> {
        if self.is_break()? {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error("expected break"))
        }
    }

    /// True while there are items left in a container of the given length.
    ///
    /// `remaining` counts down definite containers; indefinite containers
    /// (`None`) end at the break marker, which this consumes.
    pub fn has_next(&mut self, remaining: &mut Option<u64>) -> CborResult<bool> {
        match remaining {
            Some(0) => Ok(false),
            Some(n) => {
                *n -= 1;
                Ok(true)
            }
            None => {
                if self.is_break()? {
                    self.pos += 1;
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
        }
    }

    /// Skip over one complete item.
    pub fn skip(&mut self) -> CborResult<()> {
        self.skip_nested(0)
    }

    fn skip_nested(&mut self, depth: usize) -> CborResult<()> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        let initial = self.peek()?;
        let major = initial >> 5;
        if major == MAJOR_SIMPLE {
            let extra = match initial & 0x1f {
                0..=23 => 0,
                24 => 1,
                25 => 2,
                26 => 4,
                27 => 8,
                _ => return Err(self.error(format!("unexpected simple value 0x{initial:02x}"))),
            };
            self.take(1 + extra)?;
            return Ok(());
        }
        let (_, argument) = self.head()?;
        match major {
            MAJOR_UNSIGNED | MAJOR_NEGATIVE | MAJOR_TAG if argument.is_none() => {
                Err(self.error("indefinite length on scalar"))
            }
            MAJOR_UNSIGNED | MAJOR_NEGATIVE => Ok(()),
            MAJOR_TAG => self.skip_nested(depth + 1),
            MAJOR_BYTES | MAJOR_TEXT => match argument {
                Some(len) => self.take(len).map(|_| ()),
                None => {
                    while !self.is_break()? {
                        let len = self
                            .expect_head(major, "string chunk")?
                            .ok_or_else(|| self.error("nested indefinite string"))?;
                        self.take(len)?;
                    }
                    self.pos += 1;
                    Ok(())
                }
            },
            MAJOR_ARRAY | MAJOR_MAP => {
                let per_entry = if major == MAJOR_MAP { 2 } else { 1 };
                let mut remaining = argument;
                while self.has_next(&mut remaining)? {
                    for _ in 0..per_entry {
                        self.skip_nested(depth + 1)?;
                    }
                }
                Ok(())
            }
            _ => Err(self.error(format!("unknown major type {major}"))),
        }
    }

    /// Skip one item and return its raw encoded bytes.
    pub fn raw_item(&mut self) -> CborResult<&'a [u8]> {
        let start = self.pos;
        self.skip()?;
        Ok(&self.buf[start..self.pos])
    }
}
