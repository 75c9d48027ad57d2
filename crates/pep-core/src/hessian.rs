//! Hessian 1.0 wire codec — the binary envelope spoken to the PEP daemon.
//!
//! This is the protocol. Every tag byte, length prefix, and terminator here
//! must match what the daemon's Hessian implementation emits and accepts.
//! The writer produces the strict subset the XACML mapping needs; the reader
//! accepts the full tag set below and rejects everything else.
//!
//! Grammar, one-byte tag first:
//!
//!   N            null
//!   T / F        boolean
//!   I i32        32-bit int, big-endian
//!   L i64        64-bit long, big-endian
//!   D f64        IEEE-754 double, big-endian
//!   d i64        date, signed milliseconds since the Unix epoch
//!   S u16 bytes  string, final chunk — length counts UTF-16 code units,
//!                payload is UTF-8
//!   s u16 bytes  string, continuation chunk — concatenated with the next
//!   B / b        binary final / continuation chunk, u16 counts raw bytes
//!   V [t][l]…z   list: optional type block, optional declared length,
//!                items, 'z' terminator
//!   M [t]…z      map: optional type block, (key, value) pairs, 'z'
//!   R i32        back-reference into the per-stream container table

use bytes::{BufMut, BytesMut};

/// Largest chunk a u16 length prefix can describe.
pub const MAX_CHUNK: usize = 65_535;

/// Cap on the cumulative reassembled string/binary payload of one stream.
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Cap on container nesting during decode.
pub const MAX_DEPTH: usize = 64;

// ── Value tree ────────────────────────────────────────────────────────────────

/// One node of the self-describing object stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    String(String),
    Bytes(Vec<u8>),
    List(List),
    Map(Map),
    /// Index into the per-stream container table. The writer emits this
    /// verbatim; the reader resolves it and never returns it in a tree.
    Ref(u32),
}

impl Value {
    /// Human label for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Date(_) => "date",
            Value::String(_) => "string",
            Value::Bytes(_) => "binary",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Ref(_) => "ref",
        }
    }
}

/// Ordered list with optional wire type name and advisory declared length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct List {
    pub type_name: Option<String>,
    /// Declared element count from the 'l' block. Advisory on decode.
    pub length: Option<i32>,
    pub items: Vec<Value>,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        Self { type_name: None, length: None, items }
    }
}

/// Insertion-ordered map. The wire format is a pair sequence, not a hash
/// table; lookup is a linear scan and iteration preserves wire order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Map {
    pub type_name: Option<String>,
    pub entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typed(type_name: &str) -> Self {
        Self { type_name: Some(type_name.to_string()), entries: Vec::new() }
    }

    /// Append a string-keyed entry, preserving insertion order.
    pub fn insert(&mut self, key: &str, value: Value) {
        self.entries.push((Value::String(key.to_string()), value));
    }

    /// First value stored under a string key, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find_map(|(k, v)| match k {
            Value::String(s) if s == key => Some(v),
            _ => None,
        })
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures while emitting a value tree. These are programmer errors or
/// oversize inputs; the writer performs no I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("missing required field at {path}")]
    MissingRequired { path: String },

    #[error("value of {len} bytes exceeds the {}-byte stream cap", MAX_PAYLOAD_BYTES)]
    Oversize { len: usize },

    #[error("reference {index} names a container not yet written ({written} so far)")]
    BadRef { index: u32, written: u32 },
}

/// Failures while reading a byte stream. Byte-level variants carry the
/// offset of the offending byte; mapping-level variants carry the field
/// path they were decoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated stream: needed {needed} more byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown tag 0x{tag:02x} at offset {offset}")]
    UnknownTag { offset: usize, tag: u8 },

    #[error("malformed UTF-8 in string at offset {offset}")]
    BadUtf8 { offset: usize },

    #[error("unresolvable reference {index} at offset {offset} (table holds {table_len})")]
    BadRef { offset: usize, index: i64, table_len: usize },

    #[error("{context}: expected {expected}, found {found}")]
    ShapeMismatch { context: String, expected: &'static str, found: String },

    #[error("missing required field {path}")]
    MissingRequired { path: String },

    #[error("{context}: {value} is not a valid {kind}")]
    EnumOutOfRange { context: String, value: i32, kind: &'static str },

    #[error("nesting exceeds the {max}-level cap")]
    DepthExceeded { max: usize },

    #[error("reassembled payload exceeds {limit} bytes at offset {offset}")]
    Oversize { offset: usize, limit: usize },

    #[error("trailing byte(s) after the root value at offset {offset}")]
    Trailing { offset: usize },
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Serialize a value tree to wire bytes.
///
/// Output is deterministic: the same tree yields the same bytes. Containers
/// are numbered in emission order so an explicit `Ref` can point at any
/// container already written; the writer itself never introduces aliasing.
pub fn serialize(root: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer { buf: BytesMut::with_capacity(256), containers: 0 };
    writer.write_value(root)?;
    Ok(writer.buf.to_vec())
}

struct Writer {
    buf: BytesMut,
    /// Containers emitted so far; assigns reference indices.
    containers: u32,
}

impl Writer {
    fn write_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.buf.put_u8(b'N'),
            Value::Bool(true) => self.buf.put_u8(b'T'),
            Value::Bool(false) => self.buf.put_u8(b'F'),
            Value::Int(i) => {
                self.buf.put_u8(b'I');
                self.buf.put_i32(*i);
            }
            Value::Long(l) => {
                self.buf.put_u8(b'L');
                self.buf.put_i64(*l);
            }
            Value::Double(d) => {
                self.buf.put_u8(b'D');
                self.buf.put_f64(*d);
            }
            Value::Date(ms) => {
                self.buf.put_u8(b'd');
                self.buf.put_i64(*ms);
            }
            Value::String(s) => self.write_string(s)?,
            Value::Bytes(b) => self.write_binary(b)?,
            Value::List(list) => {
                self.containers += 1;
                self.buf.put_u8(b'V');
                if let Some(name) = &list.type_name {
                    self.write_type(name)?;
                }
                if let Some(len) = list.length {
                    self.buf.put_u8(b'l');
                    self.buf.put_i32(len);
                }
                for item in &list.items {
                    self.write_value(item)?;
                }
                self.buf.put_u8(b'z');
            }
            Value::Map(map) => {
                self.containers += 1;
                self.buf.put_u8(b'M');
                if let Some(name) = &map.type_name {
                    self.write_type(name)?;
                }
                for (key, val) in &map.entries {
                    self.write_value(key)?;
                    self.write_value(val)?;
                }
                self.buf.put_u8(b'z');
            }
            Value::Ref(index) => {
                if *index >= self.containers {
                    return Err(EncodeError::BadRef { index: *index, written: self.containers });
                }
                self.buf.put_u8(b'R');
                self.buf.put_i32(*index as i32);
            }
        }
        Ok(())
    }

    /// Emit a string as continuation chunks plus a final chunk. Chunk length
    /// prefixes count UTF-16 code units; a supplementary-plane character
    /// (two units) is never split across a chunk boundary.
    fn write_string(&mut self, s: &str) -> Result<(), EncodeError> {
        if s.len() > MAX_PAYLOAD_BYTES {
            return Err(EncodeError::Oversize { len: s.len() });
        }
        let mut start = 0;
        let mut units = 0usize;
        for (i, ch) in s.char_indices() {
            let width = ch.len_utf16();
            if units + width > MAX_CHUNK {
                self.write_chunk(b's', units as u16, &s.as_bytes()[start..i]);
                start = i;
                units = 0;
            }
            units += width;
        }
        self.write_chunk(b'S', units as u16, &s.as_bytes()[start..]);
        Ok(())
    }

    fn write_binary(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        if bytes.len() > MAX_PAYLOAD_BYTES {
            return Err(EncodeError::Oversize { len: bytes.len() });
        }
        let mut rest = bytes;
        while rest.len() > MAX_CHUNK {
            let (head, tail) = rest.split_at(MAX_CHUNK);
            self.write_chunk(b'b', MAX_CHUNK as u16, head);
            rest = tail;
        }
        self.write_chunk(b'B', rest.len() as u16, rest);
        Ok(())
    }

    fn write_chunk(&mut self, tag: u8, len: u16, payload: &[u8]) {
        self.buf.put_u8(tag);
        self.buf.put_u16(len);
        self.buf.put_slice(payload);
    }

    /// 't' block: u16 byte length plus UTF-8 type name.
    fn write_type(&mut self, name: &str) -> Result<(), EncodeError> {
        if name.len() > MAX_CHUNK {
            return Err(EncodeError::Oversize { len: name.len() });
        }
        self.write_chunk(b't', name.len() as u16, name.as_bytes());
        Ok(())
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Deserialize one value tree from wire bytes.
///
/// Strict: unknown tags, truncation, malformed UTF-8, unresolvable
/// references, and trailing bytes all fail. Containers enter the reference
/// table when their header has been consumed, before their children are
/// read; a `Ref` to a completed container resolves to a structural copy,
/// a `Ref` into a still-open ancestor (a cycle) is an error.
pub fn deserialize(bytes: &[u8]) -> Result<Value, DecodeError> {
    let mut reader = Reader {
        buf: bytes,
        pos: 0,
        refs: Vec::new(),
        payload_left: MAX_PAYLOAD_BYTES,
    };
    let root = reader.read_value(0)?;
    if reader.pos != reader.buf.len() {
        return Err(DecodeError::Trailing { offset: reader.pos });
    }
    Ok(root)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Per-stream container table. `None` marks a container whose children
    /// are still being read.
    refs: Vec<Option<Value>>,
    /// Remaining string/binary reassembly budget for this stream.
    payload_left: usize,
}

impl Reader<'_> {
    fn read_value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthExceeded { max: MAX_DEPTH });
        }
        let offset = self.pos;
        let tag = self.take_u8()?;
        match tag {
            b'N' => Ok(Value::Null),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'I' => Ok(Value::Int(self.take_i32()?)),
            b'L' => Ok(Value::Long(self.take_i64()?)),
            b'D' => Ok(Value::Double(f64::from_bits(self.take_i64()? as u64))),
            b'd' => Ok(Value::Date(self.take_i64()?)),
            b'S' | b's' => self.read_string(tag),
            b'B' | b'b' => self.read_binary(tag),
            b'V' => self.read_list(depth),
            b'M' => self.read_map(depth),
            b'R' => self.read_ref(offset),
            other => Err(DecodeError::UnknownTag { offset, tag: other }),
        }
    }

    fn read_string(&mut self, mut tag: u8) -> Result<Value, DecodeError> {
        let mut out = String::new();
        loop {
            let units = self.take_u16()? as usize;
            self.read_utf8_units(units, &mut out)?;
            if tag == b'S' {
                return Ok(Value::String(out));
            }
            let offset = self.pos;
            tag = self.take_u8()?;
            if tag != b'S' && tag != b's' {
                return Err(DecodeError::ShapeMismatch {
                    context: format!("string continuation at offset {offset}"),
                    expected: "another string chunk",
                    found: format!("tag 0x{tag:02x}"),
                });
            }
        }
    }

    /// Read exactly `units` UTF-16 code units worth of UTF-8 text.
    /// A character counting two units must fit entirely in this chunk.
    fn read_utf8_units(&mut self, units: usize, out: &mut String) -> Result<(), DecodeError> {
        let mut remaining = units;
        while remaining > 0 {
            let offset = self.pos;
            let first = self.take_u8()?;
            let width = match first {
                0x00..=0x7f => 1,
                0xc0..=0xdf => 2,
                0xe0..=0xef => 3,
                0xf0..=0xf7 => 4,
                _ => return Err(DecodeError::BadUtf8 { offset }),
            };
            let mut encoded = [first, 0, 0, 0];
            for slot in encoded.iter_mut().take(width).skip(1) {
                *slot = self.take_u8()?;
            }
            // std validation rejects overlong forms and surrogate scalars
            let ch = std::str::from_utf8(&encoded[..width])
                .ok()
                .and_then(|s| s.chars().next())
                .ok_or(DecodeError::BadUtf8 { offset })?;
            let ch_units = ch.len_utf16();
            if ch_units > remaining {
                // surrogate pair split across a chunk boundary
                return Err(DecodeError::BadUtf8 { offset });
            }
            remaining -= ch_units;
            self.charge(offset, ch.len_utf8())?;
            out.push(ch);
        }
        Ok(())
    }

    fn read_binary(&mut self, mut tag: u8) -> Result<Value, DecodeError> {
        let mut out = Vec::new();
        loop {
            let len = self.take_u16()? as usize;
            let offset = self.pos;
            let chunk = self.take_slice(len)?;
            out.extend_from_slice(chunk);
            self.charge(offset, len)?;
            if tag == b'B' {
                return Ok(Value::Bytes(out));
            }
            let offset = self.pos;
            tag = self.take_u8()?;
            if tag != b'B' && tag != b'b' {
                return Err(DecodeError::ShapeMismatch {
                    context: format!("binary continuation at offset {offset}"),
                    expected: "another binary chunk",
                    found: format!("tag 0x{tag:02x}"),
                });
            }
        }
    }

    fn read_list(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let slot = self.refs.len();
        self.refs.push(None);
        let mut list = List::new();
        if self.peek() == Some(b't') {
            self.pos += 1;
            list.type_name = Some(self.take_type_name()?);
        }
        if self.peek() == Some(b'l') {
            self.pos += 1;
            list.length = Some(self.take_i32()?);
        }
        while self.peek() != Some(b'z') {
            list.items.push(self.read_value(depth + 1)?);
        }
        self.pos += 1; // consume 'z'
        let value = Value::List(list);
        self.refs[slot] = Some(value.clone());
        Ok(value)
    }

    fn read_map(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let slot = self.refs.len();
        self.refs.push(None);
        let mut map = Map::new();
        if self.peek() == Some(b't') {
            self.pos += 1;
            map.type_name = Some(self.take_type_name()?);
        }
        while self.peek() != Some(b'z') {
            let key = self.read_value(depth + 1)?;
            if self.peek() == Some(b'z') {
                return Err(DecodeError::ShapeMismatch {
                    context: format!("map entry at offset {}", self.pos),
                    expected: "a value after the key",
                    found: "map terminator".to_string(),
                });
            }
            let val = self.read_value(depth + 1)?;
            map.entries.push((key, val));
        }
        self.pos += 1; // consume 'z'
        let value = Value::Map(map);
        self.refs[slot] = Some(value.clone());
        Ok(value)
    }

    fn read_ref(&mut self, offset: usize) -> Result<Value, DecodeError> {
        let index = self.take_i32()? as i64;
        let table_len = self.refs.len();
        let resolved = usize::try_from(index)
            .ok()
            .and_then(|i| self.refs.get(i))
            .and_then(|entry| entry.as_ref());
        match resolved {
            Some(value) => Ok(value.clone()),
            None => Err(DecodeError::BadRef { offset, index, table_len }),
        }
    }

    fn take_type_name(&mut self) -> Result<String, DecodeError> {
        let len = self.take_u16()? as usize;
        let offset = self.pos;
        let raw = self.take_slice(len)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| DecodeError::BadUtf8 { offset })
    }

    fn charge(&mut self, offset: usize, n: usize) -> Result<(), DecodeError> {
        if n > self.payload_left {
            return Err(DecodeError::Oversize { offset, limit: MAX_PAYLOAD_BYTES });
        }
        self.payload_left -= n;
        Ok(())
    }

    // ── cursor primitives ──

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn take_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or(DecodeError::Truncated { offset: self.pos, needed: 1 })?;
        self.pos += 1;
        Ok(byte)
    }

    fn take_slice(&mut self, n: usize) -> Result<&[u8], DecodeError> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(DecodeError::Truncated { offset: self.pos, needed: n - available });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u16(&mut self) -> Result<u16, DecodeError> {
        let raw = self.take_slice(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn take_i32(&mut self) -> Result<i32, DecodeError> {
        let raw = self.take_slice(4)?;
        Ok(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn take_i64(&mut self) -> Result<i64, DecodeError> {
        let raw = self.take_slice(8)?;
        Ok(i64::from_be_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ]))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
