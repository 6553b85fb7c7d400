//! Companion app messages
//!
//! The phone sends settings as a key/value dictionary:
//! ```text
//! ┌───────┬────────────────────────────────────────────────┐
//! │ COUNT │ TUPLE × COUNT                                  │
//! │ 1B    │ KEY (4B LE) │ TYPE (1B) │ LEN (2B LE) │ VALUE  │
//! └───────┴────────────────────────────────────────────────┘
//! ```
//! The whole payload is validated before any tuple is handed out, so a
//! malformed message never applies halfway.

use core::fmt;

use super::settings::Settings;

const TUPLE_HEADER_LEN: usize = 7;

const TYPE_BYTE_ARRAY: u8 = 0;
const TYPE_CSTRING: u8 = 1;
const TYPE_UINT: u8 = 2;
const TYPE_INT: u8 = 3;

/// Keys understood by the watch face
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum MessageKey {
    SecondTick = 10000,
    NotifyDisconnect = 10001,
}

impl MessageKey {
    pub fn from_u32(key: u32) -> Option<Self> {
        match key {
            10000 => Some(MessageKey::SecondTick),
            10001 => Some(MessageKey::NotifyDisconnect),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// No tuple count
    Empty,
    /// Payload ends inside tuple `index`
    Truncated { index: u8 },
    /// Tuple `index` has an unknown type tag
    UnknownType { index: u8, tag: u8 },
    /// Integer tuple `index` isn't 1, 2 or 4 bytes wide
    BadIntWidth { index: u8, len: u16 },
    /// String tuple `index` isn't NUL-terminated UTF-8
    BadString { index: u8 },
    /// Bytes left over after the last tuple
    TrailingBytes(usize),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::Empty => write!(f, "empty message"),
            MessageError::Truncated { index } => write!(f, "tuple {} truncated", index),
            MessageError::UnknownType { index, tag } => {
                write!(f, "tuple {} has unknown type {}", index, tag)
            }
            MessageError::BadIntWidth { index, len } => {
                write!(f, "tuple {} has integer width {}", index, len)
            }
            MessageError::BadString { index } => write!(f, "tuple {} is not a C string", index),
            MessageError::TrailingBytes(n) => write!(f, "{} trailing bytes", n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TupleValue<'a> {
    Bytes(&'a [u8]),
    CString(&'a str),
    UInt(u32),
    Int(i32),
}

impl TupleValue<'_> {
    /// Interpret the value as a toggle state.
    pub fn as_bool(&self) -> bool {
        match *self {
            TupleValue::Bytes(bytes) => bytes.first().is_some_and(|b| *b != 0),
            TupleValue::CString(s) => matches!(s, "true" | "1" | "on"),
            TupleValue::UInt(v) => v != 0,
            TupleValue::Int(v) => v != 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tuple<'a> {
    pub key: u32,
    pub value: TupleValue<'a>,
}

/// A validated message payload
#[derive(Clone, Copy, Debug)]
pub struct Dictionary<'a> {
    count: u8,
    tuples: &'a [u8],
}

impl<'a> Dictionary<'a> {
    /// Validate `data` as a complete dictionary.
    pub fn parse(data: &'a [u8]) -> Result<Self, MessageError> {
        let (&count, tuples) = data.split_first().ok_or(MessageError::Empty)?;

        let mut rest = tuples;
        for index in 0..count {
            let (_, tail) = read_tuple(rest, index)?;
            rest = tail;
        }
        if !rest.is_empty() {
            return Err(MessageError::TrailingBytes(rest.len()));
        }

        Ok(Self { count, tuples })
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> TupleIter<'a> {
        TupleIter {
            index: 0,
            count: self.count,
            rest: self.tuples,
        }
    }

    /// Value stored under `key`, if any
    pub fn get(&self, key: MessageKey) -> Option<TupleValue<'a>> {
        self.iter()
            .find(|tuple| tuple.key == key as u32)
            .map(|tuple| tuple.value)
    }
}

pub struct TupleIter<'a> {
    index: u8,
    count: u8,
    rest: &'a [u8],
}

impl<'a> Iterator for TupleIter<'a> {
    type Item = Tuple<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        // Already validated in `Dictionary::parse`
        let (tuple, rest) = read_tuple(self.rest, self.index).ok()?;
        self.index += 1;
        self.rest = rest;
        Some(tuple)
    }
}

/// Split one tuple off the front of `data`.
fn read_tuple(data: &[u8], index: u8) -> Result<(Tuple<'_>, &[u8]), MessageError> {
    if data.len() < TUPLE_HEADER_LEN {
        return Err(MessageError::Truncated { index });
    }
    let key = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let tag = data[4];
    let len = u16::from_le_bytes([data[5], data[6]]);

    let body = &data[TUPLE_HEADER_LEN..];
    if body.len() < len as usize {
        return Err(MessageError::Truncated { index });
    }
    let (raw, rest) = body.split_at(len as usize);

    let value = match tag {
        TYPE_BYTE_ARRAY => TupleValue::Bytes(raw),
        TYPE_CSTRING => {
            let text = match raw.split_last() {
                Some((&0, text)) => text,
                _ => return Err(MessageError::BadString { index }),
            };
            let text = core::str::from_utf8(text).map_err(|_| MessageError::BadString { index })?;
            TupleValue::CString(text)
        }
        TYPE_UINT => TupleValue::UInt(match *raw {
            [a] => a as u32,
            [a, b] => u16::from_le_bytes([a, b]) as u32,
            [a, b, c, d] => u32::from_le_bytes([a, b, c, d]),
            _ => return Err(MessageError::BadIntWidth { index, len }),
        }),
        TYPE_INT => TupleValue::Int(match *raw {
            [a] => a as i8 as i32,
            [a, b] => i16::from_le_bytes([a, b]) as i32,
            [a, b, c, d] => i32::from_le_bytes([a, b, c, d]),
            _ => return Err(MessageError::BadIntWidth { index, len }),
        }),
        tag => return Err(MessageError::UnknownType { index, tag }),
    };

    Ok((Tuple { key, value }, rest))
}

/// Apply the settings carried by `message`. Keys not present leave their
/// setting alone and unknown keys are ignored.
///
/// Returns whether any setting changed.
pub fn apply_message(settings: &mut Settings, message: &Dictionary<'_>) -> bool {
    let before = *settings;

    for tuple in message.iter() {
        match MessageKey::from_u32(tuple.key) {
            Some(MessageKey::SecondTick) => settings.show_seconds = tuple.value.as_bool(),
            Some(MessageKey::NotifyDisconnect) => {
                settings.notify_disconnect = tuple.value.as_bool()
            }
            None => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Ignoring unknown message key {}", tuple.key);
            }
        }
    }

    *settings != before
}

/// Parse `data` and apply it to `settings` in one go.
///
/// On error `settings` is left untouched.
pub fn apply_payload(settings: &mut Settings, data: &[u8]) -> Result<bool, MessageError> {
    let message = Dictionary::parse(data)?;
    Ok(apply_message(settings, &message))
}
