//! External term format decoder
//!
//! Decodes version-131 external term data into [`Term`]. Tuples are
//! classified once, here: a 2-tuple becomes [`Term::Pair`], a 3-tuple whose
//! middle element is a list becomes an expression [`Term::Node`], anything
//! else stays a raw [`Term::Tuple`]. Downstream code never re-inspects tuple
//! arity.
//!
//! Process-bound terms (pids, ports, refs, funs) cannot appear in quoted
//! forms and decode to an unsupported-tag error.

use crate::term::{Args, Node, Term};

use super::{inflate, DecodeError};

const VERSION: u8 = 131;

/// Nesting ceiling for adversarially deep payloads; fails closed with
/// [`DecodeError::TooDeep`] instead of exhausting the stack.
const MAX_DEPTH: usize = 200;

const SMALL_INTEGER_EXT: u8 = 97;
const INTEGER_EXT: u8 = 98;
const FLOAT_EXT: u8 = 99;
const NEW_FLOAT_EXT: u8 = 70;
const ATOM_EXT: u8 = 100;
const SMALL_ATOM_EXT: u8 = 115;
const ATOM_UTF8_EXT: u8 = 118;
const SMALL_ATOM_UTF8_EXT: u8 = 119;
const SMALL_TUPLE_EXT: u8 = 104;
const LARGE_TUPLE_EXT: u8 = 105;
const NIL_EXT: u8 = 106;
const STRING_EXT: u8 = 107;
const LIST_EXT: u8 = 108;
const BINARY_EXT: u8 = 109;
const SMALL_BIG_EXT: u8 = 110;
const LARGE_BIG_EXT: u8 = 111;
const MAP_EXT: u8 = 116;
const COMPRESSED: u8 = 80;

/// Decode a complete external term, version byte included.
pub fn decode(bytes: &[u8]) -> Result<Term, DecodeError> {
    let mut cursor = Cursor::new(bytes);

    match cursor.u8()? {
        VERSION => {}
        version => return Err(DecodeError::UnsupportedVersion(version)),
    }

    if cursor.peek() == Some(COMPRESSED) {
        cursor.u8()?;
        let uncompressed_size = cursor.u32_be()? as usize;
        let inflated = inflate(cursor.rest(), uncompressed_size)?;
        let mut inner = Cursor::new(&inflated);

        return decode_term(&mut inner, 0);
    }

    decode_term(&mut cursor, 0)
}

fn decode_term(cursor: &mut Cursor, depth: usize) -> Result<Term, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::TooDeep);
    }

    match cursor.u8()? {
        SMALL_INTEGER_EXT => Ok(Term::Int(i64::from(cursor.u8()?))),
        INTEGER_EXT => Ok(Term::Int(i64::from(cursor.i32_be()?))),
        FLOAT_EXT => {
            let text = cursor.take(31)?;
            let trimmed: &[u8] = match text.iter().position(|byte| *byte == 0) {
                Some(end) => &text[..end],
                None => text,
            };
            std::str::from_utf8(trimmed)
                .ok()
                .and_then(|text| text.trim().parse::<f64>().ok())
                .map(Term::Float)
                .ok_or(DecodeError::BadFloat)
        }
        NEW_FLOAT_EXT => Ok(Term::Float(f64::from_be_bytes(cursor.array()?))),
        ATOM_EXT | ATOM_UTF8_EXT => {
            let length = cursor.u16_be()? as usize;
            let name = cursor.take(length)?;
            Ok(Term::Atom(String::from_utf8_lossy(name).into_owned()))
        }
        SMALL_ATOM_EXT | SMALL_ATOM_UTF8_EXT => {
            let length = cursor.u8()? as usize;
            let name = cursor.take(length)?;
            Ok(Term::Atom(String::from_utf8_lossy(name).into_owned()))
        }
        SMALL_TUPLE_EXT => {
            let arity = cursor.u8()? as usize;
            decode_tuple(cursor, arity, depth + 1)
        }
        LARGE_TUPLE_EXT => {
            let arity = cursor.u32_be()? as usize;
            decode_tuple(cursor, arity, depth + 1)
        }
        NIL_EXT => Ok(Term::List(Vec::new())),
        STRING_EXT => {
            // a byte list the encoder packed without per-element tags
            let length = cursor.u16_be()? as usize;
            let bytes = cursor.take(length)?;
            Ok(Term::List(
                bytes.iter().map(|byte| Term::Int(i64::from(*byte))).collect(),
            ))
        }
        LIST_EXT => {
            let length = cursor.u32_be()? as usize;
            let mut elements = Vec::with_capacity(length);
            for _ in 0..length {
                elements.push(decode_term(cursor, depth + 1)?);
            }
            // quoted forms only contain proper lists
            match cursor.u8()? {
                NIL_EXT => Ok(Term::List(elements)),
                _ => Err(DecodeError::ImproperList),
            }
        }
        BINARY_EXT => {
            let length = cursor.u32_be()? as usize;
            Ok(Term::Binary(cursor.take(length)?.to_vec()))
        }
        SMALL_BIG_EXT => {
            let magnitude_bytes = cursor.u8()? as usize;
            decode_big(cursor, magnitude_bytes)
        }
        LARGE_BIG_EXT => {
            let magnitude_bytes = cursor.u32_be()? as usize;
            decode_big(cursor, magnitude_bytes)
        }
        MAP_EXT => {
            let arity = cursor.u32_be()? as usize;
            let mut pairs = Vec::with_capacity(arity);
            for _ in 0..arity {
                let key = decode_term(cursor, depth + 1)?;
                let value = decode_term(cursor, depth + 1)?;
                pairs.push((key, value));
            }
            Ok(Term::Map(pairs))
        }
        tag => Err(DecodeError::UnsupportedTag(tag)),
    }
}

fn decode_tuple(cursor: &mut Cursor, arity: usize, depth: usize) -> Result<Term, DecodeError> {
    let mut elements = Vec::with_capacity(arity);
    for _ in 0..arity {
        elements.push(decode_term(cursor, depth)?);
    }

    Ok(classify_tuple(elements))
}

fn classify_tuple(mut elements: Vec<Term>) -> Term {
    match elements.len() {
        2 => {
            let right = elements.pop().unwrap_or(Term::List(Vec::new()));
            let left = elements.pop().unwrap_or(Term::List(Vec::new()));
            Term::Pair(Box::new(left), Box::new(right))
        }
        3 if matches!(elements[1], Term::List(_)) => {
            let args_term = elements.pop().unwrap_or(Term::List(Vec::new()));
            let meta = match elements.pop() {
                Some(Term::List(meta)) => meta,
                _ => Vec::new(),
            };
            let head = elements.pop().unwrap_or(Term::List(Vec::new()));

            let args = match args_term {
                Term::List(args) => Args::List(args),
                Term::Atom(context) => Args::Context(context),
                // a 3-tuple whose third element is neither reverts to raw
                other => {
                    return Term::Tuple(vec![head, Term::List(meta), other]);
                }
            };

            Term::Node(Box::new(Node::new(head, meta, args)))
        }
        _ => Term::Tuple(elements),
    }
}

fn decode_big(cursor: &mut Cursor, magnitude_bytes: usize) -> Result<Term, DecodeError> {
    if magnitude_bytes > 8 {
        return Err(DecodeError::BigTooLarge(magnitude_bytes));
    }

    let negative = cursor.u8()? == 1;
    let digits = cursor.take(magnitude_bytes)?;

    // little-endian magnitude
    let mut magnitude: u64 = 0;
    for (index, digit) in digits.iter().enumerate() {
        magnitude |= u64::from(*digit) << (8 * index);
    }

    let value = i64::try_from(magnitude).map_err(|_| DecodeError::BigTooLarge(magnitude_bytes))?;

    Ok(Term::Int(if negative { -value } else { value }))
}

/// Byte cursor over borrowed data; every read is bounds-checked into a
/// typed truncation error.
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, position: 0 }
    }

    pub(crate) fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.position.checked_add(count).ok_or(DecodeError::Truncated { needed: count })?;
        if end > self.bytes.len() {
            return Err(DecodeError::Truncated {
                needed: end - self.bytes.len(),
            });
        }

        let taken = &self.bytes[self.position..end];
        self.position = end;
        Ok(taken)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16_be(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32_be(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn i32_be(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.bytes.get(self.position).copied()
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.bytes[self.position..]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.position >= self.bytes.len()
    }
}
