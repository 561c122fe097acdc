//! Order-preserving tuple codec and subspace primitives (spec §4.1).
//!
//! Encodes an ordered sequence of typed [`Value`]s into bytes such that
//! encoded-byte order equals the documented element order: numerics by
//! value, strings by UTF-8, tuples lexicographically, nulls lowest.
//! `unpack(pack(t)) == t` for every tuple `t`.

use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

mod decode;
mod encode;
mod subspace;

pub use subspace::Subspace;

/// A single typed element of a [`Tuple`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Tuple(_) => "tuple",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "{b:02x?}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Tuple(t) => {
                write!(f, "(")?;
                for (i, v) in t.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A tuple is simply an ordered sequence of [`Value`]s.
pub type Tuple = Vec<Value>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TupleError {
    #[error("truncated tuple encoding")]
    Truncated,
    #[error("unrecognized type tag {0:#04x}")]
    UnknownTag(u8),
    #[error("invalid utf8 in encoded string")]
    InvalidUtf8,
    #[error("malformed uuid bytes")]
    MalformedUuid,
}

/// Encode a tuple into its order-preserving byte representation.
pub fn pack(tuple: &[Value]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in tuple {
        encode::encode_value(v, &mut out);
    }
    out
}

/// Decode a byte string produced by [`pack`] back into a tuple.
pub fn unpack(bytes: &[u8]) -> Result<Tuple, TupleError> {
    let mut rest = bytes;
    let mut out = Vec::new();
    while !rest.is_empty() {
        let (value, tail) = decode::decode_value(rest)?;
        out.push(value);
        rest = tail;
    }
    Ok(out)
}

/// Lexicographic order of two packed byte strings, for testing the
/// "encoded-byte order equals element order" contract.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    pack(std::slice::from_ref(a)).cmp(&pack(std::slice::from_ref(b)))
}

/// Returns the key one past the end of every key prefixed by `prefix`:
/// the least byte string that is strictly greater than every such key.
/// Used to build half-open `[begin, end)` ranges over a prefix.
pub fn strinc(prefix: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
        } else {
            *out.last_mut().unwrap() += 1;
            return out;
        }
    }
    // prefix was all 0xFF (or empty): there is no finite successor;
    // callers should treat this as "unbounded end".
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_scalars() {
        let cases = vec![
            vec![Value::Null],
            vec![Value::Bool(true), Value::Bool(false)],
            vec![Value::Int(-42), Value::Int(0), Value::Int(i64::MAX), Value::Int(i64::MIN)],
            vec![Value::Float(-1.5), Value::Float(0.0), Value::Float(3.25)],
            vec![Value::String("hello\0world".to_string())],
            vec![Value::Bytes(vec![0, 1, 2, 0xFF])],
            vec![Value::Uuid(Uuid::nil())],
            vec![Value::Tuple(vec![Value::Int(1), Value::String("x".into())])],
        ];
        for tuple in cases {
            let packed = pack(&tuple);
            let unpacked = unpack(&packed).unwrap();
            assert_eq!(tuple, unpacked);
        }
    }

    #[test]
    fn ordering_matches_value_order() {
        assert!(cmp_values(&Value::Null, &Value::Bool(false)) == Ordering::Less);
        assert!(cmp_values(&Value::Bool(false), &Value::Bool(true)) == Ordering::Less);
        assert!(cmp_values(&Value::Int(-1), &Value::Int(1)) == Ordering::Less);
        assert!(cmp_values(&Value::Int(i64::MIN), &Value::Int(i64::MAX)) == Ordering::Less);
        assert!(cmp_values(&Value::Float(-2.0), &Value::Float(2.0)) == Ordering::Less);
        assert!(cmp_values(&Value::String("a".into()), &Value::String("b".into())) == Ordering::Less);
        assert!(cmp_values(&Value::String("ab".into()), &Value::String("b".into())) == Ordering::Less);
    }

    #[test]
    fn tuple_prefix_sorts_before_extension() {
        let short = vec![Value::Tuple(vec![Value::Int(1)])];
        let long = vec![Value::Tuple(vec![Value::Int(1), Value::Int(2)])];
        assert!(pack(&short) < pack(&long));
    }

    #[test]
    fn multi_element_tuple_order() {
        let a = vec![Value::Int(1), Value::String("a".into())];
        let b = vec![Value::Int(1), Value::String("b".into())];
        let c = vec![Value::Int(2), Value::String("a".into())];
        assert!(pack(&a) < pack(&b));
        assert!(pack(&b) < pack(&c));
    }

    #[test]
    fn strinc_increments_last_non_ff_byte() {
        assert_eq!(strinc(&[0x01, 0x02]), vec![0x01, 0x03]);
        assert_eq!(strinc(&[0x01, 0xFF]), vec![0x02]);
    }
}
