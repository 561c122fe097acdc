use crate::encode::{
    decode_float, decode_int, TAG_BOOL_FALSE, TAG_BOOL_TRUE, TAG_BYTES, TAG_FLOAT, TAG_INT, TAG_NULL, TAG_STRING, TAG_TUPLE, TAG_UUID,
    TUPLE_END,
};
use crate::{TupleError, Value};
use uuid::Uuid;

/// Decode one [`Value`] from the front of `bytes`, returning it along with
/// whatever bytes remain.
pub(crate) fn decode_value(bytes: &[u8]) -> Result<(Value, &[u8]), TupleError> {
    let (&tag, rest) = bytes.split_first().ok_or(TupleError::Truncated)?;
    match tag {
        TAG_NULL => Ok((Value::Null, rest)),
        TAG_BOOL_FALSE => Ok((Value::Bool(false), rest)),
        TAG_BOOL_TRUE => Ok((Value::Bool(true), rest)),
        TAG_INT => {
            let (fixed, rest) = take_fixed::<8>(rest)?;
            Ok((Value::Int(decode_int(fixed)), rest))
        }
        TAG_FLOAT => {
            let (fixed, rest) = take_fixed::<8>(rest)?;
            Ok((Value::Float(decode_float(fixed)), rest))
        }
        TAG_STRING => {
            let (raw, rest) = take_escaped(rest)?;
            let s = String::from_utf8(raw).map_err(|_| TupleError::InvalidUtf8)?;
            Ok((Value::String(s), rest))
        }
        TAG_BYTES => {
            let (raw, rest) = take_escaped(rest)?;
            Ok((Value::Bytes(raw), rest))
        }
        TAG_UUID => {
            let (fixed, rest) = take_fixed::<16>(rest)?;
            Ok((Value::Uuid(Uuid::from_bytes(fixed)), rest))
        }
        TAG_TUPLE => {
            let mut items = Vec::new();
            let mut rest = rest;
            loop {
                match rest.split_first() {
                    Some((&TUPLE_END, tail)) => {
                        rest = tail;
                        break;
                    }
                    Some(_) => {
                        let (value, tail) = decode_value(rest)?;
                        items.push(value);
                        rest = tail;
                    }
                    None => return Err(TupleError::Truncated),
                }
            }
            Ok((Value::Tuple(items), rest))
        }
        other => Err(TupleError::UnknownTag(other)),
    }
}

fn take_fixed<const N: usize>(bytes: &[u8]) -> Result<([u8; N], &[u8]), TupleError> {
    if bytes.len() < N {
        return Err(TupleError::Truncated);
    }
    let (head, tail) = bytes.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, tail))
}

/// Inverse of `encode_escaped`: reads up to an unescaped `0x00` terminator.
fn take_escaped(bytes: &[u8]) -> Result<(Vec<u8>, &[u8]), TupleError> {
    let mut out = Vec::new();
    let mut i = 0;
    loop {
        match bytes.get(i) {
            None => return Err(TupleError::Truncated),
            Some(0x00) => match bytes.get(i + 1) {
                Some(0xFF) => {
                    out.push(0x00);
                    i += 2;
                }
                _ => {
                    return Ok((out, &bytes[i + 1..]));
                }
            },
            Some(&b) => {
                out.push(b);
                i += 1;
            }
        }
    }
}
