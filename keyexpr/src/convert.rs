use keyspace_tuple::Value;
use uuid::Uuid;

/// Folds a primitive Rust type into the canonical [`Value`] it is stored
/// and compared as (spec §4.3: integer widths to `Int`, float widths to
/// `Float`, byte arrays to `Bytes`, UUIDs by their byte representation).
/// `Record` implementors use this to build field values without hand
/// writing the same widening match arm for every integer type.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

macro_rules! impl_into_value_int {
    ($($t:ty),*) => {
        $(impl IntoValue for $t {
            fn into_value(self) -> Value { Value::Int(self as i64) }
        })*
    };
}

macro_rules! impl_into_value_float {
    ($($t:ty),*) => {
        $(impl IntoValue for $t {
            fn into_value(self) -> Value { Value::Float(self as f64) }
        })*
    };
}

impl_into_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_into_value_float!(f32, f64);

impl IntoValue for bool {
    fn into_value(self) -> Value { Value::Bool(self) }
}

impl IntoValue for String {
    fn into_value(self) -> Value { Value::String(self) }
}

impl IntoValue for &str {
    fn into_value(self) -> Value { Value::String(self.to_string()) }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value { Value::Bytes(self) }
}

impl IntoValue for &[u8] {
    fn into_value(self) -> Value { Value::Bytes(self.to_vec()) }
}

impl IntoValue for Uuid {
    fn into_value(self) -> Value { Value::Uuid(self) }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widths_fold_to_int() {
        assert_eq!(7u8.into_value(), Value::Int(7));
        assert_eq!((-3i32).into_value(), Value::Int(-3));
        assert_eq!(42u64.into_value(), Value::Int(42));
    }

    #[test]
    fn float_widths_fold_to_float() {
        assert_eq!(1.5f32.into_value(), Value::Float(1.5));
    }

    #[test]
    fn option_none_is_null() {
        let none: Option<i32> = None;
        assert_eq!(none.into_value(), Value::Null);
        assert_eq!(Some(5i32).into_value(), Value::Int(5));
    }
}
