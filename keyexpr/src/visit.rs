use keyspace_tuple::Value;

use crate::{BoundSide, DataAccessError, KeyExpr, Record};

/// Evaluate a key expression against a record, producing the sequence of
/// tuple elements it contributes (spec §4.2/§4.3).
pub fn evaluate<R: Record>(record: &R, expr: &KeyExpr) -> Result<Vec<Value>, DataAccessError> {
    match expr {
        KeyExpr::Field(_) | KeyExpr::Nest(_, _) => {
            let path = expr.flatten_path().expect("Field/Nest always flattens to a path");
            let borrowed: Vec<&str> = path.iter().map(String::as_str).collect();
            Ok(vec![record.field(&borrowed)?])
        }
        KeyExpr::Concatenate(children) => {
            let mut out = Vec::with_capacity(children.iter().map(KeyExpr::column_count).sum());
            for child in children {
                out.extend(evaluate(record, child)?);
            }
            Ok(out)
        }
        KeyExpr::Literal(value) => Ok(vec![value.clone()]),
        KeyExpr::Empty => Ok(Vec::new()),
        KeyExpr::RangeBoundary(name, side) => {
            let _ = side;
            Err(DataAccessError::NestedFieldUnsupported(format!(
                "range boundary '{name}' has no record-side value; substitute it at query time"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture;
    impl Record for Fixture {
        fn field(&self, path: &[&str]) -> Result<Value, DataAccessError> {
            match path {
                ["tenant"] => Ok(Value::String("t1".into())),
                ["meta", "region"] => Ok(Value::String("us".into())),
                _ => Err(DataAccessError::FieldNotFound(path.join("."))),
            }
        }
    }

    #[test]
    fn evaluates_concatenated_fields() {
        let expr = KeyExpr::Concatenate(vec![KeyExpr::from_dotted("tenant"), KeyExpr::from_dotted("meta.region")]);
        assert_eq!(evaluate(&Fixture, &expr).unwrap(), vec![Value::String("t1".into()), Value::String("us".into())]);
    }

    #[test]
    fn literal_is_independent_of_record() {
        let expr = KeyExpr::Literal(Value::Int(42));
        assert_eq!(evaluate(&Fixture, &expr).unwrap(), vec![Value::Int(42)]);
    }

    #[test]
    fn empty_contributes_nothing() {
        assert_eq!(evaluate(&Fixture, &KeyExpr::Empty).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn range_boundary_has_no_record_value() {
        let expr = KeyExpr::RangeBoundary("createdAt".into(), BoundSide::Lower);
        assert!(matches!(evaluate(&Fixture, &expr), Err(DataAccessError::NestedFieldUnsupported(_))));
    }

    #[test]
    fn missing_field_propagates() {
        let expr = KeyExpr::from_dotted("nope");
        assert!(matches!(evaluate(&Fixture, &expr), Err(DataAccessError::FieldNotFound(_))));
    }
}
