use keyspace_tuple::Value;

/// Which side of a range scan a `RangeBoundary` stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Lower,
    Upper,
}

/// The declarative expression an index descriptor uses to derive tuple
/// elements from a record (spec §4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum KeyExpr {
    /// A single record field, addressed by its top-level name.
    Field(String),
    /// `child` addressed through `parent`; compiles to a single dot-joined
    /// path for the leaf field rather than a genuine nested traversal.
    Nest(Box<KeyExpr>, Box<KeyExpr>),
    /// The tuple elements of every child expression, concatenated in order.
    Concatenate(Vec<KeyExpr>),
    /// A fixed value, independent of the record (e.g. a partition tag).
    Literal(Value),
    /// Contributes no tuple elements.
    Empty,
    /// A placeholder naming which side of a scan range a maintainer should
    /// substitute at query time; has no record-side value of its own.
    RangeBoundary(String, BoundSide),
}

impl KeyExpr {
    /// Build a `KeyExpr` from a single dot-separated path, e.g.
    /// `"context.session_id"` becomes `Nest(Field("context"), Field("session_id"))`.
    pub fn from_dotted(path: &str) -> Self {
        let mut segments = path.split('.');
        let first = segments.next().expect("split always yields at least one segment");
        let mut expr = KeyExpr::Field(first.to_string());
        for segment in segments {
            expr = KeyExpr::Nest(Box::new(expr), Box::new(KeyExpr::Field(segment.to_string())));
        }
        expr
    }

    /// Build a `KeyExpr` from a list of dotted paths: a single path yields
    /// a plain expression, multiple paths are concatenated in order.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exprs: Vec<KeyExpr> = paths.into_iter().map(|p| KeyExpr::from_dotted(p.as_ref())).collect();
        if exprs.len() == 1 {
            exprs.pop().unwrap()
        } else {
            KeyExpr::Concatenate(exprs)
        }
    }

    /// The number of tuple elements this expression contributes.
    pub fn column_count(&self) -> usize {
        match self {
            KeyExpr::Field(_) => 1,
            KeyExpr::Nest(_, _) => 1,
            KeyExpr::Concatenate(children) => children.iter().map(KeyExpr::column_count).sum(),
            KeyExpr::Literal(_) => 1,
            KeyExpr::Empty => 0,
            KeyExpr::RangeBoundary(_, _) => 1,
        }
    }

    /// Flatten a `Field`/`Nest` chain into the dotted path segments a
    /// [`crate::Record`] resolves in one call. Returns `None` for
    /// expressions that are not pure field paths (literals, concatenation,
    /// range boundaries).
    pub(crate) fn flatten_path(&self) -> Option<Vec<String>> {
        match self {
            KeyExpr::Field(name) => Some(vec![name.clone()]),
            KeyExpr::Nest(parent, child) => {
                let mut path = parent.flatten_path()?;
                path.extend(child.flatten_path()?);
                Some(path)
            }
            _ => None,
        }
    }
}
