use std::cmp::Ordering;

use bson::{Bson, Document};

/// Rank of a value's type class for cross-type ordering.
///
/// Numbers sort before strings, strings before documents, documents before
/// arrays, arrays before booleans, booleans before null. Values of the same
/// class compare within the class.
fn class_rank(v: &Bson) -> u8 {
    match v {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::DateTime(_) => 0,
        Bson::String(_) | Bson::ObjectId(_) => 1,
        Bson::Document(_) => 2,
        Bson::Array(_) => 3,
        Bson::Boolean(_) => 4,
        Bson::Null => 5,
        _ => 6,
    }
}

fn numeric_value(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(d) => Some(*d),
        Bson::DateTime(dt) => Some(dt.timestamp_millis() as f64),
        _ => None,
    }
}

/// Total ordering over document values.
///
/// Values of different type classes order by [`class_rank`]; within a class,
/// numbers compare numerically (integers exactly, otherwise as doubles),
/// strings and identifiers lexicographically, documents and arrays
/// element-wise.
pub fn compare(a: &Bson, b: &Bson) -> Ordering {
    let (ra, rb) = (class_rank(a), class_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => (*x as i64).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&(*y as i64)),
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::ObjectId(x), Bson::String(y)) => x.to_hex().as_str().cmp(y.as_str()),
        (Bson::String(x), Bson::ObjectId(y)) => x.as_str().cmp(y.to_hex().as_str()),
        (Bson::Document(x), Bson::Document(y)) => compare_documents(x, y),
        (Bson::Array(x), Bson::Array(y)) => compare_arrays(x, y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::Null, Bson::Null) => Ordering::Equal,
        _ => match (numeric_value(a), numeric_value(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn compare_documents(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let key_ord = ka.cmp(kb);
        if key_ord != Ordering::Equal {
            return key_ord;
        }
        let val_ord = compare(va, vb);
        if val_ord != Ordering::Equal {
            return val_ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_arrays(a: &[Bson], b: &[Bson]) -> Ordering {
    for (va, vb) in a.iter().zip(b.iter()) {
        let ord = compare(va, vb);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Structural deep equality with numeric and identifier coercion.
///
/// `Int32(3)`, `Int64(3)` and `Double(3.0)` are equal; an `ObjectId` equals
/// its hex string. Documents compare by key set, arrays element-wise in
/// order.
pub fn equals(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k.as_str()).is_some_and(|w| equals(v, w)))
        }
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(v, w)| equals(v, w))
        }
        (Bson::ObjectId(x), Bson::String(y)) => x.to_hex() == *y,
        (Bson::String(x), Bson::ObjectId(y)) => *x == y.to_hex(),
        _ => match (numeric_value(a), numeric_value(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Resolve a dotted key-path against a document, read-only.
///
/// Intermediate documents descend by key; intermediate arrays require a
/// numeric segment. Returns `None` when any segment is absent or the path
/// runs through a scalar.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = match current {
            Bson::Document(d) => d.get(segment)?,
            Bson::Array(items) => {
                if !is_index_segment(segment) {
                    return None;
                }
                items.get(segment.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// True when a path segment is a plain decimal array index.
pub fn is_index_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Runtime type name of a value, as accepted by `$type`.
pub fn type_name(v: &Bson) -> &'static str {
    match v {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => "number",
        Bson::String(_) => "string",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Boolean(_) => "boolean",
        Bson::Null => "null",
        Bson::ObjectId(_) => "objectid",
        Bson::DateTime(_) => "date",
        Bson::Timestamp(_) => "timestamp",
        Bson::RegularExpression(_) => "regex",
        _ => "other",
    }
}

/// Numeric type discriminator of a value, as accepted by `$type`.
pub fn type_code(v: &Bson) -> i32 {
    match v {
        Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Null => 10,
        Bson::RegularExpression(_) => 11,
        Bson::Int32(_) => 16,
        Bson::Timestamp(_) => 17,
        Bson::Int64(_) => 18,
        _ => 0,
    }
}

/// Truthiness of a value. Null, zero and the empty string are false.
pub fn to_bool(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(d) => *d != 0.0,
        Bson::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Integer view of a numeric value. Doubles truncate.
pub fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(n) => Some(*n as i64),
        Bson::Int64(n) => Some(*n),
        Bson::Double(d) => Some(*d as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use bson::oid::ObjectId;

    use super::*;

    #[test]
    fn numbers_sort_before_strings() {
        assert_eq!(
            compare(&Bson::Int32(99), &Bson::String("1".into())),
            Ordering::Less
        );
        assert_eq!(
            compare(&Bson::String("a".into()), &Bson::Int64(5)),
            Ordering::Greater
        );
    }

    #[test]
    fn class_order_chain() {
        let chain = [
            Bson::Double(1.5),
            Bson::String("x".into()),
            Bson::Document(doc! { "a": 1 }),
            Bson::Array(vec![Bson::Int32(1)]),
            Bson::Boolean(false),
            Bson::Null,
        ];
        for pair in chain.windows(2) {
            assert_eq!(compare(&pair[0], &pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn cross_numeric_compare() {
        assert_eq!(compare(&Bson::Int32(10), &Bson::Int64(10)), Ordering::Equal);
        assert_eq!(
            compare(&Bson::Double(10.5), &Bson::Int64(10)),
            Ordering::Greater
        );
        assert_eq!(
            compare(&Bson::Int32(10), &Bson::Double(10.5)),
            Ordering::Less
        );
    }

    #[test]
    fn array_compare_element_wise_then_length() {
        let short = Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)]);
        let long = Bson::Array(vec![Bson::Int32(1), Bson::Int32(2), Bson::Int32(3)]);
        assert_eq!(compare(&short, &long), Ordering::Less);
        let bigger = Bson::Array(vec![Bson::Int32(2)]);
        assert_eq!(compare(&bigger, &long), Ordering::Greater);
    }

    #[test]
    fn equals_coerces_numbers() {
        assert!(equals(&Bson::Int32(3), &Bson::Double(3.0)));
        assert!(equals(&Bson::Int64(3), &Bson::Int32(3)));
        assert!(!equals(&Bson::Int32(3), &Bson::String("3".into())));
    }

    #[test]
    fn equals_coerces_identifiers() {
        let oid = ObjectId::new();
        assert!(equals(
            &Bson::ObjectId(oid),
            &Bson::String(oid.to_hex())
        ));
    }

    #[test]
    fn equals_documents_ignore_key_order() {
        let a = Bson::Document(doc! { "x": 1, "y": 2 });
        let b = Bson::Document(doc! { "y": 2, "x": 1 });
        assert!(equals(&a, &b));
    }

    #[test]
    fn equals_arrays_respect_order() {
        let a = Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)]);
        let b = Bson::Array(vec![Bson::Int32(2), Bson::Int32(1)]);
        assert!(!equals(&a, &b));
    }

    #[test]
    fn get_path_nested() {
        let doc = doc! { "address": { "city": "Austin" } };
        assert_eq!(
            get_path(&doc, "address.city"),
            Some(&Bson::String("Austin".into()))
        );
        assert_eq!(get_path(&doc, "address.zip"), None);
    }

    #[test]
    fn get_path_array_index() {
        let doc = doc! { "tags": ["a", "b"], "items": [{ "n": 1 }] };
        assert_eq!(get_path(&doc, "tags.1"), Some(&Bson::String("b".into())));
        assert_eq!(get_path(&doc, "items.0.n"), Some(&Bson::Int32(1)));
        assert_eq!(get_path(&doc, "tags.x"), None);
        assert_eq!(get_path(&doc, "tags.5"), None);
    }

    #[test]
    fn type_names() {
        assert_eq!(type_name(&Bson::Int64(1)), "number");
        assert_eq!(type_name(&Bson::Null), "null");
        assert_eq!(type_name(&Bson::Array(vec![])), "array");
    }

    #[test]
    fn truthiness() {
        assert!(!to_bool(&Bson::Int32(0)));
        assert!(!to_bool(&Bson::Null));
        assert!(!to_bool(&Bson::String(String::new())));
        assert!(to_bool(&Bson::String("x".into())));
        assert!(to_bool(&Bson::Document(Document::new())));
    }
}
