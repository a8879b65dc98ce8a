use bson::Bson;
use bson::oid::ObjectId;

/// Seconds since the epoch encoded in an identifier's leading four bytes.
pub fn generation_time(id: &ObjectId) -> i64 {
    id.timestamp().timestamp_millis() / 1000
}

/// Normalize a caller-supplied `_id` value into the stored string form.
///
/// Absent, null or unusable values take the fallback identifier's hex form.
/// Numeric values render as decimal text with non-digit characters (sign,
/// point) stripped; an empty result also falls back.
pub fn normalize_id(value: Option<&Bson>, fallback: &ObjectId) -> String {
    match value {
        Some(Bson::String(s)) if !s.is_empty() => s.clone(),
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::Int32(n)) => digits_or_fallback(&n.to_string(), fallback),
        Some(Bson::Int64(n)) => digits_or_fallback(&n.to_string(), fallback),
        Some(Bson::Double(d)) => digits_or_fallback(&d.to_string(), fallback),
        _ => fallback.to_hex(),
    }
}

/// Digit characters of `raw`, in order.
pub(crate) fn digit_string(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn digits_or_fallback(raw: &str, fallback: &ObjectId) -> String {
    let digits = digit_string(raw);
    if digits.is_empty() { fallback.to_hex() } else { digits }
}
