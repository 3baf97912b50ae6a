//! Field name casing between Parse (camelCase) and local records (snake_case).

/// Convert a Parse field name to its local snake_case form.
///
/// Every uppercase letter starts a new word: `objectId` becomes `object_id`,
/// `createdAt` becomes `created_at`. A leading uppercase letter does not get
/// an underscore prefix (`Author` becomes `author`).
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a local snake_case field name to its Parse camelCase form.
///
/// The first word is kept as-is, every following word is capitalized:
/// `object_id` becomes `objectId`.
#[must_use]
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, ch) in name.chars().enumerate() {
        if ch == '_' && i > 0 {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Check that a local field name survives a round trip through the Parse form.
///
/// Names like `line_2` or `a__b` do not (`line2` maps back to `line2`), so two
/// distinct local names could collide on the remote side.
#[must_use]
pub fn is_round_trip_safe(local_name: &str) -> bool {
    to_snake_case(&to_camel_case(local_name)) == local_name
}
