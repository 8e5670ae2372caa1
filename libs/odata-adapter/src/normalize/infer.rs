//! Best-effort type and key inference from URIs, context URLs and type annotations.
//!
//! Every helper returns `None` instead of failing; callers fall back to the
//! configured unknown type or an absent id.

use crate::literal::{self, KeyPredicate, Literal};
use crate::model::EntityId;

/// Byte offset of the first `ch` outside single-quoted literals.
fn find_unquoted(text: &str, ch: char) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        if c == '\'' {
            in_quotes = !in_quotes;
        } else if c == ch && !in_quotes {
            return Some(i);
        }
    }
    None
}

/// Drop the query string and fragment of a URI.
fn strip_query(uri: &str) -> &str {
    let end = [find_unquoted(uri, '?'), find_unquoted(uri, '#')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(uri.len());
    &uri[..end]
}

/// Simple name of a qualified type: `#NS.Sub.Customer` -> `Customer`.
pub fn type_from_qualified_name(name: &str) -> Option<String> {
    let name = name.trim().trim_start_matches('#');
    let simple = name.rsplit('.').next().unwrap_or(name);
    (!simple.is_empty()).then(|| simple.to_owned())
}

/// Entity-set name of a segment such as `Customers('A')`.
fn segment_name(segment: &str) -> &str {
    match find_unquoted(segment, '(') {
        Some(open) => &segment[..open],
        None => segment,
    }
}

/// Path segments outside quoted key literals, empties dropped.
fn path_segments(path: &str) -> Vec<&str> {
    literal::split_unquoted(path, '/')
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect()
}

/// Entity type from a resource URI: the entity set before a parenthesized key, or
/// the final non-keyed segment. `$`-prefixed system segments are skipped.
pub fn type_from_uri(uri: &str) -> Option<String> {
    let path = strip_query(uri.trim());
    path_segments(path)
        .into_iter()
        .rev()
        .filter(|s| !s.starts_with('$'))
        .map(segment_name)
        .find(|name| !name.is_empty() && !name.contains(':'))
        .map(str::to_owned)
}

/// Entity type from an `@odata.context` URL.
///
/// `$metadata#Customers/$entity` -> `Customers`, `$metadata#Collection(NS.Order)` -> `Order`,
/// `$metadata#Customers('A')/Orders` -> `Orders`.
pub fn type_from_context(context: &str) -> Option<String> {
    let (_, fragment) = context.split_once('#')?;
    let fragment = fragment.trim();

    if let Some(inner) = fragment
        .strip_prefix("Collection(")
        .and_then(|rest| rest.split(')').next())
    {
        return type_from_qualified_name(inner);
    }

    let last = path_segments(fragment)
        .into_iter()
        .rev()
        .find(|s| !s.starts_with('$'))?;
    let name = segment_name(last);
    if name.is_empty() {
        return None;
    }
    // `#NS.Customer` style contexts name a type, not an entity set.
    type_from_qualified_name(name)
}

/// Raw text between the parentheses of the final key segment of a URI.
pub fn key_text(uri: &str) -> Option<&str> {
    let path = strip_query(uri.trim()).trim_end_matches('/');
    let body = path.strip_suffix(')')?;

    let mut in_quotes = false;
    let mut open = None;
    for (i, c) in body.char_indices() {
        match c {
            '\'' => in_quotes = !in_quotes,
            '(' if !in_quotes => open = Some(i),
            _ => {}
        }
    }
    let inner = &body[open? + 1..];
    (!inner.trim().is_empty()).then_some(inner)
}

fn id_from_literal(lit: Literal, raw: &str) -> EntityId {
    match lit {
        Literal::Int(i) => EntityId::Integer(i),
        Literal::String(s) => EntityId::String(s),
        _ => EntityId::String(raw.trim().to_owned()),
    }
}

/// Id from key text: quoted keys are unquoted, integer keys become integers, a single
/// named part (`ID=5`) uses its value and multi-part keys keep the raw text.
pub fn id_from_key_text(text: &str) -> EntityId {
    match literal::decode_key(text) {
        Ok(KeyPredicate::Single(lit)) => id_from_literal(lit, text),
        Ok(KeyPredicate::Composite(mut parts)) if parts.len() == 1 => {
            let raw = literal::split_unquoted(text, '=')
                .get(1)
                .copied()
                .unwrap_or(text);
            match parts.pop() {
                Some((_, lit)) => id_from_literal(lit, raw),
                None => EntityId::String(text.trim().to_owned()),
            }
        }
        _ => EntityId::String(text.trim().to_owned()),
    }
}

/// Id taken from the key segment of an entity URI.
pub fn id_from_uri(uri: &str) -> Option<EntityId> {
    key_text(uri).map(id_from_key_text)
}

/// Id taken from the first listed property that holds a string or integer.
pub fn id_from_properties(
    properties: &serde_json::Map<String, serde_json::Value>,
    names: &[String],
) -> Option<EntityId> {
    names.iter().find_map(|name| match properties.get(name)? {
        serde_json::Value::String(s) => Some(EntityId::String(s.clone())),
        serde_json::Value::Number(n) => n.as_i64().map(EntityId::Integer),
        _ => None,
    })
}
