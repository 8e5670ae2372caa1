//! Version-specific response normalizers.
//!
//! A normalizer turns a decoded `OData` JSON payload into the canonical
//! [`Entity`] / [`EntityCollection`] model. The two wire dialects differ in where
//! the item list, paging links and per-entity metadata live:
//!
//! | concern       | V2                           | V4                          |
//! |---------------|------------------------------|-----------------------------|
//! | items         | `d.results`                  | `value`                     |
//! | total count   | `d.__count`                  | `@odata.count`              |
//! | next page     | `d.__next`                   | `@odata.nextLink`           |
//! | delta         | `d.__delta`                  | `@odata.deltaLink`          |
//! | entity meta   | `__metadata.{uri,etag,type}` | `@odata.{id,etag,type}`     |
//!
//! Normalizers are stateless beyond their [`NormalizerOptions`]; every call is a pure
//! function of the body and headers. Type and key inference is best effort and never
//! fails a parse; only structurally unusable payloads yield
//! [`Error::MalformedResponse`].

mod infer;
mod v2;
mod v4;

use http::HeaderMap;
use serde_json::Value;

pub use crate::config::NormalizerOptions;
use crate::error::{Error, Result};
use crate::model::{Entity, EntityCollection};
use crate::version::ODataVersion;
pub use v2::V2Normalizer;
pub use v4::V4Normalizer;

/// Converts version-specific payloads into the canonical model.
///
/// Implementors provide the `*_value` methods over an already-decoded body; the
/// raw-text entry points decode with `serde_json` and attach the original text to
/// any `MalformedResponse`.
pub trait ResponseNormalizer {
    /// Protocol version this normalizer understands.
    fn version(&self) -> ODataVersion;

    /// Normalize a decoded collection payload.
    ///
    /// # Errors
    /// `Error::MalformedResponse` when no item list can be located or an item is not
    /// an object.
    fn parse_collection_value(&self, body: &Value, headers: &HeaderMap) -> Result<EntityCollection>;

    /// Normalize a decoded single-entity payload.
    ///
    /// # Errors
    /// `Error::MalformedResponse` when the entity is not an object.
    fn parse_entity_value(&self, body: &Value, headers: &HeaderMap) -> Result<Entity>;

    /// Next-page link of a decoded collection payload.
    fn next_link(&self, body: &Value) -> Option<String>;

    /// Delta link of a decoded collection payload.
    fn delta_link(&self, body: &Value) -> Option<String>;

    /// Server-reported total count of a decoded collection payload.
    fn inline_count(&self, body: &Value) -> Option<u64>;

    /// Normalize a raw collection response body.
    ///
    /// # Errors
    /// `Error::MalformedResponse` when the body is not JSON or has no usable item list.
    fn parse_collection(&self, body: &str, headers: &HeaderMap) -> Result<EntityCollection> {
        let value = decode_body(body)?;
        self.parse_collection_value(&value, headers)
            .map_err(|e| with_raw_body(e, body))
    }

    /// Normalize a raw single-entity response body.
    ///
    /// # Errors
    /// `Error::MalformedResponse` when the body is not JSON or not an entity object.
    fn parse_entity(&self, body: &str, headers: &HeaderMap) -> Result<Entity> {
        let value = decode_body(body)?;
        self.parse_entity_value(&value, headers)
            .map_err(|e| with_raw_body(e, body))
    }

    /// # Errors
    /// `Error::MalformedResponse` when the body is not JSON.
    fn extract_next_link(&self, body: &str) -> Result<Option<String>> {
        decode_body(body).map(|v| self.next_link(&v))
    }

    /// # Errors
    /// `Error::MalformedResponse` when the body is not JSON.
    fn extract_delta_link(&self, body: &str) -> Result<Option<String>> {
        decode_body(body).map(|v| self.delta_link(&v))
    }

    /// # Errors
    /// `Error::MalformedResponse` when the body is not JSON.
    fn extract_inline_count(&self, body: &str) -> Result<Option<u64>> {
        decode_body(body).map(|v| self.inline_count(&v))
    }
}

/// Normalizer chosen at runtime from configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalizer {
    V2(V2Normalizer),
    V4(V4Normalizer),
}

impl Normalizer {
    #[must_use]
    pub fn new(version: ODataVersion, options: NormalizerOptions) -> Self {
        match version {
            ODataVersion::V2 => Self::V2(V2Normalizer::with_options(options)),
            ODataVersion::V4 => Self::V4(V4Normalizer::with_options(options)),
        }
    }

    /// Normalizer with default options.
    #[must_use]
    pub fn for_version(version: ODataVersion) -> Self {
        Self::new(version, NormalizerOptions::default())
    }
}

impl ResponseNormalizer for Normalizer {
    fn version(&self) -> ODataVersion {
        match self {
            Self::V2(n) => n.version(),
            Self::V4(n) => n.version(),
        }
    }

    fn parse_collection_value(
        &self,
        body: &Value,
        headers: &HeaderMap,
    ) -> Result<EntityCollection> {
        match self {
            Self::V2(n) => n.parse_collection_value(body, headers),
            Self::V4(n) => n.parse_collection_value(body, headers),
        }
    }

    fn parse_entity_value(&self, body: &Value, headers: &HeaderMap) -> Result<Entity> {
        match self {
            Self::V2(n) => n.parse_entity_value(body, headers),
            Self::V4(n) => n.parse_entity_value(body, headers),
        }
    }

    fn next_link(&self, body: &Value) -> Option<String> {
        match self {
            Self::V2(n) => n.next_link(body),
            Self::V4(n) => n.next_link(body),
        }
    }

    fn delta_link(&self, body: &Value) -> Option<String> {
        match self {
            Self::V2(n) => n.delta_link(body),
            Self::V4(n) => n.delta_link(body),
        }
    }

    fn inline_count(&self, body: &Value) -> Option<u64> {
        match self {
            Self::V2(n) => n.inline_count(body),
            Self::V4(n) => n.inline_count(body),
        }
    }
}

fn decode_body(body: &str) -> Result<Value> {
    serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("body is not valid JSON: {e}"), body))
}

/// Replace the re-serialized body of a `MalformedResponse` with the original text.
fn with_raw_body(err: Error, raw: &str) -> Error {
    match err {
        Error::MalformedResponse { reason, .. } => Error::malformed(reason, raw),
        other => other,
    }
}

/// `MalformedResponse` for a decoded payload.
fn malformed(reason: &str, body: &Value) -> Error {
    Error::malformed(reason, body.to_string())
}

/// Item list of a collection payload.
///
/// `candidate` is the version-specific array; when it is absent the body itself is
/// accepted if it is list-shaped (an array or an empty object).
fn item_list<'a>(
    candidate: Option<&'a Value>,
    body: &'a Value,
    what: &str,
) -> Result<&'a [Value]> {
    match candidate {
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(malformed(&format!("`{what}` is not an array"), body)),
        None => match body {
            Value::Array(items) => Ok(items.as_slice()),
            Value::Object(map) if map.is_empty() => Ok(&[]),
            _ => Err(malformed(&format!("missing `{what}` array"), body)),
        },
    }
}

/// Numeric count, accepting a JSON number or a numeric string.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_owned)
}

/// Fallback eTag from the `ETag` response header.
fn header_etag(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Warn when the server announces a different major protocol version.
fn check_version_header(version: ODataVersion, headers: &HeaderMap, options: &NormalizerOptions) {
    if !options.warn_on_version_mismatch {
        return;
    }
    let announced = [ODataVersion::V4, ODataVersion::V2]
        .into_iter()
        .find_map(|v| headers.get(v.version_header())?.to_str().ok());
    if let Some(raw) = announced
        && let Some(major) = ODataVersion::major_from_header(raw)
        && major != version.major()
    {
        tracing::warn!(
            expected = %version,
            announced = raw,
            "response announces a different OData version; parsing as configured"
        );
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    /// Collects WARN events emitted while it is the active subscriber.
    #[derive(Clone, Default)]
    struct WarningCapture {
        warnings: Arc<Mutex<Vec<String>>>,
    }

    impl WarningCapture {
        fn messages(&self) -> Vec<String> {
            self.warnings.lock().unwrap().clone()
        }
    }

    struct MessageVisitor<'a>(&'a mut String);

    impl tracing::field::Visit for MessageVisitor<'_> {
        #[allow(clippy::use_debug)]
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                *self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for WarningCapture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                let mut message = String::new();
                event.record(&mut MessageVisitor(&mut message));
                self.warnings.lock().unwrap().push(message);
            }
        }
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_normalizer_selected_by_version() {
        for version in [ODataVersion::V2, ODataVersion::V4] {
            assert_eq!(Normalizer::for_version(version).version(), version);
        }
    }

    #[test]
    fn test_invalid_json_is_malformed_with_raw_body() {
        let n = Normalizer::for_version(ODataVersion::V4);
        let err = n
            .parse_collection("{not json", &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert_eq!(err.raw_body(), Some("{not json"));
        assert!(n.extract_next_link("<html>").is_err());
    }

    #[test]
    fn test_structural_error_keeps_original_text() {
        let raw = "{ \"value\": 5 }";
        let err = Normalizer::for_version(ODataVersion::V4)
            .parse_collection(raw, &HeaderMap::new())
            .unwrap_err();
        assert_eq!(err.raw_body(), Some(raw));
    }

    #[test]
    fn test_item_list_fallbacks() {
        let body = json!([{"a": 1}]);
        assert_eq!(item_list(None, &body, "value").unwrap().len(), 1);
        let empty = json!({});
        assert!(item_list(None, &empty, "value").unwrap().is_empty());
        let other = json!({"x": 1});
        assert!(item_list(None, &other, "value").is_err());
        assert!(item_list(Some(&json!("s")), &other, "value").is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(&json!(3)), Some(3));
        assert_eq!(parse_count(&json!("42")), Some(42));
        assert_eq!(parse_count(&json!("abc")), None);
        assert_eq!(parse_count(&json!(-1)), None);
        assert_eq!(parse_count(&json!(null)), None);
    }

    #[test]
    fn test_header_etag() {
        assert_eq!(
            header_etag(&headers(&[("etag", "W/\"7\"")])).as_deref(),
            Some("W/\"7\"")
        );
        assert_eq!(header_etag(&HeaderMap::new()), None);
    }

    #[test]
    fn test_version_mismatch_warns_and_continues() {
        let capture = WarningCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        let collection = tracing::subscriber::with_default(subscriber, || {
            let modern = headers(&[("odata-version", "4.0")]);
            Normalizer::for_version(ODataVersion::V2)
                .parse_entity(r#"{"d":{"Name":"b"}}"#, &modern)
                .unwrap();

            let legacy = headers(&[("dataserviceversion", "2.0;NetFx")]);
            Normalizer::for_version(ODataVersion::V4)
                .parse_collection(r#"{"value":[{"Name":"a"}]}"#, &legacy)
                .unwrap()
        });

        assert_eq!(collection.count(), 1);
        let warnings = capture.messages();
        assert_eq!(warnings.len(), 2, "warnings: {}", warnings.join(" | "));
        for w in &warnings {
            assert!(w.contains("different OData version"), "{w}");
        }
    }

    #[test]
    fn test_matching_or_disabled_version_check_is_silent() {
        let capture = WarningCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let n = Normalizer::for_version(ODataVersion::V4);
            n.parse_collection("[]", &headers(&[("odata-version", "4.01")]))
                .unwrap();

            let quiet = Normalizer::new(
                ODataVersion::V4,
                NormalizerOptions {
                    warn_on_version_mismatch: false,
                    ..NormalizerOptions::default()
                },
            );
            quiet
                .parse_collection("[]", &headers(&[("odata-version", "2.0")]))
                .unwrap();
        });

        assert!(capture.messages().is_empty());
    }
}
