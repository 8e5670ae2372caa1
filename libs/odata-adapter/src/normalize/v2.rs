use http::HeaderMap;
use serde_json::{Map, Value};

use super::{
    NormalizerOptions, ResponseNormalizer, check_version_header, header_etag, infer, item_list,
    malformed, parse_count, string_field,
};
use crate::error::Result;
use crate::model::{Entity, EntityCollection};
use crate::version::ODataVersion;

const WRAPPER: &str = "d";
const RESULTS: &str = "results";
const METADATA: &str = "__metadata";
const COUNT: &str = "__count";
const NEXT: &str = "__next";
const DELTA: &str = "__delta";

/// Verbose-JSON (`{"d": ...}`) normalizer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct V2Normalizer {
    options: NormalizerOptions,
}

impl V2Normalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: NormalizerOptions) -> Self {
        Self { options }
    }

    /// Build an entity from one object; `__metadata` is consumed, every other key is
    /// copied through untouched (deferred links and inline results included).
    fn entity_from_object(&self, obj: &Map<String, Value>) -> Entity {
        let metadata = obj.get(METADATA).and_then(Value::as_object);
        let field = |name: &str| string_field(metadata.and_then(|m| m.get(name)));
        let uri = field("uri");

        let entity_type = field("type")
            .as_deref()
            .and_then(infer::type_from_qualified_name)
            .or_else(|| {
                let inferred = uri.as_deref().and_then(infer::type_from_uri);
                tracing::trace!(?inferred, "V2 entity type inferred from uri");
                inferred
            })
            .unwrap_or_else(|| self.options.unknown_type.clone());

        let properties: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| k.as_str() != METADATA)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let id = uri.as_deref().and_then(infer::id_from_uri).or_else(|| {
            infer::id_from_properties(&properties, &self.options.key_fallback_properties)
        });

        let mut entity = Entity::with_identity(entity_type, id, field("etag"))
            .with_new_flag(false);
        for (name, value) in properties {
            entity.set_property(name, value);
        }
        entity
    }
}

/// The `d` wrapper when present.
fn wrapper(body: &Value) -> Option<&Map<String, Value>> {
    body.get(WRAPPER).and_then(Value::as_object)
}

impl ResponseNormalizer for V2Normalizer {
    fn version(&self) -> ODataVersion {
        ODataVersion::V2
    }

    fn parse_collection_value(
        &self,
        body: &Value,
        headers: &HeaderMap,
    ) -> Result<EntityCollection> {
        check_version_header(ODataVersion::V2, headers, &self.options);

        // `{"d": [...]}` is the pre-V2 verbose shape of the same list.
        let candidate = match body.get(WRAPPER) {
            Some(list @ Value::Array(_)) => Some(list),
            Some(d) => d.get(RESULTS),
            None => None,
        };
        let items = item_list(candidate, body, "d.results")?;

        let mut collection = EntityCollection::new();
        for item in items {
            let obj = item
                .as_object()
                .ok_or_else(|| malformed("collection item is not an object", body))?;
            collection.add(self.entity_from_object(obj));
        }
        collection.set_total_count(self.inline_count(body));
        collection.set_next_link(self.next_link(body));
        collection.set_delta_link(self.delta_link(body));

        tracing::debug!(
            version = %ODataVersion::V2,
            items = collection.count(),
            total = ?collection.total_count(),
            has_next = collection.has_next_page(),
            "normalized OData collection"
        );
        Ok(collection)
    }

    fn parse_entity_value(&self, body: &Value, headers: &HeaderMap) -> Result<Entity> {
        check_version_header(ODataVersion::V2, headers, &self.options);

        let mut target = body.get(WRAPPER).unwrap_or(body);
        if let Some(inner @ Value::Object(_)) = target.get(RESULTS) {
            target = inner;
        }
        let obj = target
            .as_object()
            .ok_or_else(|| malformed("entity payload is not an object", body))?;

        let mut entity = self.entity_from_object(obj);
        if entity.etag().is_none() {
            entity.set_etag(header_etag(headers));
        }

        tracing::debug!(
            version = %ODataVersion::V2,
            entity_type = entity.entity_type(),
            id = ?entity.id(),
            "normalized OData entity"
        );
        Ok(entity)
    }

    fn next_link(&self, body: &Value) -> Option<String> {
        string_field(wrapper(body)?.get(NEXT))
    }

    fn delta_link(&self, body: &Value) -> Option<String> {
        string_field(wrapper(body)?.get(DELTA))
    }

    fn inline_count(&self, body: &Value) -> Option<u64> {
        parse_count(wrapper(body)?.get(COUNT)?)
    }
}
