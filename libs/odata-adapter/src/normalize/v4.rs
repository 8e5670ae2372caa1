use http::HeaderMap;
use serde_json::{Map, Value};

use super::{
    NormalizerOptions, ResponseNormalizer, check_version_header, header_etag, infer, item_list,
    malformed, parse_count, string_field,
};
use crate::error::Result;
use crate::model::{Entity, EntityCollection, Navigation};
use crate::version::ODataVersion;

const VALUE: &str = "value";
const COUNT: &str = "@odata.count";
const NEXT_LINK: &str = "@odata.nextLink";
const DELTA_LINK: &str = "@odata.deltaLink";
const CONTEXT: &str = "@odata.context";
const ID: &str = "@odata.id";
const ETAG: &str = "@odata.etag";
const TYPE: &str = "@odata.type";
/// Term prefix of protocol annotations, after the `@`.
const ODATA_TERM: &str = "odata.";

/// JSON-format (`@odata.*` annotations) normalizer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct V4Normalizer {
    options: NormalizerOptions,
}

/// Paging annotations attached to an expanded navigation collection.
#[derive(Default)]
struct NavigationPaging {
    count: Option<u64>,
    next_link: Option<String>,
}

/// Remember a `Nav@odata.count` / `Nav@odata.nextLink` annotation until `Nav` itself is seen.
fn record_paging(
    paging: &mut Vec<(String, NavigationPaging)>,
    nav: &str,
    term: &str,
    value: &Value,
) {
    if term != "count" && term != "nextLink" {
        return;
    }
    let idx = if let Some(i) = paging.iter().position(|(n, _)| n == nav) {
        i
    } else {
        paging.push((nav.to_owned(), NavigationPaging::default()));
        paging.len() - 1
    };
    let slot = &mut paging[idx].1;
    if term == "count" {
        slot.count = parse_count(value);
    } else {
        slot.next_link = value.as_str().map(str::to_owned);
    }
}

/// Array of objects, i.e. an expanded collection-valued navigation property.
fn as_entity_list(value: &Value) -> Option<&[Value]> {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            Some(items.as_slice())
        }
        _ => None,
    }
}

impl V4Normalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: NormalizerOptions) -> Self {
        Self { options }
    }

    fn entity_type(&self, obj: &Map<String, Value>, context: Option<&str>) -> String {
        if let Some(t) = obj
            .get(TYPE)
            .and_then(Value::as_str)
            .and_then(infer::type_from_qualified_name)
        {
            return t;
        }
        let inferred = context.and_then(infer::type_from_context);
        tracing::trace!(?inferred, "V4 entity type inferred from context");
        inferred.unwrap_or_else(|| self.options.unknown_type.clone())
    }

    /// Build an entity from one object.
    ///
    /// `context` is the nearest `@odata.context`: the object's own, or the enclosing
    /// collection's for top-level items. Nested navigation entities get no inherited
    /// context.
    fn entity_from_object(&self, obj: &Map<String, Value>, context: Option<&str>) -> Entity {
        let context = obj.get(CONTEXT).and_then(Value::as_str).or(context);
        let entity_type = self.entity_type(obj, context);
        let uri_id = obj
            .get(ID)
            .and_then(Value::as_str)
            .and_then(infer::id_from_uri);
        let etag = string_field(obj.get(ETAG));

        let mut entity = Entity::with_identity(entity_type, None, etag.clone())
            .with_new_flag(false);
        let mut paging: Vec<(String, NavigationPaging)> = Vec::new();

        for (key, value) in obj {
            // Protocol annotations are consumed; custom ones stay as flat properties.
            if let Some((target, term)) = key.split_once('@')
                && let Some(term) = term.strip_prefix(ODATA_TERM)
            {
                if !target.is_empty() {
                    record_paging(&mut paging, target, term, value);
                }
                continue;
            }
            if key.contains('@') {
                entity.set_property(key.as_str(), value.clone());
                continue;
            }

            if let Some(items) = as_entity_list(value) {
                let collection: EntityCollection = items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|o| self.entity_from_object(o, None))
                    .collect();
                entity.set_navigation(key.as_str(), collection);
            } else if let Value::Object(nested) = value {
                entity.set_navigation(key.as_str(), self.entity_from_object(nested, None));
            } else {
                entity.set_property(key.as_str(), value.clone());
            }
        }

        for (nav, info) in paging {
            if let Some(collection) = entity
                .navigation_mut(&nav)
                .and_then(Navigation::as_collection_mut)
            {
                collection.set_total_count(info.count);
                collection.set_next_link(info.next_link);
            }
        }

        let id = uri_id.or_else(|| {
            infer::id_from_properties(entity.properties(), &self.options.key_fallback_properties)
        });
        entity.mark_persisted(id, etag);
        entity
    }
}

impl ResponseNormalizer for V4Normalizer {
    fn version(&self) -> ODataVersion {
        ODataVersion::V4
    }

    fn parse_collection_value(
        &self,
        body: &Value,
        headers: &HeaderMap,
    ) -> Result<EntityCollection> {
        check_version_header(ODataVersion::V4, headers, &self.options);

        let items = item_list(body.get(VALUE), body, VALUE)?;
        let context = body.get(CONTEXT).and_then(Value::as_str);

        let mut collection = EntityCollection::new();
        for item in items {
            let obj = item
                .as_object()
                .ok_or_else(|| malformed("collection item is not an object", body))?;
            collection.add(self.entity_from_object(obj, context));
        }
        collection.set_total_count(self.inline_count(body));
        collection.set_next_link(self.next_link(body));
        collection.set_delta_link(self.delta_link(body));

        tracing::debug!(
            version = %ODataVersion::V4,
            items = collection.count(),
            total = ?collection.total_count(),
            has_next = collection.has_next_page(),
            "normalized OData collection"
        );
        Ok(collection)
    }

    fn parse_entity_value(&self, body: &Value, headers: &HeaderMap) -> Result<Entity> {
        check_version_header(ODataVersion::V4, headers, &self.options);

        let obj = body
            .as_object()
            .ok_or_else(|| malformed("entity payload is not an object", body))?;
        let mut entity = self.entity_from_object(obj, None);
        if entity.etag().is_none() {
            entity.set_etag(header_etag(headers));
        }

        tracing::debug!(
            version = %ODataVersion::V4,
            entity_type = entity.entity_type(),
            id = ?entity.id(),
            "normalized OData entity"
        );
        Ok(entity)
    }

    fn next_link(&self, body: &Value) -> Option<String> {
        string_field(body.get(NEXT_LINK))
    }

    fn delta_link(&self, body: &Value) -> Option<String> {
        string_field(body.get(DELTA_LINK))
    }

    fn inline_count(&self, body: &Value) -> Option<u64> {
        parse_count(body.get(COUNT)?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::EntityId;
    use serde_json::json;

    fn entity(body: &Value) -> Entity {
        V4Normalizer::new()
            .parse_entity_value(body, &HeaderMap::new())
            .unwrap()
    }

    #[test]
    fn test_collection_with_paging() {
        let body = json!({
            "@odata.context": "http://h/$metadata#Customers",
            "@odata.count": 2,
            "@odata.nextLink": "http://h/Customers?$skip=1",
            "value": [
                { "@odata.etag": "W/\"1\"", "@odata.id": "http://h/Customers('A')", "Name": "a" },
                { "Name": "b" }
            ]
        });
        let c = V4Normalizer::new()
            .parse_collection_value(&body, &HeaderMap::new())
            .unwrap();
        assert_eq!(c.count(), 2);
        assert_eq!(c.total_count(), Some(2));
        assert_eq!(c.next_link(), Some("http://h/Customers?$skip=1"));

        let first = c.first().unwrap();
        assert_eq!(first.entity_type(), "Customers");
        assert_eq!(first.id(), Some(&EntityId::String("A".into())));
        assert_eq!(first.etag(), Some("W/\"1\""));
        assert!(!first.is_new());
        assert_eq!(first.properties().len(), 1);
        assert_eq!(c.last().unwrap().entity_type(), "Customers");
    }

    #[test]
    fn test_count_as_string_and_delta_link() {
        let body = json!({
            "@odata.count": "15",
            "@odata.deltaLink": "d?$deltatoken=1",
            "value": []
        });
        let n = V4Normalizer::new();
        let c = n.parse_collection_value(&body, &HeaderMap::new()).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.total_count(), Some(15));
        assert_eq!(c.delta_link(), Some("d?$deltatoken=1"));
        assert!(!c.has_next_page());
    }

    #[test]
    fn test_collection_malformed() {
        let n = V4Normalizer::new();
        for body in [json!({"items": []}), json!({"value": {"a": 1}}), json!(3)] {
            let err = n
                .parse_collection_value(&body, &HeaderMap::new())
                .unwrap_err();
            assert!(matches!(err, Error::MalformedResponse { .. }), "{body}");
        }
        let err = n
            .parse_collection_value(&json!({"value": ["x"]}), &HeaderMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn test_entity_type_resolution() {
        assert_eq!(
            entity(&json!({"@odata.type": "#NS.Person"})).entity_type(),
            "Person"
        );
        assert_eq!(
            entity(&json!({"@odata.context": "$metadata#People/$entity"}))
                .entity_type(),
            "People"
        );
        let vip = json!({
            "@odata.type": "#NS.VIP",
            "@odata.context": "$metadata#People/$entity"
        });
        assert_eq!(entity(&vip).entity_type(), "VIP");
        assert_eq!(entity(&json!({"A": 1})).entity_type(), "Unknown");
    }

    #[test]
    fn test_entity_keys() {
        assert_eq!(
            entity(&json!({"@odata.id": "People(5)"})).id(),
            Some(&EntityId::Integer(5))
        );
        assert_eq!(
            entity(&json!({"@odata.id": "Lines(OrderID=1,Line=2)"}))
                .id(),

            Some(&EntityId::String("OrderID=1,Line=2".into()))
        );
        assert_eq!(entity(&json!({"@odata.id": "People"})).id(), None);
        assert_eq!(entity(&json!({"Id": 3})).id(), None);
    }

    #[test]
    fn test_navigation_classification() {
        let e = entity(&json!({
            "Name": "a",
            "Tags": ["x", "y"],
            "Empty": [],
            "Nothing": null,
            "Mixed": [{"a": 1}, 2],
            "Orders": [ {"OrderID": 1}, {"OrderID": 2} ],
            "Orders@odata.count": 10,
            "Orders@odata.nextLink": "Customers('A')/Orders?$skip=2",
            "Address": {"City": "Oslo"}
        }));

        let flat: Vec<&String> = e.properties().keys().collect();
        assert_eq!(flat, ["Name", "Tags", "Empty", "Nothing", "Mixed"]);
        assert!(!e.has_property("Orders@odata.count"));

        let orders = e.navigation("Orders").unwrap().as_collection().unwrap();
        assert_eq!(orders.count(), 2);
        assert_eq!(orders.total_count(), Some(10));
        assert_eq!(orders.next_link(), Some("Customers('A')/Orders?$skip=2"));
        assert_eq!(orders.first().unwrap().entity_type(), "Unknown");
        assert!(!orders.first().unwrap().is_new());

        let address = e.navigation("Address").unwrap().as_entity().unwrap();
        assert_eq!(address.property("City").unwrap(), "Oslo");
    }

    #[test]
    fn test_navigation_annotation_before_value() {
        let e = entity(&json!({
            "Lines@odata.count": 1,
            "Lines": [ {"No": 1} ]
        }));
        let lines = e.navigation("Lines").unwrap().as_collection().unwrap();
        assert_eq!(lines.total_count(), Some(1));
    }

    #[test]
    fn test_protocol_annotations_are_consumed() {
        let e = entity(&json!({
            "@odata.editLink": "People(1)",
            "Photo@odata.mediaReadLink": "People(1)/Photo",
            "Name": "a"
        }));
        assert_eq!(e.properties().len(), 1);
        assert!(e.navigation("Photo").is_none());
    }

    #[test]
    fn test_custom_annotations_are_kept() {
        let e = entity(&json!({
            "@Org.Custom": "x",
            "Price@odata.type": "#Edm.Decimal",
            "Price": "1.5",
            "Name@Core.Description": "d"
        }));
        let keys: Vec<&String> = e.properties().keys().collect();
        assert_eq!(keys, ["@Org.Custom", "Price", "Name@Core.Description"]);
        assert_eq!(e.property("Name@Core.Description").unwrap(), "d");

        let e = entity(&json!({"Tags@Org.Meta": {"source": "import"}}));
        assert_eq!(e.property("Tags@Org.Meta").unwrap()["source"], "import");
        assert_eq!(e.navigations().count(), 0);
    }

    #[test]
    fn test_nested_entities_recurse() {
        let e = entity(&json!({
            "@odata.id": "Customers('A')",
            "Orders": [
                {
                    "@odata.id": "Orders(1)",
                    "@odata.type": "#NS.Order",
                    "Lines": [ {"@odata.id": "Lines(7)", "Qty": 2} ]
                }
            ]
        }));
        let order = e
            .navigation("Orders")
            .and_then(Navigation::as_collection)
            .and_then(EntityCollection::first)
            .unwrap();
        assert_eq!(order.entity_type(), "Order");
        assert_eq!(order.id(), Some(&EntityId::Integer(1)));
        let line = order
            .navigation("Lines")
            .and_then(Navigation::as_collection)
            .and_then(EntityCollection::first)
            .unwrap();
        assert_eq!(line.id(), Some(&EntityId::Integer(7)));
        assert_eq!(line.property("Qty").unwrap(), 2);
    }

    #[test]
    fn test_entity_not_object_is_malformed() {
        let err = V4Normalizer::new()
            .parse_entity_value(&json!([{"a": 1}]), &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn test_etag_header_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ETAG, "\"abc\"".parse().unwrap());
        let e = V4Normalizer::new()
            .parse_entity_value(&json!({"A": 1}), &headers)
            .unwrap();
        assert_eq!(e.etag(), Some("\"abc\""));
        assert!(!e.is_new());
    }

    #[test]
    fn test_key_fallback_properties() {
        let n = V4Normalizer::with_options(NormalizerOptions {
            key_fallback_properties: vec!["Code".into(), "Id".into()],
            ..NormalizerOptions::default()
        });
        let e = n
            .parse_entity_value(&json!({"Id": 3, "Name": "a"}), &HeaderMap::new())
            .unwrap();
        assert_eq!(e.id(), Some(&EntityId::Integer(3)));

        let annotated = n
            .parse_entity_value(&json!({"@odata.id": "X('k')", "Id": 3}), &HeaderMap::new())
            .unwrap();
        assert_eq!(annotated.id(), Some(&EntityId::String("k".into())));
    }
}
