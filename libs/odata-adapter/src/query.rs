//! Query option assembler
//!
//! Collects system query options (`$select`, `$filter`, `$orderby`, ...) and custom
//! options into an ordered map, then renders them as a percent-encoded query string.
//!
//! Count and search differ between protocol versions. The difference lives in a
//! [`VersionPolicy`] chosen by the caller through the type parameter:
//!
//! ```rust
//! use odata_adapter::{V2QueryOptions, V4QueryOptions};
//!
//! # fn main() -> Result<(), odata_adapter::Error> {
//! let v4 = V4QueryOptions::new().top(10)?.count(true).search("blue")?;
//! assert_eq!(v4.query_string(), "?$top=10&$count=true&$search=blue");
//!
//! let v2 = V2QueryOptions::new().top(10)?.count(true);
//! assert_eq!(v2.query_string(), "?$top=10&$inlinecount=allpages");
//! assert!(V2QueryOptions::new().search("blue").is_err());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::version::ODataVersion;

/// Reserved prefix of system query options.
pub const SYSTEM_OPTION_PREFIX: char = '$';

pub const SELECT: &str = "$select";
pub const EXPAND: &str = "$expand";
pub const FILTER: &str = "$filter";
pub const ORDER_BY: &str = "$orderby";
pub const TOP: &str = "$top";
pub const SKIP: &str = "$skip";
pub const COUNT: &str = "$count";
pub const INLINE_COUNT: &str = "$inlinecount";
pub const SEARCH: &str = "$search";
pub const FORMAT: &str = "$format";
pub const SKIP_TOKEN: &str = "$skiptoken";

// Ordering primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDir {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortDir::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortDir::Desc)
        } else {
            Err(Error::InvalidArgument(format!(
                "order direction must be `asc` or `desc`, got `{s}`"
            )))
        }
    }
}

/// Insertion-ordered option name to value mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptionMap(Vec<(String, String)>);

impl OptionMap {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace the value of an existing option in place, or append a new one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        } else {
            self.0.push((name.to_owned(), value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == name)?;
        Some(self.0.remove(idx).1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a OptionMap {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Property or relation names for `$select` / `$expand`: one name or an ordered list.
pub trait FieldNames {
    /// Trimmed names in caller order; blank entries are dropped.
    fn into_names(self) -> Vec<String>;
}

fn collect_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_owned())
        .filter(|n| !n.is_empty())
        .collect()
}

impl FieldNames for &str {
    fn into_names(self) -> Vec<String> {
        collect_names([self])
    }
}

impl FieldNames for String {
    fn into_names(self) -> Vec<String> {
        collect_names([self])
    }
}

impl FieldNames for &String {
    fn into_names(self) -> Vec<String> {
        collect_names([self])
    }
}

impl<S: AsRef<str>, const N: usize> FieldNames for [S; N] {
    fn into_names(self) -> Vec<String> {
        collect_names(self)
    }
}

impl<S: AsRef<str>> FieldNames for &[S] {
    fn into_names(self) -> Vec<String> {
        collect_names(self)
    }
}

impl<S: AsRef<str>> FieldNames for Vec<S> {
    fn into_names(self) -> Vec<String> {
        collect_names(self)
    }
}

impl<S: AsRef<str>> FieldNames for &Vec<S> {
    fn into_names(self) -> Vec<String> {
        collect_names(self)
    }
}

/// Version-specific count and search behavior.
pub trait VersionPolicy {
    const VERSION: ODataVersion;

    /// Apply `count(include)` to the option map.
    fn apply_count(options: &mut OptionMap, include: bool);

    /// Apply `search(term)` to the option map.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` when the version has no search option.
    fn apply_search(options: &mut OptionMap, term: &str) -> Result<()>;
}

/// `OData` V2: `$inlinecount=allpages`, no `$search`.
#[derive(Clone, Copy, Debug, Default)]
pub struct V2Policy;

impl VersionPolicy for V2Policy {
    const VERSION: ODataVersion = ODataVersion::V2;

    fn apply_count(options: &mut OptionMap, include: bool) {
        options.remove(COUNT);
        if include {
            options.set(INLINE_COUNT, "allpages");
        } else {
            options.remove(INLINE_COUNT);
        }
    }

    fn apply_search(_options: &mut OptionMap, term: &str) -> Result<()> {
        Err(Error::InvalidArgument(format!(
            "$search is not supported by OData V2 (term `{term}`)"
        )))
    }
}

/// `OData` V4: boolean `$count`, raw `$search`.
#[derive(Clone, Copy, Debug, Default)]
pub struct V4Policy;

impl VersionPolicy for V4Policy {
    const VERSION: ODataVersion = ODataVersion::V4;

    fn apply_count(options: &mut OptionMap, include: bool) {
        options.remove(INLINE_COUNT);
        options.set(COUNT, if include { "true" } else { "false" });
    }

    fn apply_search(options: &mut OptionMap, term: &str) -> Result<()> {
        options.set(SEARCH, term);
        Ok(())
    }
}

/// Fluent query option assembler parameterized by protocol version.
#[derive(Clone, Debug)]
#[must_use]
pub struct QueryOptions<P: VersionPolicy> {
    options: OptionMap,
    resource: Option<String>,
    _policy: PhantomData<P>,
}

pub type V2QueryOptions = QueryOptions<V2Policy>;
pub type V4QueryOptions = QueryOptions<V4Policy>;

impl<P: VersionPolicy> Default for QueryOptions<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: VersionPolicy> QueryOptions<P> {
    pub fn new() -> Self {
        Self {
            options: OptionMap::default(),
            resource: None,
            _policy: PhantomData,
        }
    }

    /// Protocol version this assembler renders for.
    #[must_use]
    pub fn version(&self) -> ODataVersion {
        P::VERSION
    }

    /// Resource path the options apply to, e.g. `Customers('ALFKI')/Orders`.
    pub fn resource(mut self, path: impl Into<String>) -> Self {
        self.resource = Some(path.into());
        self
    }

    #[must_use]
    pub fn resource_path(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// `$select`, comma-joined in caller order. An empty list clears the option.
    pub fn select(mut self, fields: impl FieldNames) -> Self {
        self.set_names(SELECT, &fields.into_names());
        self
    }

    /// `$expand`, comma-joined in caller order. An empty list clears the option.
    pub fn expand(mut self, relations: impl FieldNames) -> Self {
        self.set_names(EXPAND, &relations.into_names());
        self
    }

    /// `$filter`, stored verbatim (typically a `FilterBuilder` output).
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.options.set(FILTER, expression);
        self
    }

    /// Append `field direction` to `$orderby`; repeated calls accumulate.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` unless `direction` is `asc` or `desc` (any case).
    pub fn order_by(mut self, field: &str, direction: &str) -> Result<Self> {
        let dir: SortDir = direction.parse()?;
        let clause = format!("{field} {dir}");
        let value = match self.options.get(ORDER_BY) {
            Some(existing) => format!("{existing},{clause}"),
            None => clause,
        };
        self.options.set(ORDER_BY, value);
        Ok(self)
    }

    /// `$top`
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for negative values.
    pub fn top(mut self, n: i64) -> Result<Self> {
        self.options.set(TOP, non_negative(TOP, n)?);
        Ok(self)
    }

    /// `$skip`
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for negative values.
    pub fn skip(mut self, n: i64) -> Result<Self> {
        self.options.set(SKIP, non_negative(SKIP, n)?);
        Ok(self)
    }

    /// Request (or stop requesting) the total count, per the version policy.
    pub fn count(mut self, include: bool) -> Self {
        P::apply_count(&mut self.options, include);
        self
    }

    /// Free-text search, per the version policy.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` on `OData` V2.
    pub fn search(mut self, term: &str) -> Result<Self> {
        P::apply_search(&mut self.options, term)?;
        Ok(self)
    }

    /// `$format`, stored verbatim.
    pub fn format(mut self, value: impl Into<String>) -> Self {
        self.options.set(FORMAT, value);
        self
    }

    /// `$skiptoken` for server-driven paging.
    pub fn skip_token(mut self, token: impl Into<String>) -> Self {
        self.options.set(SKIP_TOKEN, token);
        self
    }

    /// A custom (non-system) query option.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the name is empty or starts with `$`.
    pub fn custom(mut self, name: &str, value: impl Into<String>) -> Result<Self> {
        if name.is_empty() || name.starts_with(SYSTEM_OPTION_PREFIX) {
            return Err(Error::InvalidArgument(format!(
                "custom query option name `{name}` is empty or uses the reserved `$` prefix"
            )));
        }
        self.options.set(name, value);
        Ok(self)
    }

    fn set_names(&mut self, option: &str, names: &[String]) {

        if names.is_empty() {
            self.options.remove(option);
        } else {
            self.options.set(option, names.join(","));
        }
    }

    /// Accumulated options, in insertion order.
    #[must_use]
    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    /// Render `?k=v&k=v` with RFC 3986 percent-encoding; empty when no options are set.
    #[must_use]
    pub fn query_string(&self) -> String {
        if self.options.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = self
            .options
            .iter()
            .map(|(k, v)| format!("{}={}", encode_key(k), urlencoding::encode(v)))
            .collect();
        format!("?{}", pairs.join("&"))
    }

    /// Full URL: `base`, the resource path (if any) and the query string.
    #[must_use]
    pub fn url(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self.resource.as_deref() {
            Some(path) => format!(
                "{base}/{}{}",
                path.trim_start_matches('/'),
                self.query_string()
            ),
            None => format!("{base}{}", self.query_string()),
        }
    }
}

fn non_negative(option: &str, n: i64) -> Result<String> {
    if n < 0 {
        return Err(Error::InvalidArgument(format!(
            "{option} must be non-negative, got {n}"
        )));
    }
    Ok(n.to_string())
}

/// System option names keep their `$` readable; everything else is percent-encoded.
fn encode_key(key: &str) -> String {
    match key.strip_prefix(SYSTEM_OPTION_PREFIX) {
        Some(rest) => format!("{SYSTEM_OPTION_PREFIX}{}", urlencoding::encode(rest)),
        None => urlencoding::encode(key).into_owned(),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_select_and_expand_preserve_order() {
        let q = V4QueryOptions::new()
            .select(["Name", "Id", "City"])
            .expand(vec!["Orders".to_owned()]);
        assert_eq!(q.options().get(SELECT), Some("Name,Id,City"));
        assert_eq!(q.options().get(EXPAND), Some("Orders"));
    }

    #[test]
    fn test_single_name_select() {
        let q = V2QueryOptions::new()
            .select("Name")
            .expand(String::from("Orders"));
        assert_eq!(q.options().get(SELECT), Some("Name"));
        assert_eq!(q.options().get(EXPAND), Some("Orders"));
    }

    #[test]
    fn test_empty_names_clear_option() {
        let none: &[&str] = &[];
        let q = V4QueryOptions::new()
            .select(["Name"])
            .select(none)
            .expand(" ");
        assert!(q.options().is_empty());
        assert_eq!(q.query_string(), "");

        let q = V4QueryOptions::new().select(["Name", " ", "City "]);
        assert_eq!(q.options().get(SELECT), Some("Name,City"));
    }

    #[test]
    fn test_order_by_accumulates() {
        let q = V4QueryOptions::new()
            .order_by("Name", "ASC")
            .unwrap()
            .order_by("Age", "desc")
            .unwrap();
        assert_eq!(q.options().get(ORDER_BY), Some("Name asc,Age desc"));
    }

    #[test]
    fn test_order_by_rejects_bad_direction() {
        let err = V4QueryOptions::new().order_by("Name", "up").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_top_skip_validation() {
        assert!(V4QueryOptions::new().top(-1).is_err());
        assert!(V2QueryOptions::new().skip(-5).is_err());
        let q = V4QueryOptions::new().top(0).unwrap().skip(20).unwrap();
        assert_eq!(q.options().get(TOP), Some("0"));
        assert_eq!(q.options().get(SKIP), Some("20"));
    }

    #[test]
    fn test_v2_count_policy() {
        let q = V2QueryOptions::new().count(true);
        assert_eq!(q.options().get(INLINE_COUNT), Some("allpages"));
        assert!(!q.options().contains(COUNT));

        let q = q.count(false);
        assert!(!q.options().contains(INLINE_COUNT));
        assert!(!q.options().contains(COUNT));
    }

    #[test]
    fn test_v2_count_clears_v4_key() {
        let mut options = OptionMap::default();
        options.set(COUNT, "true");
        V2Policy::apply_count(&mut options, true);
        assert!(!options.contains(COUNT));
        assert_eq!(options.get(INLINE_COUNT), Some("allpages"));
    }

    #[test]
    fn test_v4_count_policy() {
        let mut options = OptionMap::default();
        options.set(INLINE_COUNT, "allpages");
        V4Policy::apply_count(&mut options, true);
        assert_eq!(options.get(COUNT), Some("true"));
        assert!(!options.contains(INLINE_COUNT));

        let q = V4QueryOptions::new().count(false);
        assert_eq!(q.options().get(COUNT), Some("false"));
    }

    #[test]
    fn test_search_policies() {
        let q = V4QueryOptions::new().search("blue OR green").unwrap();
        assert_eq!(q.options().get(SEARCH), Some("blue OR green"));
        assert!(matches!(
            V2QueryOptions::new().search("x"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_custom_rejects_reserved_prefix() {
        assert!(V4QueryOptions::new().custom("$foo", "1").is_err());
        assert!(V4QueryOptions::new().custom("", "1").is_err());
        let q = V4QueryOptions::new().custom("sap-client", "100").unwrap();
        assert_eq!(q.options().get("sap-client"), Some("100"));
    }

    #[test]
    fn test_query_string_encoding() {
        let q = V4QueryOptions::new()
            .filter("Name eq 'A&B' and Age gt 5")
            .format("json")
            .custom("my key", "a+b")
            .unwrap();
        assert_eq!(
            q.query_string(),
            "?$filter=Name%20eq%20%27A%26B%27%20and%20Age%20gt%205&$format=json&my%20key=a%2Bb"
        );
    }

    #[test]
    fn test_empty_query_string() {
        assert_eq!(V2QueryOptions::new().query_string(), "");
    }

    #[test]
    fn test_setting_option_twice_keeps_position() {
        let q = V4QueryOptions::new()
            .filter("A eq 1")
            .top(5)
            .unwrap()
            .filter("B eq 2");
        let keys: Vec<&str> = q.options().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![FILTER, TOP]);
        assert_eq!(q.options().get(FILTER), Some("B eq 2"));
    }

    #[test]
    fn test_url_with_resource() {
        let q = V4QueryOptions::new()
            .resource("/Customers('ALFKI')/Orders")
            .top(1)
            .unwrap();
        assert_eq!(
            q.url("https://host/svc/"),
            "https://host/svc/Customers('ALFKI')/Orders?$top=1"
        );
        assert_eq!(
            V2QueryOptions::new().url("https://host/svc"),
            "https://host/svc"
        );

    }

    #[test]
    fn test_version_reported() {
        assert_eq!(V2QueryOptions::new().version(), ODataVersion::V2);
        assert_eq!(V4QueryOptions::new().version(), ODataVersion::V4);
    }

    #[test]
    fn test_sort_dir_parse() {
        assert_eq!("DESC".parse::<SortDir>().unwrap(), SortDir::Desc);
        assert!("descending".parse::<SortDir>().is_err());
    }
}
