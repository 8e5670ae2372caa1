//! Fluent `$filter` expression builder
//!
//! Produces a single filter string from chained conditions, connectors, groups and
//! negation. The builder keeps a flat list of emitted parts rather than an expression
//! tree; grouping and negation are applied to the unit being emitted.
//!
//! # Example
//!
//! ```rust
//! use odata_adapter::FilterBuilder;
//!
//! # fn main() -> Result<(), odata_adapter::Error> {
//! let filter = FilterBuilder::new()
//!     .field("Country")
//!     .equals("Germany")?
//!     .and()
//!     .group(|g| {
//!         g.field("Age").greater_than(18)?
//!             .or()
//!             .field("Verified").equals(true)
//!     })?
//!     .build();
//!
//! assert_eq!(filter, "Country eq 'Germany' and (Age gt 18 or Verified eq true)");
//! # Ok(())
//! # }
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::literal::{IntoLiteral, Literal, encode};

/// Comparison operators understood by both protocol versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "eq"),
            CompareOp::Ne => write!(f, "ne"),
            CompareOp::Gt => write!(f, "gt"),
            CompareOp::Ge => write!(f, "ge"),
            CompareOp::Lt => write!(f, "lt"),
            CompareOp::Le => write!(f, "le"),
        }
    }
}

/// Stateful fluent filter assembler.
///
/// Each call consumes the builder and returns the next state, so a builder is
/// owned by exactly one call site. Operations that need a field fail with
/// `Error::MissingFieldContext` unless preceded by [`field`](Self::field) or
/// [`func`](Self::func).
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct FilterBuilder {
    parts: Vec<String>,
    current_field: Option<String>,
    negate_next: bool,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field the next condition applies to. Emits nothing.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.current_field = Some(name.into());
        self
    }

    /// Use a function call as the subject of the next condition, e.g. `length(Name)`.
    ///
    /// String arguments that look like bare identifiers (`[A-Za-z_][A-Za-z0-9_]*`,
    /// other than `true`, `false` and `null`) pass through unquoted; everything else
    /// is literal-encoded.
    ///
    /// # Errors
    /// Returns `Error::UnsupportedValue` if an argument has no literal form.
    pub fn func<I, A>(mut self, name: &str, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoLiteral,
    {
        let mut rendered = Vec::new();
        for arg in args {
            match arg.into_literal()? {
                Literal::String(s) if is_bare_identifier(&s) => rendered.push(s),
                other => rendered.push(other.encode()?),
            }
        }
        self.current_field = Some(format!("{name}({})", rendered.join(",")));
        Ok(self)
    }

    /// `field eq value`
    ///
    /// # Errors
    /// `Error::MissingFieldContext` without a current field; `Error::UnsupportedValue`
    /// if the value has no literal form.
    pub fn equals<V: IntoLiteral>(self, value: V) -> Result<Self> {
        self.compare("equals", CompareOp::Eq, value)
    }

    /// `field ne value`
    ///
    /// # Errors
    /// Same as [`equals`](Self::equals).
    pub fn not_equals<V: IntoLiteral>(self, value: V) -> Result<Self> {
        self.compare("not_equals", CompareOp::Ne, value)
    }

    /// `field gt value`
    ///
    /// # Errors
    /// Same as [`equals`](Self::equals).
    pub fn greater_than<V: IntoLiteral>(self, value: V) -> Result<Self> {
        self.compare("greater_than", CompareOp::Gt, value)
    }

    /// `field ge value`
    ///
    /// # Errors
    /// Same as [`equals`](Self::equals).
    pub fn greater_than_or_equals<V: IntoLiteral>(self, value: V) -> Result<Self> {
        self.compare("greater_than_or_equals", CompareOp::Ge, value)
    }

    /// `field lt value`
    ///
    /// # Errors
    /// Same as [`equals`](Self::equals).
    pub fn less_than<V: IntoLiteral>(self, value: V) -> Result<Self> {
        self.compare("less_than", CompareOp::Lt, value)
    }

    /// `field le value`
    ///
    /// # Errors
    /// Same as [`equals`](Self::equals).
    pub fn less_than_or_equals<V: IntoLiteral>(self, value: V) -> Result<Self> {
        self.compare("less_than_or_equals", CompareOp::Le, value)
    }

    /// `field eq null`
    ///
    /// # Errors
    /// `Error::MissingFieldContext` without a current field.
    pub fn is_null(self) -> Result<Self> {
        self.compare("is_null", CompareOp::Eq, Literal::Null)
    }

    /// `field ne null`
    ///
    /// # Errors
    /// `Error::MissingFieldContext` without a current field.
    pub fn is_not_null(self) -> Result<Self> {
        self.compare("is_not_null", CompareOp::Ne, Literal::Null)
    }

    /// Generic comparison; the named helpers above delegate here.
    ///
    /// # Errors
    /// Same as [`equals`](Self::equals).
    pub fn compare<V: IntoLiteral>(
        mut self,
        operation: &'static str,
        op: CompareOp,
        value: V,
    ) -> Result<Self> {
        let field = self.take_field(operation)?;
        let literal = encode(value)?;
        self.emit(format!("{field} {op} {literal}"));
        Ok(self)
    }

    /// `startswith(field,'value')`
    ///
    /// # Errors
    /// `Error::MissingFieldContext` without a current field.
    pub fn starts_with(self, value: &str) -> Result<Self> {
        self.field_first_call("starts_with", "startswith", value)
    }

    /// `endswith(field,'value')`
    ///
    /// # Errors
    /// `Error::MissingFieldContext` without a current field.
    pub fn ends_with(self, value: &str) -> Result<Self> {
        self.field_first_call("ends_with", "endswith", value)
    }

    /// `contains(field,'value')`
    ///
    /// # Errors
    /// `Error::MissingFieldContext` without a current field.
    pub fn contains(self, value: &str) -> Result<Self> {
        self.field_first_call("contains", "contains", value)
    }

    /// `substringof('value',field)`. V2 only; the argument order is reversed.
    ///
    /// # Errors
    /// `Error::MissingFieldContext` without a current field.
    pub fn substring_of(mut self, value: &str) -> Result<Self> {
        let field = self.take_field("substring_of")?;
        let literal = encode(value)?;
        self.emit(format!("substringof({literal},{field})"));
        Ok(self)
    }

    pub fn and(mut self) -> Self {
        self.parts.push("and".to_owned());
        self
    }

    pub fn or(mut self) -> Self {
        self.parts.push("or".to_owned());
        self
    }

    /// Negate the next emitted condition, predicate or group.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.negate_next = true;
        self
    }

    /// Build a parenthesized sub-expression with a fresh builder.
    ///
    /// An empty sub-expression emits nothing (a pending `not()` stays pending).
    ///
    /// # Errors
    /// Propagates any error returned by `build_group`.
    pub fn group<F>(mut self, build_group: F) -> Result<Self>
    where
        F: FnOnce(FilterBuilder) -> Result<FilterBuilder>,
    {
        let inner = build_group(FilterBuilder::new())?.build();
        if !inner.is_empty() {
            self.emit(format!("({inner})"));
        }
        Ok(self)
    }

    /// Join all emitted parts with single spaces.
    #[must_use]
    pub fn build(&self) -> String {
        self.parts.join(" ")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn field_first_call(
        mut self,
        operation: &'static str,
        func: &str,
        value: &str,
    ) -> Result<Self> {
        let field = self.take_field(operation)?;
        let literal = encode(value)?;
        self.emit(format!("{func}({field},{literal})"));
        Ok(self)
    }

    fn take_field(&mut self, operation: &'static str) -> Result<String> {
        self.current_field
            .take()
            .ok_or(Error::MissingFieldContext { operation })
    }

    /// Emit one unit, wrapping it in `not (...)` if negation is pending.
    fn emit(&mut self, unit: String) {
        if std::mem::take(&mut self.negate_next) {
            self.parts.push(format!("not ({unit})"));
        } else {
            self.parts.push(unit);
        }
    }
}

impl fmt::Display for FilterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

fn is_bare_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !matches!(s, "true" | "false" | "null")
}
