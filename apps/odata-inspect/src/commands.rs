use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use http::{HeaderMap, HeaderName, HeaderValue};
use odata_adapter::{
    ODataVersion, QueryOptions, ResponseNormalizer, V2Policy, V4Policy, VersionPolicy,
};

use crate::config::InspectConfig;
use crate::render;

/// Response body source: a file path, or stdin when absent or `-`.
#[derive(Args)]
pub struct InputArgs {
    /// Response body file (`-` or omitted reads stdin)
    input: Option<PathBuf>,
}

impl InputArgs {
    fn read(&self) -> Result<String> {
        match self.input.as_deref() {
            Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            _ => {
                let mut body = String::new();
                std::io::stdin()
                    .read_to_string(&mut body)
                    .context("failed to read stdin")?;
                Ok(body)
            }
        }
    }
}

#[derive(Args)]
pub struct NormalizeArgs {
    /// Treat the body as a single entity instead of a collection
    #[arg(long)]
    entity: bool,

    /// Response header as `Name: value` (repeatable), e.g. `ETag: W/"1"`
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    #[command(flatten)]
    input: InputArgs,
}

impl NormalizeArgs {
    pub fn run(&self, config: &InspectConfig) -> Result<()> {
        let body = self.input.read()?;
        let headers = parse_headers(&self.headers)?;
        let normalizer = config.odata.normalizer();

        let view = if self.entity {
            render::entity(&normalizer.parse_entity(&body, &headers)?)
        } else {
            render::collection(&normalizer.parse_collection(&body, &headers)?)
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        Ok(())
    }
}

#[derive(Args)]
pub struct LinksArgs {
    #[command(flatten)]
    input: InputArgs,
}

impl LinksArgs {
    pub fn run(&self, config: &InspectConfig) -> Result<()> {
        let body = self.input.read()?;
        let normalizer = config.odata.normalizer();
        let view = serde_json::json!({
            "next_link": normalizer.extract_next_link(&body)?,
            "delta_link": normalizer.extract_delta_link(&body)?,
            "inline_count": normalizer.extract_inline_count(&body)?,
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
        Ok(())
    }
}

#[derive(Args)]
pub struct QueryArgs {
    /// Resource path appended to `--base`, e.g. `Customers`
    #[arg(long)]
    resource: Option<String>,

    /// Service root; prints a full URL instead of only the query string
    #[arg(long)]
    base: Option<String>,

    /// Properties for `$select` (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,

    /// Navigation properties for `$expand`
    #[arg(long, value_delimiter = ',')]
    expand: Vec<String>,

    /// Raw `$filter` expression
    #[arg(long)]
    filter: Option<String>,

    /// Ordering as `field` or `field:asc|desc` (repeatable)
    #[arg(long = "orderby")]
    order_by: Vec<String>,

    #[arg(long)]
    top: Option<i64>,

    #[arg(long)]
    skip: Option<i64>,

    /// Request the total count
    #[arg(long)]
    count: bool,

    /// Free-text `$search` (V4 only)
    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    format: Option<String>,

    /// Custom query option as `name=value` (repeatable)
    #[arg(long = "param")]
    params: Vec<String>,
}

impl QueryArgs {
    pub fn run(&self, config: &InspectConfig) -> Result<()> {
        let rendered = match config.odata.version {
            ODataVersion::V2 => self.build::<V2Policy>()?,
            ODataVersion::V4 => self.build::<V4Policy>()?,
        };
        println!("{rendered}");
        Ok(())
    }

    fn build<P: VersionPolicy>(&self) -> Result<String> {
        let mut query = QueryOptions::<P>::new();
        if let Some(resource) = &self.resource {
            query = query.resource(resource);
        }
        query = query.select(&self.select).expand(&self.expand);
        if let Some(filter) = &self.filter {
            query = query.filter(filter);
        }
        for clause in &self.order_by {
            let (field, direction) = clause.split_once(':').unwrap_or((clause.as_str(), "asc"));
            query = query.order_by(field, direction)?;
        }
        if let Some(top) = self.top {
            query = query.top(top)?;
        }
        if let Some(skip) = self.skip {
            query = query.skip(skip)?;
        }
        if self.count {
            query = query.count(true);
        }
        if let Some(term) = &self.search {
            query = query.search(term)?;
        }
        if let Some(format) = &self.format {
            query = query.format(format);
        }
        for param in &self.params {
            let (name, value) = param
                .split_once('=')
                .with_context(|| format!("custom option `{param}` must be name=value"))?;
            query = query.custom(name, value)?;
        }

        tracing::debug!(
            version = %P::VERSION,
            options = query.options().len(),
            "built query"
        );
        Ok(match &self.base {
            Some(base) => query.url(base),
            None => query.query_string(),
        })
    }
}

fn parse_headers(raw: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for line in raw {
        let (name, value) = line
            .split_once(':')
            .with_context(|| format!("header `{line}` must be `Name: value`"))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("invalid header name in `{line}`"))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("invalid header value in `{line}`"))?;
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        query: QueryArgs,
    }

    fn query_args(args: &[&str]) -> QueryArgs {
        let command_line = std::iter::once("test").chain(args.iter().copied());
        TestCli::parse_from(command_line).query

    }

    #[test]
    fn test_parse_headers() {
        let raw = ["ETag: W/\"1\"".to_owned(), "OData-Version: 4.0".to_owned()];
        let headers = parse_headers(&raw).unwrap();
        assert_eq!(headers.get("etag").unwrap(), "W/\"1\"");
        assert_eq!(headers.get("odata-version").unwrap(), "4.0");
        assert!(parse_headers(&["no-colon".to_owned()]).is_err());
        assert!(parse_headers(&["bad name: x".to_owned()]).is_err());
    }

    #[test]
    fn test_build_v4_query() {
        let args = query_args(&[
            "--select",
            "Name,City",
            "--orderby",
            "Name",
            "--orderby",
            "City:desc",
            "--top",
            "5",
            "--count",
        ]);
        assert_eq!(
            args.build::<V4Policy>().unwrap(),
            "?$select=Name%2CCity&$orderby=Name%20asc%2CCity%20desc&$top=5&$count=true"
        );
        assert_eq!(
            args.build::<V2Policy>().unwrap(),
            "?$select=Name%2CCity&$orderby=Name%20asc%2CCity%20desc&$top=5&$inlinecount=allpages"
        );
    }

    #[test]
    fn test_build_url_with_custom_param() {
        let args = query_args(&[
            "--base",
            "https://host/svc",
            "--resource",
            "Orders",
            "--param",
            "sap-client=100",
        ]);
        assert_eq!(
            args.build::<V2Policy>().unwrap(),
            "https://host/svc/Orders?sap-client=100"
        );
    }

    #[test]
    fn test_build_without_options_is_empty() {
        let args = query_args(&[]);
        assert_eq!(args.build::<V4Policy>().unwrap(), "");
        assert_eq!(args.build::<V2Policy>().unwrap(), "");
    }

    #[test]
    fn test_build_errors() {
        assert!(query_args(&["--search", "x"]).build::<V2Policy>().is_err());
        let v4_rejects = [
            ["--orderby", "Name:up"],
            ["--param", "novalue"],
            ["--param", "$top=1"],
        ];
        for args in v4_rejects {
            assert!(query_args(&args).build::<V4Policy>().is_err());
        }
    }

}
