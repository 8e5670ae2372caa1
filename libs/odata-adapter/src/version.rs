use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Response header carrying the protocol version in `OData` V4.
pub const ODATA_VERSION_HEADER: &str = "odata-version";

/// Response header carrying the protocol version in `OData` V2.
pub const DATA_SERVICE_VERSION_HEADER: &str = "dataserviceversion";

/// Protocol version selected by the caller.
///
/// The version is always explicit configuration; nothing in this crate infers it
/// from a payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ODataVersion {
    #[serde(rename = "v2", alias = "V2", alias = "2")]
    V2,
    #[default]
    #[serde(rename = "v4", alias = "V4", alias = "4")]
    V4,
}

impl ODataVersion {
    #[must_use]
    pub fn major(self) -> u8 {
        match self {
            ODataVersion::V2 => 2,
            ODataVersion::V4 => 4,
        }
    }

    /// Name of the response header a server of this version uses to announce itself.
    #[must_use]
    pub fn version_header(self) -> &'static str {
        match self {
            ODataVersion::V2 => DATA_SERVICE_VERSION_HEADER,
            ODataVersion::V4 => ODATA_VERSION_HEADER,
        }
    }

    /// Major version announced by a header value such as `4.0`, `4.01` or `2.0;NetFx`.
    #[must_use]
    pub fn major_from_header(value: &str) -> Option<u8> {
        let version = value.split(';').next()?.trim();
        let major = version.split('.').next()?;
        major.parse().ok()
    }
}

impl fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ODataVersion::V2 => write!(f, "v2"),
            ODataVersion::V4 => write!(f, "v4"),
        }
    }
}

impl FromStr for ODataVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v2" | "2" | "2.0" => Ok(ODataVersion::V2),
            "v4" | "4" | "4.0" | "4.01" => Ok(ODataVersion::V4),
            other => Err(Error::InvalidArgument(format!(
                "unsupported OData version: {other}"
            ))),
        }
    }
}
