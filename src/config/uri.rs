//! Connection URI parsing
//!
//! A connection URI has the shape
//! `scheme://host[:port]/[base/api/path/]keyspace[?applicationToken=..&logLevel=..]`.
//! The keyspace is always the last path segment.

use url::Url;

use super::LogLevel;
use crate::error::{ConnectionError, Result};

/// Base API path of hosted deployments.
pub const DEFAULT_BASE_API_PATH: &str = "api/json/v1";

/// The pieces of a connection URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    /// `scheme://host[:port]`
    pub base_url: String,
    /// Segments between the origin and the keyspace, if any
    pub base_api_path: Option<String>,
    pub keyspace: String,
    pub token: Option<String>,
    pub log_level: Option<LogLevel>,
}

/// Parse a connection URI.
///
/// # Arguments
/// * `uri` - e.g. `http://localhost:8181/v1/testks1?applicationToken=abc`
///
/// # Returns
/// * `Result<ParsedUri>` - The parsed parts, or `ConnectionError::InvalidUri`
pub fn parse_uri(uri: &str) -> Result<ParsedUri> {
    let invalid = || ConnectionError::InvalidUri(uri.to_string());

    let url = Url::parse(uri).map_err(|_| invalid())?;
    if !url.has_host() {
        return Err(invalid().into());
    }

    let mut segments: Vec<&str> = url
        .path_segments()
        .map(|parts| parts.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    let keyspace = segments.pop().ok_or_else(invalid)?.to_string();
    let base_api_path = (!segments.is_empty()).then(|| segments.join("/"));

    let mut token = None;
    let mut log_level = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "applicationToken" => token = Some(value.into_owned()),
            "logLevel" => log_level = Some(value.parse::<LogLevel>()?),
            _ => {}
        }
    }

    Ok(ParsedUri {
        base_url: url.origin().ascii_serialization(),
        base_api_path,
        keyspace,
        token,
        log_level,
    })
}

/// Build a connection URI for a hosted endpoint.
///
/// # Arguments
/// * `api_endpoint` - Database endpoint, e.g. `https://<id>-<region>.apps.example.com`
/// * `keyspace` - Keyspace to address
/// * `token` - Application token, added as `applicationToken`
/// * `base_api_path` - Defaults to `api/json/v1`
/// * `log_level` - Added as `logLevel` when set
///
/// # Returns
/// * `Result<String>` - A URI that [`parse_uri`] accepts
pub fn create_astra_uri(
    api_endpoint: &str,
    keyspace: &str,
    token: Option<&str>,
    base_api_path: Option<&str>,
    log_level: Option<LogLevel>,
) -> Result<String> {
    let mut url = Url::parse(api_endpoint)
        .map_err(|_| ConnectionError::InvalidUri(api_endpoint.to_string()))?;

    let base_path = base_api_path.unwrap_or(DEFAULT_BASE_API_PATH);
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ConnectionError::InvalidUri(api_endpoint.to_string()))?;
        path.clear();
        path.extend(base_path.split('/').filter(|p| !p.is_empty()));
        path.push(keyspace);
    }

    if token.is_some() || log_level.is_some() {
        let mut query = url.query_pairs_mut();
        if let Some(token) = token {
            query.append_pair("applicationToken", token);
        }
        if let Some(level) = log_level {
            query.append_pair("logLevel", level.as_str());
        }
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_uri() {
        let parsed =
            parse_uri("http://localhost:8181/v1/testks1?applicationToken=tok&logLevel=debug")
                .unwrap();
        assert_eq!(parsed.base_url, "http://localhost:8181");
        assert_eq!(parsed.base_api_path.as_deref(), Some("v1"));
        assert_eq!(parsed.keyspace, "testks1");
        assert_eq!(parsed.token.as_deref(), Some("tok"));
        assert_eq!(parsed.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn test_parse_keyspace_only() {
        let parsed = parse_uri("https://db.example.com/ks/").unwrap();
        assert_eq!(parsed.base_url, "https://db.example.com");
        assert_eq!(parsed.base_api_path, None);
        assert_eq!(parsed.keyspace, "ks");
        assert_eq!(parsed.token, None);
    }

    #[test]
    fn test_parse_requires_keyspace() {
        assert!(parse_uri("http://localhost:8181").is_err());
        assert!(parse_uri("not a uri").is_err());
    }

    #[test]
    fn test_astra_uri_round_trip() {
        let uri = create_astra_uri(
            "https://abc-us-east1.apps.example.com",
            "default_keyspace",
            Some("AstraCS:xyz"),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            uri,
            "https://abc-us-east1.apps.example.com/api/json/v1/default_keyspace?applicationToken=AstraCS%3Axyz"
        );

        let parsed = parse_uri(&uri).unwrap();
        assert_eq!(parsed.base_api_path.as_deref(), Some("api/json/v1"));
        assert_eq!(parsed.keyspace, "default_keyspace");
        assert_eq!(parsed.token.as_deref(), Some("AstraCS:xyz"));
    }

    #[test]
    fn test_astra_uri_custom_path() {
        let uri = create_astra_uri(
            "http://localhost:8181/",
            "ks",
            None,
            Some("/v1/"),
            Some(LogLevel::Wire),
        )
        .unwrap();
        assert_eq!(uri, "http://localhost:8181/v1/ks?logLevel=wire");
    }
}
