//! Decomposition of the HTTP request line.

use crate::entry::Entry;
use once_cell::sync::Lazy;
use url::Url;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

static BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("base url is valid"));

/// How much of the request path is broken down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RequestDetail {
    /// Method, path and protocol only.
    #[default]
    Basic,
    /// Also path segments, query parameters and file extension.
    Detailed,
}

/// The parts of a request line such as `GET /index.html HTTP/1.1`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Request {
    pub method: Option<String>,
    pub path: Option<String>,
    pub protocol: Option<String>,
    /// The protocol version without the `HTTP/` prefix.
    pub http_version: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub details: Option<RequestDetails>,
}

/// A finer breakdown of the request path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RequestDetails {
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub extension: Option<String>,
}

impl Request {
    /// Split a raw request line on single spaces into method, path and
    /// protocol.
    ///
    /// ```rust
    /// use ngxrow::request::Request;
    ///
    /// let request = Request::parse("GET /login HTTP/1.1");
    /// assert_eq!(request.method.as_deref(), Some("GET"));
    /// assert_eq!(request.path.as_deref(), Some("/login"));
    /// assert_eq!(request.http_version.as_deref(), Some("1.1"));
    /// ```
    pub fn parse(line: &str) -> Self {
        let mut parts = line.splitn(3, ' ').filter(|p| !p.is_empty());
        Self::from_parts(parts.next(), parts.next(), parts.next())
    }

    /// Build the request from a raw field map.
    ///
    /// Uses the `request_method`/`request_uri`/`server_protocol` fields when
    /// any of them was captured, otherwise splits a whole `request` field.
    /// Returns `None` when the line carried no request information.
    pub fn from_entry(entry: &Entry, nil: &str) -> Option<Self> {
        let method = entry.value("request_method", nil);
        let path = entry.value("request_uri", nil);
        let protocol = entry.value("server_protocol", nil);

        if method.is_some() || path.is_some() || protocol.is_some() {
            return Some(Self::from_parts(method, path, protocol));
        }
        entry
            .value("request", nil)
            .filter(|r| !r.is_empty())
            .map(Self::parse)
    }

    fn from_parts(method: Option<&str>, path: Option<&str>, protocol: Option<&str>) -> Self {
        Self {
            method: method.map(str::to_string),
            path: path.map(str::to_string),
            protocol: protocol.map(str::to_string),
            http_version: protocol.map(|p| p.strip_prefix("HTTP/").unwrap_or(p).to_string()),
            details: None,
        }
    }

    /// Attach the detailed path breakdown.
    pub fn with_details(mut self) -> Self {
        self.details = self.path.as_deref().and_then(RequestDetails::parse);
        self
    }

    /// The hostname of an absolute-URI request path (proxy-style requests).
    pub fn host(&self) -> Option<String> {
        let path = self.path.as_deref()?;
        if !is_absolute(path) {
            return None;
        }
        Url::parse(path)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .filter(|h| !h.is_empty())
    }
}

impl RequestDetails {
    /// Break a request path down; `None` when it is not a usable URI.
    pub fn parse(path: &str) -> Option<Self> {
        let url = if is_absolute(path) {
            Url::parse(path).ok()?
        } else {
            BASE_URL.join(path).ok()?
        };

        let segments: Vec<String> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        let extension = segments
            .last()
            .and_then(|last| last.rsplit_once('.'))
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase());
        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Some(Self {
            segments,
            query,
            extension,
        })
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_request_lines() {
        let request = Request::parse("GET /index.html");
        assert_eq!(request.path.as_deref(), Some("/index.html"));
        assert_eq!(request.protocol, None);
        assert_eq!(request.http_version, None);

        let request = Request::parse("PRI * HTTP/2.0");
        assert_eq!(request.http_version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_from_entry_prefers_split_fields() {
        let entry: Entry = [
            ("request_method", "POST"),
            ("request_uri", "/api"),
            ("server_protocol", "HTTP/2"),
        ]
        .into_iter()
        .collect();
        let request = Request::from_entry(&entry, "-").unwrap();
        assert_eq!(request.method.as_deref(), Some("POST"));
        assert_eq!(request.http_version.as_deref(), Some("2"));

        let entry: Entry = [("request", "DELETE /users/7 HTTP/1.0")].into_iter().collect();
        let request = Request::from_entry(&entry, "-").unwrap();
        assert_eq!(request.method.as_deref(), Some("DELETE"));
        assert_eq!(request.path.as_deref(), Some("/users/7"));

        let entry: Entry = [("request", "-")].into_iter().collect();
        assert_eq!(Request::from_entry(&entry, "-"), None);
    }

    #[test]
    fn test_host_of_absolute_uri() {
        let request = Request::parse("GET http://Example.COM:8080/a?b=c HTTP/1.1");
        assert_eq!(request.host().as_deref(), Some("example.com"));
        assert_eq!(Request::parse("GET /a HTTP/1.1").host(), None);
    }

    #[test]
    fn test_details() {
        let request = Request::parse("GET /static/img/Logo.PNG?v=2&q=a%20b HTTP/1.1").with_details();
        let details = request.details.unwrap();
        assert_eq!(details.segments, vec!["static", "img", "Logo.PNG"]);
        assert_eq!(
            details.query,
            vec![("v".to_string(), "2".to_string()), ("q".to_string(), "a b".to_string())]
        );
        assert_eq!(details.extension.as_deref(), Some("png"));

        let details = RequestDetails::parse("/api/users/").unwrap();
        assert_eq!(details.segments, vec!["api", "users"]);
        assert_eq!(details.extension, None);

        let details = RequestDetails::parse("/.env").unwrap();
        assert_eq!(details.extension, None);
    }
}
