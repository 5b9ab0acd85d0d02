//! The catalog of nginx variables a log format may reference.

use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashMap;

/// How a token is turned into capture groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRule {
    /// Any run of non-space characters, bound to the token's own name.
    Default,
    /// A fixed group body bound to the token's own name.
    Custom(&'static str),
    /// Free text up to the next literal in the template.
    ///
    /// Renders lazily (`.*?`) when a literal follows, greedily (`.*`) when
    /// the token ends the template.
    Text,
    /// A fixed sub-pattern binding several named groups.
    Composite {
        pattern: &'static str,
        fields: &'static [&'static str],
    },
}

impl CaptureRule {
    /// Render the rule as pattern text for the token `name`.
    ///
    /// `terminal` is true when nothing follows the token in the template.
    pub fn render(&self, name: &str, terminal: bool) -> Cow<'static, str> {
        match self {
            Self::Default => Cow::Owned(format!("(?P<{name}>[^ ]*)")),
            Self::Custom(body) => Cow::Owned(format!("(?P<{name}>{body})")),
            Self::Text if terminal => Cow::Owned(format!("(?P<{name}>.*)")),
            Self::Text => Cow::Owned(format!("(?P<{name}>.*?)")),
            Self::Composite { pattern, .. } => Cow::Borrowed(*pattern),
        }
    }

    /// The field names this rule binds for the token `name`.
    pub fn fields<'a>(&self, name: &'a str) -> Vec<&'a str> {
        match self {
            Self::Composite { fields, .. } => fields.to_vec(),
            _ => vec![name],
        }
    }
}

/// The column type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    String,
    Integer,
    Float,
    Timestamp,
}

/// A recognized nginx variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub name: &'static str,
    pub rule: CaptureRule,
    pub field_type: FieldType,
    pub description: &'static str,
}

const REQUEST_PATTERN: &str = r"(?P<request_method>\S+)?(?: +(?P<request_uri>[^ ]+))?(?: +(?P<server_protocol>\S+))?";

const REQUEST_FIELDS: &[&str] = &["request_method", "request_uri", "server_protocol"];

macro_rules! token {
    ($name:literal, $rule:expr, $ty:ident, $desc:literal) => {
        Token {
            name: $name,
            rule: $rule,
            field_type: FieldType::$ty,
            description: $desc,
        }
    };
}

use CaptureRule as Rule;

static TOKENS: &[Token] = &[
    token!("remote_addr", Rule::Default, String, "Client IP address"),
    token!("host", Rule::Default, String, "Hostname from the 'Host' request header, or the server name matching the request"),
    token!("remote_user", Rule::Default, String, "Authenticated user name"),
    token!("time_local", Rule::Custom(r"[^\]]*"), Timestamp, "Local time in Common Log Format"),
    token!("time_iso8601", Rule::Default, Timestamp, "Local time in ISO 8601 format"),
    token!(
        "request",
        Rule::Composite {
            pattern: REQUEST_PATTERN,
            fields: REQUEST_FIELDS,
        },
        String,
        "Full original request line"
    ),
    token!("request_method", Rule::Custom(r"\S+"), String, "Request method (GET, POST, etc.)"),
    token!("request_uri", Rule::Text, String, "Full original request URI, including arguments"),
    token!("server_protocol", Rule::Custom(r"\S+"), String, "Protocol used in the request (e.g. 'HTTP/1.1')"),
    token!("status", Rule::Default, Integer, "Response status code"),
    token!("body_bytes_sent", Rule::Default, Integer, "Number of bytes sent to the client, excluding headers"),
    token!("http_referer", Rule::Text, String, "Value of the 'Referer' request header"),
    token!("http_user_agent", Rule::Text, String, "Value of the 'User-Agent' request header"),
    token!("scheme", Rule::Default, String, "Request scheme (http or https)"),
    token!("http_host", Rule::Default, String, "Value of the 'Host' request header"),
    token!("http_cookie", Rule::Default, String, "Value of the 'Cookie' request header"),
    token!("content_length", Rule::Default, Integer, "Value of the 'Content-Length' request header"),
    token!("content_type", Rule::Default, String, "Value of the 'Content-Type' request header"),
    token!("request_length", Rule::Default, Integer, "Length of the request (including request line, headers, and body)"),
    token!("server_name", Rule::Default, String, "Name of the server handling the request"),
    token!("server_addr", Rule::Default, String, "Server address"),
    token!("server_port", Rule::Default, Integer, "Port on which the request was received"),
    token!("connection", Rule::Default, String, "Connection serial number"),
    token!("connection_requests", Rule::Default, Integer, "Number of requests made through this connection"),
    token!("msec", Rule::Default, Float, "Current time in seconds with milliseconds resolution"),
    token!("bytes_sent", Rule::Default, Integer, "Total number of bytes sent to the client"),
    token!("request_time", Rule::Default, Float, "Time spent processing the request, in seconds with milliseconds resolution"),
    token!("pipe", Rule::Default, String, "Indicates if the request was pipelined (p) or not (.)"),
    token!("upstream_addr", Rule::Default, String, "Address of the upstream server handling the request"),
    token!("upstream_status", Rule::Default, Integer, "Status code returned by the upstream server"),
    token!("upstream_response_time", Rule::Default, Float, "Time between establishing a connection and receiving the last byte of the response body from the upstream server"),
    token!("upstream_connect_time", Rule::Default, Float, "Time spent establishing a connection with the upstream server"),
    token!("upstream_header_time", Rule::Default, Float, "Time between establishing a connection and receiving the first byte of the response header from the upstream server"),
    token!("ssl_protocol", Rule::Default, String, "SSL protocol used"),
    token!("ssl_cipher", Rule::Default, String, "SSL cipher used"),
    token!("ssl_session_id", Rule::Default, String, "SSL session identifier"),
    token!("ssl_client_cert", Rule::Default, String, "Client certificate in PEM format"),
    token!("ssl_session_reused", Rule::Default, String, "Whether the SSL session was reused (r) or not (.)"),
    token!("gzip_ratio", Rule::Default, Float, "Compression ratio achieved by gzip"),
];

static GLOBAL: Lazy<Catalog> = Lazy::new(|| Catalog::from_tokens(TOKENS));

/// Immutable lookup table of supported tokens.
#[derive(Debug)]
pub struct Catalog {
    tokens: HashMap<&'static str, &'static Token>,
}

impl Catalog {
    fn from_tokens(tokens: &'static [Token]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| (t.name, t)).collect(),
        }
    }

    /// The process-wide catalog of nginx variables.
    pub fn global() -> &'static Catalog {
        &GLOBAL
    }

    /// Look up a token by name, without the leading `$`.
    pub fn lookup(&self, name: &str) -> Option<&'static Token> {
        self.tokens.get(name).copied()
    }

    /// The column type of a field name.
    ///
    /// Composite sub-fields are tokens in their own right, so every field a
    /// compiled pattern can bind resolves here. Unknown names are strings.
    pub fn field_type(&self, field: &str) -> FieldType {
        self.lookup(field)
            .map(|t| t.field_type)
            .unwrap_or(FieldType::String)
    }

    /// Iterate over all tokens in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'static Token> {
        TOKENS.iter()
    }

    /// Number of tokens in the catalog.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check whether the catalog has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCABULARY: &[&str] = &[
        "remote_addr", "host", "remote_user", "time_local", "time_iso8601", "request",
        "request_method", "request_uri", "server_protocol", "status", "body_bytes_sent",
        "http_referer", "http_user_agent", "scheme", "http_host", "http_cookie",
        "content_length", "content_type", "request_length", "server_name", "server_addr",
        "server_port", "connection", "connection_requests", "msec", "bytes_sent",
        "request_time", "pipe", "upstream_addr", "upstream_status", "upstream_response_time",
        "upstream_connect_time", "upstream_header_time", "ssl_protocol", "ssl_cipher",
        "ssl_session_id", "ssl_client_cert", "ssl_session_reused", "gzip_ratio",
    ];

    #[test]
    fn test_vocabulary_is_complete() {
        let catalog = Catalog::global();
        for name in VOCABULARY {
            assert!(catalog.lookup(name).is_some(), "missing token {name}");
        }
        assert_eq!(catalog.len(), VOCABULARY.len());
    }

    #[test]
    fn test_unknown_token() {
        assert!(Catalog::global().lookup("remote_usr").is_none());
        assert!(Catalog::global().lookup("$remote_addr").is_none());
    }

    #[test]
    fn test_render_rules() {
        let catalog = Catalog::global();
        let render = |name: &str, terminal: bool| {
            catalog.lookup(name).unwrap().rule.render(name, terminal).into_owned()
        };

        assert_eq!(render("remote_addr", false), "(?P<remote_addr>[^ ]*)");
        assert_eq!(render("time_local", false), r"(?P<time_local>[^\]]*)");
        assert_eq!(render("http_referer", false), "(?P<http_referer>.*?)");
        assert_eq!(render("http_user_agent", true), "(?P<http_user_agent>.*)");
        assert_eq!(render("request", false), REQUEST_PATTERN);
    }

    #[test]
    fn test_composite_fields() {
        let token = Catalog::global().lookup("request").unwrap();
        assert_eq!(
            token.rule.fields("request"),
            vec!["request_method", "request_uri", "server_protocol"]
        );
        let token = Catalog::global().lookup("status").unwrap();
        assert_eq!(token.rule.fields("status"), vec!["status"]);
    }

    #[test]
    fn test_field_types() {
        let catalog = Catalog::global();
        assert_eq!(catalog.field_type("status"), FieldType::Integer);
        assert_eq!(catalog.field_type("request_time"), FieldType::Float);
        assert_eq!(catalog.field_type("time_iso8601"), FieldType::Timestamp);
        assert_eq!(catalog.field_type("request_uri"), FieldType::String);
        assert_eq!(catalog.field_type("not_a_token"), FieldType::String);
    }
}
