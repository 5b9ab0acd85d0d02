//! Turning a raw field map into a typed row with derived index fields.

use crate::catalog::{Catalog, FieldType};
use crate::config::{parse_timezone, Config, IndexKey, SourceMetadata, DEFAULT_PARTITION};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::request::{Request, RequestDetail};
use crate::typed::{canonical_timestamp, type_field_as, TypedValue};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use tracing::debug;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Integer columns a row is invalid without, when present.
const REQUIRED_INTEGERS: &[&str] = &["status", "body_bytes_sent", "bytes_sent"];

/// Index value used when the configured rule yields nothing.
pub const DEFAULT_INDEX: &str = "default";

/// Envelope and indexing fields common to every row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommonFields {
    pub tp_id: String,
    pub tp_source_type: String,
    pub tp_source_name: String,
    pub tp_source_location: String,
    pub tp_ingest_timestamp: DateTime<Utc>,
    pub tp_timestamp: DateTime<Utc>,
    pub tp_date: NaiveDate,
    pub tp_year: i32,
    pub tp_month: u32,
    pub tp_day: u32,
    pub tp_index: String,
    pub tp_partition: String,
    pub tp_source_ip: Option<String>,
    pub tp_ips: Vec<String>,
    pub tp_usernames: Vec<String>,
    pub tp_domains: Vec<String>,
    pub tp_akas: Vec<String>,
    pub tp_tags: Vec<String>,
}

/// One enriched access-log line.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Row {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub common: CommonFields,
    /// Every captured field as written in the log.
    pub fields: BTreeMap<String, String>,
    /// Captured fields with a non-string column type, converted.
    pub typed: BTreeMap<String, TypedValue>,
    pub timestamp: DateTime<FixedOffset>,
    pub time_iso8601: String,
    pub status: Option<i64>,
    pub body_bytes_sent: Option<i64>,
    pub bytes_sent: Option<i64>,
    pub request: Option<Request>,
    pub server_name: Option<String>,
}

impl Row {
    /// A raw field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// A typed field value.
    pub fn typed(&self, name: &str) -> Option<&TypedValue> {
        self.typed.get(name)
    }

    pub fn method(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.method.as_deref())
    }

    pub fn path(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.path.as_deref())
    }

    pub fn http_version(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.http_version.as_deref())
    }
}

/// Builds [`Row`]s from extracted entries.
#[derive(Debug, Clone)]
pub struct Enricher {
    nil: String,
    timezone: Option<Tz>,
    request_detail: RequestDetail,
    index_key: IndexKey,
    partition: String,
}

impl Enricher {
    /// Create an enricher; fails when the configuration does not validate.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            nil: config.nil_value.clone(),
            timezone: config.timezone()?,
            request_detail: config.request_detail,
            index_key: config.index_key.clone(),
            partition: config.partition.clone(),
        })
    }

    /// Type the captured fields and derive the indexing attributes.
    ///
    /// Fails when the row has no usable timestamp, when a required integer
    /// column does not parse, or when the source names an unknown timezone.
    pub fn enrich(&self, entry: Entry, source: &SourceMetadata) -> Result<Row> {
        let nil = self.nil.as_str();
        let (timestamp, _) = canonical_timestamp(&entry, nil)?;
        let timezone = match source.timezone.as_deref() {
            Some(name) => Some(parse_timezone(name)?),
            None => self.timezone,
        };

        let fields: BTreeMap<String, String> = entry
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let typed = self.type_fields(&fields)?;
        let integer = |name: &str| typed.get(name).and_then(TypedValue::as_i64);
        let (status, body_bytes_sent, bytes_sent) =
            (integer("status"), integer("body_bytes_sent"), integer("bytes_sent"));

        let time_iso8601 = entry
            .value("time_iso8601", nil)
            .map(str::to_string)
            .unwrap_or_else(|| timestamp.to_rfc3339());

        let request = Request::from_entry(&entry, nil).map(|r| match self.request_detail {
            RequestDetail::Basic => r,
            RequestDetail::Detailed => r.with_details(),
        });
        let server_name = entry
            .value("server_name", nil)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| source.server_name_override.clone());

        let tp_date = match timezone {
            Some(tz) => timestamp.with_timezone(&tz).date_naive(),
            None => timestamp.date_naive(),
        };
        let tp_domains = domains(&entry, nil, request.as_ref());
        let mut tp_akas = tp_domains.clone();
        if let Some(path) = request.as_ref().and_then(|r| r.path.as_deref()) {
            push_unique(&mut tp_akas, path);
        }

        let common = CommonFields {
            tp_id: Uuid::now_v7().to_string(),
            tp_source_type: DEFAULT_PARTITION.to_string(),
            tp_source_name: source.source_identifier.clone(),
            tp_source_location: source.source_location.clone(),
            tp_ingest_timestamp: Utc::now(),
            tp_timestamp: timestamp.with_timezone(&Utc),
            tp_date,
            tp_year: tp_date.year(),
            tp_month: tp_date.month(),
            tp_day: tp_date.day(),
            tp_index: self.index(source, server_name.as_deref()),
            tp_partition: self.partition.clone(),
            tp_source_ip: entry.value("remote_addr", nil).map(str::to_string),
            tp_ips: ips(&entry, nil),
            tp_usernames: usernames(&entry, nil),
            tp_domains,
            tp_akas,
            tp_tags: tags(request.as_ref(), status),
        };

        Ok(Row {
            common,
            timestamp,
            time_iso8601,
            status,
            body_bytes_sent,
            bytes_sent,
            request,
            server_name,
            typed,
            fields,
        })
    }

    fn type_fields(&self, fields: &BTreeMap<String, String>) -> Result<BTreeMap<String, TypedValue>> {
        let catalog = Catalog::global();
        let mut typed = BTreeMap::new();

        for (name, raw) in fields {
            let field_type = catalog.field_type(name);
            if field_type == FieldType::String || *raw == self.nil {
                continue;
            }
            match type_field_as(name, raw, field_type) {
                Ok(value) => {
                    typed.insert(name.clone(), value);
                }
                Err(e) if REQUIRED_INTEGERS.contains(&name.as_str()) => {
                    return Err(Error::invalid_required_field(name.as_str(), e));
                }
                Err(e) => {
                    debug!(field = %name, value = %raw, error = %e, "leaving field untyped");
                }
            }
        }
        Ok(typed)
    }

    fn index(&self, source: &SourceMetadata, server_name: Option<&str>) -> String {
        let value = match &self.index_key {
            IndexKey::SourceIdentifier => Some(source.source_identifier.as_str()),
            IndexKey::SourceLocation => Some(source.source_location.as_str()),
            IndexKey::FileName => source.file_name(),
            IndexKey::ParentDirectory => source.parent_directory(),
            IndexKey::ServerName => server_name,
            IndexKey::Fixed(value) => Some(value.as_str()),
        };
        value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_INDEX)
            .to_string()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn ips(entry: &Entry, nil: &str) -> Vec<String> {
    let mut ips = Vec::new();
    for name in ["remote_addr", "server_addr"] {
        if let Some(ip) = entry.value(name, nil).and_then(normalize_ip) {
            push_unique(&mut ips, &ip);
        }
    }
    if let Some(upstream) = entry.value("upstream_addr", nil) {
        // "10.0.0.1:80, 10.0.0.2:80 : 10.0.0.3:80"
        for part in upstream.split([',', ' ']).filter(|p| !p.is_empty() && *p != ":") {
            if let Some(ip) = normalize_ip(part) {
                push_unique(&mut ips, &ip);
            }
        }
    }
    ips
}

fn normalize_ip(value: &str) -> Option<String> {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .or_else(|_| value.parse::<SocketAddr>().map(|s| s.ip()))
        .ok()
        .map(|ip| ip.to_string())
}

fn usernames(entry: &Entry, nil: &str) -> Vec<String> {
    entry
        .value("remote_user", nil)
        .filter(|u| !u.is_empty())
        .map(|u| vec![u.to_string()])
        .unwrap_or_default()
}

fn domains(entry: &Entry, nil: &str, request: Option<&Request>) -> Vec<String> {
    let mut domains = Vec::new();
    for name in ["host", "http_host"] {
        if let Some(host) = entry.value(name, nil).and_then(strip_port) {
            push_unique(&mut domains, &host);
        }
    }
    if let Some(host) = request.and_then(Request::host) {
        push_unique(&mut domains, &host);
    }
    domains
}

fn strip_port(host: &str) -> Option<String> {
    let host = host.trim();
    let host = if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or(rest)
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
                name
            }
            _ => host,
        }
    };
    Some(host.to_ascii_lowercase()).filter(|h| !h.is_empty())
}

fn tags(request: Option<&Request>, status: Option<i64>) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(method) = request.and_then(|r| r.method.as_deref()) {
        push_unique(&mut tags, &format!("method:{method}"));
    }
    if let Some(status) = status.filter(|s| *s >= 400) {
        push_unique(&mut tags, "error");
        push_unique(&mut tags, if status >= 500 { "server_error" } else { "client_error" });
    }
    tags
}
