//! Processing configuration and per-batch source metadata.

use crate::error::{Error, Result};
use crate::format::LogFormat;
use crate::request::RequestDetail;
use chrono_tz::Tz;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default value of [`Config::partition`] and the row source type.
pub const DEFAULT_PARTITION: &str = "nginx_access_log";

/// Which attribute becomes a row's `tp_index`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IndexKey {
    /// [`SourceMetadata::source_identifier`].
    #[default]
    SourceIdentifier,
    /// [`SourceMetadata::source_location`].
    SourceLocation,
    /// Last path component of the source location.
    FileName,
    /// Name of the directory containing the source location.
    ParentDirectory,
    /// The row's server name.
    ServerName,
    /// The same value for every row.
    Fixed(String),
}

/// Configuration shared by every line of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// A preset name such as `combined`, or a `log_format` template.
    pub log_format: String,
    /// The value nginx writes for an unset variable.
    pub nil_value: String,
    /// IANA timezone the date partition keys are computed in.
    pub timezone: Option<String>,
    pub request_detail: RequestDetail,
    pub index_key: IndexKey,
    pub partition: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_format: "combined".to_string(),
            nil_value: "-".to_string(),
            timezone: None,
            request_detail: RequestDetail::Basic,
            index_key: IndexKey::SourceIdentifier,
            partition: DEFAULT_PARTITION.to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_format(mut self, log_format: impl Into<String>) -> Self {
        self.log_format = log_format.into();
        self
    }

    pub fn with_nil_value(mut self, nil_value: impl Into<String>) -> Self {
        self.nil_value = nil_value.into();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn with_request_detail(mut self, detail: RequestDetail) -> Self {
        self.request_detail = detail;
        self
    }

    pub fn with_index_key(mut self, index_key: IndexKey) -> Self {
        self.index_key = index_key;
        self
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Check the configuration before any line is processed.
    ///
    /// ```rust
    /// use ngxrow::Config;
    ///
    /// assert!(Config::default().validate().is_ok());
    /// assert!(Config::default().with_log_format("  ").validate().is_err());
    /// assert!(Config::default().with_timezone("Mars/Olympus").validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.log_format.trim().is_empty() {
            return Err(Error::invalid_config("log_format must not be empty"));
        }
        if self.partition.trim().is_empty() {
            return Err(Error::invalid_config("partition must not be empty"));
        }
        self.timezone()?;
        Ok(())
    }

    /// The configured log format, resolving preset names.
    pub fn log_format(&self) -> LogFormat {
        LogFormat::resolve(&self.log_format)
    }

    /// The configured timezone, if any.
    pub fn timezone(&self) -> Result<Option<Tz>> {
        self.timezone.as_deref().map(parse_timezone).transpose()
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>().map_err(|_| Error::unknown_timezone(name))
}

/// Describes where a batch of lines came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SourceMetadata {
    /// Stable identifier of the source, e.g. an artifact name.
    pub source_identifier: String,
    /// Path or URL the lines were read from.
    pub source_location: String,
    /// Overrides [`Config::timezone`] for this source.
    pub timezone: Option<String>,
    /// Used when the lines do not carry `$server_name`.
    pub server_name_override: Option<String>,
}

impl SourceMetadata {
    pub fn new(source_identifier: impl Into<String>, source_location: impl Into<String>) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            source_location: source_location.into(),
            ..Self::default()
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name_override = Some(server_name.into());
        self
    }

    /// The last component of the source location.
    pub fn file_name(&self) -> Option<&str> {
        path_components(&self.source_location).last().copied()
    }

    /// The directory component directly above the file name.
    pub fn parent_directory(&self) -> Option<&str> {
        let components = path_components(&self.source_location);
        components.len().checked_sub(2).map(|i| components[i])
    }
}

fn path_components(location: &str) -> Vec<&str> {
    location
        .split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .collect()
}
