//! # ngxrow - NGINX access logs to typed rows
//!
//! A library that compiles nginx `log_format` templates into line patterns and
//! turns every access-log line into a structured, typed row with derived
//! indexing fields.
//!
//! This library provides functionality to:
//! - Compile nginx log format templates into start-anchored regular expressions
//! - Extract named fields from log lines, honouring the `-` nil sentinel
//! - Type and enrich extracted fields (timestamps, IPs, usernames, domains, tags)
//! - Extract log formats from nginx configuration files
//! - Process line streams without stopping at malformed lines
//!
//! ## Quick Start
//!
//! ```rust
//! use ngxrow::{Config, Reader, SourceMetadata};
//! use std::io::Cursor;
//!
//! let log_data = r#"127.0.0.1 [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200 612"#;
//! let config = Config::default()
//!     .with_log_format(r#"$remote_addr [$time_local] "$request" $status $body_bytes_sent"#);
//! let source = SourceMetadata::new("web-1", "/var/log/nginx/access.log");
//!
//! for row in Reader::new(Cursor::new(log_data), &config, source)? {
//!     let row = row?;
//!     println!("IP: {:?}", row.common.tp_source_ip);
//!     println!("Status: {:?}", row.status);
//!     println!("Date: {}", row.common.tp_date);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Features
//!
//! - **Format Compilation**: catalog-driven capture rules, with every problem in a template reported before any line is read
//! - **Row Enrichment**: canonical timestamp, date partition keys, IP/username/domain lists and status tags
//! - **Nginx Config Integration**: extract log formats directly from nginx configuration files
//! - **Iterator Interface**: process log streams line by line with Rust's iterator patterns
//! - **Error Handling**: comprehensive error types using `thiserror`, classified by [`ErrorKind`]
//! - **Optional Serde Support**: serialize rows and deserialize configuration when the `serde` feature is enabled

pub mod catalog;
pub mod config;
pub mod enrich;
pub mod entry;
pub mod error;
pub mod format;
pub mod nginx;
pub mod pattern;
pub mod processor;
pub mod reader;
pub mod request;
pub mod typed;

// Re-export main types for convenience
pub use catalog::{CaptureRule, Catalog, FieldType, Token};
pub use config::{Config, IndexKey, SourceMetadata};
pub use enrich::{CommonFields, Enricher, Row};
pub use entry::{Entry, Fields};
pub use error::{Error, ErrorKind, LineError, Result};
pub use format::{compile, Format, LogFormat, RegexFormat};
pub use pattern::Pattern;
pub use processor::Processor;
pub use reader::{ReadStats, Reader};
pub use request::{Request, RequestDetail, RequestDetails};
pub use typed::TypedValue;

// Re-export nginx-specific functionality
pub use nginx::{extract_log_format, NginxReader};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_basic_processing() {
        let log_line = r#"127.0.0.1 [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200 612"#;
        let config = Config::default()
            .with_log_format(r#"$remote_addr [$time_local] "$request" $status $body_bytes_sent"#);

        let reader = Reader::new(Cursor::new(log_line), &config, SourceMetadata::default()).unwrap();
        let (rows, errors) = reader.collect_all();

        assert!(errors.is_empty());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];

        assert_eq!(row.field("remote_addr"), Some("127.0.0.1"));
        assert_eq!(row.field("status"), Some("200"));
        assert_eq!(row.status, Some(200));
        assert_eq!(row.body_bytes_sent, Some(612));
        assert_eq!(row.method(), Some("GET"));
    }

    #[test]
    fn test_types_are_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pattern>();
        assert_send_sync::<Enricher>();
        assert_send_sync::<Processor>();
        assert_send_sync::<Catalog>();
    }
}
