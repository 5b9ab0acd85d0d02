//! Basic usage example for the ngxrow library.
//!
//! This example demonstrates how to turn nginx access-log lines into enriched
//! rows, how to take the log format from an nginx configuration file, and how
//! per-line failures are reported. Run with `RUST_LOG=ngxrow=debug` to see the
//! library's own logging.

use ngxrow::{Config, ErrorKind, NginxReader, Processor, Reader, RequestDetail, SourceMetadata};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ngxrow=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== ngxrow Basic Usage Example ===\n");

    // Example 1: One line in the default combined format
    single_line_example()?;

    // Example 2: Nginx configuration parsing
    nginx_config_example()?;

    // Example 3: Processing multiple log lines
    multiple_lines_example()?;

    // Example 4: Error handling
    error_handling_example();

    Ok(())
}

/// Example 1: Enrich one line using the default `combined` format
fn single_line_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("1. Single Line");
    println!("--------------");

    let log_line = r#"127.0.0.1 - alice [08/Nov/2013:13:39:18 +0000] "GET http://shop.example.com/cart?id=7 HTTP/1.1" 404 612 "-" "curl/7.64.1""#;
    println!("Log line: {log_line}\n");

    let config = Config::default()
        .with_timezone("Europe/Berlin")
        .with_request_detail(RequestDetail::Detailed);
    let processor = Processor::new(&config)?;
    let source = SourceMetadata::new("shop-1", "/var/log/nginx/access.log");

    let row = processor.process(log_line, &source)?;

    println!("Fields:");
    for (name, value) in &row.fields {
        println!("  {name:<16} {value}");
    }
    println!("Derived:");
    println!("  tp_id          {}", row.common.tp_id);
    println!("  tp_timestamp   {}", row.common.tp_timestamp);
    println!("  tp_date        {}", row.common.tp_date);
    println!("  tp_ips         {:?}", row.common.tp_ips);
    println!("  tp_usernames   {:?}", row.common.tp_usernames);
    println!("  tp_domains     {:?}", row.common.tp_domains);
    println!("  tp_akas        {:?}", row.common.tp_akas);
    println!("  tp_tags        {:?}", row.common.tp_tags);
    if let Some(details) = row.request.as_ref().and_then(|r| r.details.as_ref()) {
        println!("  path segments  {:?}", details.segments);
        println!("  query          {:?}", details.query);
    }

    println!("\n");
    Ok(())
}

/// Example 2: Extracting the log format from nginx configuration
fn nginx_config_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("2. Nginx Configuration Parsing");
    println!("------------------------------");

    let nginx_config = r#"
    http {
        log_format main '$remote_addr - $remote_user [$time_local] "$request" '
                        '$status $body_bytes_sent "$http_referer" '
                        '"$http_user_agent" $request_time';

        log_format simple '$remote_addr [$time_local] "$request" $status';

        access_log /var/log/nginx/access.log main;
    }
    "#;

    let log_line = r#"192.168.1.100 - john [09/Nov/2013:14:22:33 +0000] "POST /api/login HTTP/1.1" 201 45 "https://example.com/login" "Mozilla/5.0" 0.042"#;

    println!("Nginx config contains 'main' and 'simple' log formats");
    println!("Log line: {log_line}\n");

    let reader = NginxReader::new(
        Cursor::new(log_line),
        Cursor::new(nginx_config),
        "main",
        &Config::default(),
        SourceMetadata::new("api", "/var/log/nginx/access.log"),
    )?;

    for row in reader {
        let row = row?;
        println!("Parsed using 'main' format:");
        println!("  Method:        {:?}", row.method());
        println!("  Path:          {:?}", row.path());
        println!("  Status:        {:?}", row.status);
        println!("  Request time:  {:?}", row.typed("request_time"));
        println!("  Usernames:     {:?}", row.common.tp_usernames);
    }

    println!("\n");
    Ok(())
}

/// Example 3: Processing multiple log lines
fn multiple_lines_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("3. Processing Multiple Log Lines");
    println!("--------------------------------");

    let log_data = r#"127.0.0.1 [08/Nov/2013:13:39:18 +0000] "GET /api/users HTTP/1.1" 200 1024
192.168.1.1 [08/Nov/2013:13:40:22 +0000] "POST /api/users HTTP/1.1" 201 256
10.0.0.1 [08/Nov/2013:13:41:15 +0000] "GET /api/users/123 HTTP/1.1" 200 512
172.16.0.1 [08/Nov/2013:13:42:33 +0000] "DELETE /api/users/456 HTTP/1.1" 503 0"#;

    let config = Config::default()
        .with_log_format(r#"$remote_addr [$time_local] "$request" $status $body_bytes_sent"#);
    let mut reader = Reader::new(Cursor::new(log_data), &config, SourceMetadata::default())?;

    let mut total_bytes = 0i64;
    let mut status_counts = BTreeMap::new();

    let stats = reader.process_rows(|row| -> ngxrow::Result<()> {
        total_bytes += row.body_bytes_sent.unwrap_or(0);
        *status_counts.entry(row.status.unwrap_or(0)).or_insert(0) += 1;
        println!(
            "  {:<12} {:<6} {:<18} tags={:?}",
            row.common.tp_source_ip.as_deref().unwrap_or("-"),
            row.method().unwrap_or("-"),
            row.path().unwrap_or("-"),
            row.common.tp_tags
        );
        Ok(())
    })?;

    println!();
    println!("Statistics:");
    println!("  Rows:          {}", stats.rows);
    println!("  Skipped:       {}", stats.skipped);
    println!("  Total bytes:   {total_bytes}");
    println!("  Status codes:");
    for (status, count) in status_counts {
        println!("    {status}: {count} times");
    }

    println!("\n");
    Ok(())
}

/// Example 4: Error handling scenarios
fn error_handling_example() {
    println!("4. Error Handling");
    println!("-----------------");

    println!("4a. Templates that cannot be compiled:");
    for template in ["$remote_addr$status", "$remote_usr [$time_local] $foo"] {
        match ngxrow::compile(template) {
            Ok(_) => println!("  Unexpected success"),
            Err(e) => println!("  {template:<32} -> {e}"),
        }
    }

    println!("\n4b. Lines that are skipped:");
    let log_data = "garbage\n\
                    127.0.0.1 - - [yesterday] \"GET / HTTP/1.1\" 200 0 \"-\" \"-\"\n\
                    127.0.0.1 - - [08/Nov/2013:13:39:18 +0000] \"GET / HTTP/1.1\" 2OO 0 \"-\" \"-\"\n";

    match Reader::new(Cursor::new(log_data), &Config::default(), SourceMetadata::default()) {
        Ok(reader) => {
            let (_, errors) = reader.collect_all();
            for e in errors {
                let kind = match e.kind() {
                    ErrorKind::NoMatch => "no match",
                    ErrorKind::RowValidation => "invalid row",
                    _ => "other",
                };
                println!("  line {} ({kind}): {}", e.line_number, e.error);
            }
        }
        Err(e) => println!("  Unexpected error: {e}"),
    }

    println!("\n");
}
