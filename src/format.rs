//! Log format templates and their compilation into line patterns.
//!
//! A template such as `$remote_addr [$time_local] "$request"` is split into
//! literal spans and `$token` references. Literal spans are escaped and
//! matched verbatim; each token is replaced by the capture rule the
//! [`Catalog`] assigns to it. The result is anchored at the start of the
//! line only, so trailing content the format does not model is tolerated.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::pattern::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// The nginx predefined `combined` format.
pub const COMBINED: &str = r#"$remote_addr - $remote_user [$time_local] "$request" $status $body_bytes_sent "$http_referer" "$http_user_agent""#;

const PRESETS: &[(&str, &str)] = &[("combined", COMBINED)];

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\w+)").expect("token pattern is valid"));

/// Something that can be compiled into a line [`Pattern`].
pub trait Format {
    /// The source text of the format.
    fn layout(&self) -> &str;

    /// Compile the format into a reusable pattern.
    fn compile(&self) -> Result<Pattern>;
}

/// An nginx `log_format` template made of literal text and `$token`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFormat {
    name: Option<String>,
    layout: String,
}

impl LogFormat {
    /// Create a format from a template string.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ngxrow::{Format, LogFormat};
    ///
    /// let pattern = LogFormat::new(r#"$remote_addr [$time_local] "$request" $status"#).compile()?;
    /// assert!(pattern.fields().iter().any(|f| f == "request_uri"));
    /// # Ok::<(), ngxrow::Error>(())
    /// ```
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            name: None,
            layout: layout.into(),
        }
    }

    /// Create a named format, as declared by an nginx `log_format` directive.
    pub fn named(name: impl Into<String>, layout: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            layout: layout.into(),
        }
    }

    /// The nginx `combined` format.
    pub fn combined() -> Self {
        Self::named("combined", COMBINED)
    }

    /// Look up a predefined format by name.
    pub fn preset(name: &str) -> Result<Self> {
        PRESETS
            .iter()
            .find(|(preset, _)| *preset == name)
            .map(|(preset, layout)| Self::named(*preset, *layout))
            .ok_or_else(|| Error::unknown_preset(name))
    }

    /// Interpret a configured value as a preset name or, failing that, a
    /// template.
    pub fn resolve(value: &str) -> Self {
        Self::preset(value.trim()).unwrap_or_else(|_| Self::new(value))
    }

    /// The format name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::combined()
    }
}

impl Format for LogFormat {
    fn layout(&self) -> &str {
        &self.layout
    }

    fn compile(&self) -> Result<Pattern> {
        compile_with(&self.layout, Catalog::global())
    }
}

/// A format given directly as a regular expression with named groups.
///
/// Group names become field names as-is; nothing is checked against the
/// token catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexFormat {
    pattern: String,
}

impl RegexFormat {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl Format for RegexFormat {
    fn layout(&self) -> &str {
        &self.pattern
    }

    fn compile(&self) -> Result<Pattern> {
        if self.pattern.trim().is_empty() {
            return Err(Error::EmptyTemplate);
        }
        let regex =
            Regex::new(&self.pattern).map_err(|e| Error::invalid_format(&self.pattern, e))?;
        let fields = regex
            .capture_names()
            .flatten()
            .map(str::to_string)
            .collect();
        Ok(Pattern::new(&self.pattern, regex, fields))
    }
}

/// Compile a template against the global catalog.
pub fn compile(template: &str) -> Result<Pattern> {
    compile_with(template, Catalog::global())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Token(&'a str),
}

/// Compile a template against a specific catalog.
///
/// Validation runs before any pattern text is assembled: adjacent tokens
/// are rejected first, then every unknown token is reported in one error,
/// then fields bound twice are rejected.
pub fn compile_with(template: &str, catalog: &Catalog) -> Result<Pattern> {
    if template.trim().is_empty() {
        return Err(Error::EmptyTemplate);
    }

    let segments = split_template(template)?;

    let mut unknown: Vec<String> = Vec::new();
    for segment in &segments {
        if let Segment::Token(name) = *segment {
            if catalog.lookup(name).is_none() && !unknown.iter().any(|u| u == name) {
                unknown.push(name.to_string());
            }
        }
    }
    if !unknown.is_empty() {
        return Err(Error::unsupported_tokens(unknown));
    }

    let mut pattern = String::from("^");
    let mut fields = Vec::new();
    let mut seen = HashSet::new();
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
            Segment::Token(name) => {
                let token = catalog
                    .lookup(name)
                    .ok_or_else(|| Error::unsupported_tokens(vec![name.to_string()]))?;
                for field in token.rule.fields(name) {
                    if !seen.insert(field) {
                        return Err(Error::duplicate_field(field));
                    }
                    fields.push(field.to_string());
                }
                pattern.push_str(&token.rule.render(name, i == last));
            }
        }
    }

    let regex = Regex::new(&pattern).map_err(|e| Error::invalid_format(template, e))?;
    debug!(layout = template, pattern = %pattern, fields = fields.len(), "compiled log format");

    Ok(Pattern::new(template, regex, fields))
}

/// Split a template into literal and token segments.
///
/// Fails on the first pair of tokens with nothing between them, since no
/// capture rule can tell where one ends and the next begins.
fn split_template(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut last_end = 0;
    let mut previous: Option<&str> = None;

    for captures in TOKEN_PATTERN.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        if whole.start() == last_end {
            if let Some(prev) = previous {
                return Err(Error::adjacent_tokens(prev, name.as_str()));
            }
        }

        if whole.start() > last_end {
            segments.push(Segment::Literal(&template[last_end..whole.start()]));
        }
        segments.push(Segment::Token(name.as_str()));

        previous = Some(name.as_str());
        last_end = whole.end();
    }

    if last_end < template.len() {
        segments.push(Segment::Literal(&template[last_end..]));
    }

    Ok(segments)
}
