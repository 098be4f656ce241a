use crate::span::Origin;

use ariadne::{Color, ColorGenerator, Config as ReportConfig, IndexType, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};

use std::fmt::{self, Display, Formatter};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &str, origin: Origin, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            code: code.to_string(),
            message: message.into(),
            origin,
            note: None,
        }
    }

    pub fn warning(code: &str, origin: Origin, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, origin, message)
    }

    pub fn error(code: &str, origin: Origin, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, origin, message)
    }

    pub fn fatal(code: &str, origin: Origin, message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, code, origin, message)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {}: {}",
            self.severity, self.code, self.origin, self.message
        )
    }
}

/// Highest severity present, if any.
pub fn worst(diagnostics: &[Diagnostic]) -> Option<Severity> {
    diagnostics.iter().map(|d| d.severity).max()
}

pub fn count_at_least(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity >= severity).count()
}

fn report_kind<'a>(severity: Severity) -> ReportKind<'a> {
    match severity {
        Severity::Warning => ReportKind::Warning,
        Severity::Error => ReportKind::Error,
        Severity::Fatal => ReportKind::Custom("Fatal", Color::Red),
    }
}

fn to_report<'a>(
    file: &str,
    diagnostic: &Diagnostic,
    color: bool,
) -> Report<'a, (String, Range<usize>)> {
    let span = (file.to_string(), diagnostic.origin.range());

    let mut report = Report::build(report_kind(diagnostic.severity), span.clone())
        .with_config(
            ReportConfig::default()
                .with_index_type(IndexType::Byte)
                .with_color(color),
        )
        .with_code(&diagnostic.code)
        .with_message(&diagnostic.message)
        .with_label(
            Label::new(span)
                .with_message(&diagnostic.message)
                .with_color(ColorGenerator::new().next()),
        );
    if let Some(note) = &diagnostic.note {
        report = report.with_note(note);
    }
    report.finish()
}

/// Renders diagnostics the way the CLI prints them. `color` is off for
/// snapshots and piped output.
pub fn render(file: &str, source: &str, diagnostics: &[Diagnostic], color: bool) -> String {
    let mut out = Vec::new();
    for diagnostic in diagnostics {
        let written = to_report(file, diagnostic, color)
            .write((file.to_string(), Source::from(source.to_string())), &mut out);
        if written.is_err() {
            // ariadne only fails when the span falls outside the source.
            out.extend_from_slice(format!("{diagnostic}\n").as_bytes());
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Prints every diagnostic to stderr. Returns true when at least one of them
/// is an error or worse.
pub fn report_errors(file: &str, source: &str, diagnostics: &[Diagnostic]) -> bool {
    eprint!("{}", render(file, source, diagnostics, true));
    count_at_least(diagnostics, Severity::Error) > 0
}
