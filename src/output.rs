//! Result reporting.
//!
//! Text mode streams one line per noteworthy result and finishes with a
//! summary block; JSON mode buffers everything and emits a single document at
//! flush so the output stays parseable even with many workers producing.

use std::io::{self, Write};

use serde_json::json;

use crate::cli::VerbosityLevel;
use crate::error::Result;
use crate::pipeline::{CheckResult, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Summary {
    pub valid: usize,
    pub invalid: usize,
    pub errors: usize,
    pub skipped: usize,
    pub empty: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.valid + self.invalid + self.errors + self.skipped + self.empty
    }
}

/// Formats validation results for the operator. Owned by the aggregator, so
/// all writes are single-threaded.
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_summary: bool,
    show_colors: bool,
    summary: Summary,
    buffered: Vec<serde_json::Value>,
    sink: Box<dyn Write + Send>,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel, show_summary: bool) -> Self {
        Self {
            format,
            verbosity,
            show_summary,
            show_colors: atty::is(atty::Stream::Stdout) && format == OutputFormat::Text,
            summary: Summary::default(),
            buffered: Vec::new(),
            sink: Box::new(io::stdout()),
        }
    }

    /// An output that counts results but writes nothing.
    pub fn quiet() -> Self {
        Self {
            format: OutputFormat::Text,
            verbosity: VerbosityLevel::Quiet,
            show_summary: false,
            show_colors: false,
            summary: Summary::default(),
            buffered: Vec::new(),
            sink: Box::new(io::sink()),
        }
    }

    #[cfg(test)]
    fn buffered_text(verbosity: VerbosityLevel, show_summary: bool) -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let output = Self {
            format: OutputFormat::Text,
            verbosity,
            show_summary,
            show_colors: false,
            summary: Summary::default(),
            buffered: Vec::new(),
            sink: Box::new(buffer.clone()),
        };
        (output, buffer)
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    pub fn write(&mut self, result: &CheckResult) -> Result<()> {
        match result.status {
            Status::Valid => self.summary.valid += 1,
            Status::Invalid { .. } => self.summary.invalid += 1,
            Status::Error { .. } => self.summary.errors += 1,
            Status::Skipped { .. } => self.summary.skipped += 1,
            Status::Empty => self.summary.empty += 1,
        }

        match self.format {
            OutputFormat::Text => self.write_text(result),
            OutputFormat::Json => {
                self.buffered.push(result_to_json(result));
                Ok(())
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                if self.show_summary {
                    let block = self.format_summary();
                    self.sink.write_all(block.as_bytes())?;
                }
            }
            OutputFormat::Json => {
                let document = json!({
                    "resources": std::mem::take(&mut self.buffered),
                    "summary": {
                        "valid": self.summary.valid,
                        "invalid": self.summary.invalid,
                        "errors": self.summary.errors,
                        "skipped": self.summary.skipped,
                        "empty": self.summary.empty,
                    },
                });
                serde_json::to_writer_pretty(&mut self.sink, &document)
                    .map_err(io::Error::other)?;
                writeln!(self.sink)?;
            }
        }
        self.sink.flush()?;
        Ok(())
    }

    fn write_text(&mut self, result: &CheckResult) -> Result<()> {
        // Normal mode reports only problems; verbose reports everything.
        let noteworthy = matches!(result.status, Status::Invalid { .. } | Status::Error { .. });
        if self.verbosity == VerbosityLevel::Quiet
            || (!noteworthy && self.verbosity < VerbosityLevel::Verbose)
        {
            return Ok(());
        }

        let line = self.format_result(result);
        writeln!(self.sink, "{}", line)?;
        Ok(())
    }

    fn format_result(&self, result: &CheckResult) -> String {
        let subject = match &result.signature {
            Some(sig) if !sig.kind.is_empty() => {
                let mut subject = format!("{} - {}", result.source, sig.kind);
                if !sig.name.is_empty() {
                    subject.push(' ');
                    if !sig.namespace.is_empty() {
                        subject.push_str(&sig.namespace);
                        subject.push('/');
                    }
                    subject.push_str(&sig.name);
                }
                subject
            }
            _ => result.source.clone(),
        };

        match &result.status {
            Status::Valid => {
                format!("{}  {}", self.colorize("✓ VALID", "32"), subject)
            }
            Status::Invalid { violations } => {
                let mut line = format!(
                    "{}  {} - {} violation{}",
                    self.colorize("✗ INVALID", "31"),
                    subject,
                    violations.len(),
                    if violations.len() == 1 { "" } else { "s" }
                );
                if self.verbosity >= VerbosityLevel::Verbose {
                    for violation in violations {
                        line.push_str(&format!("\n    {}", violation));
                    }
                }
                line
            }
            Status::Error { message } => {
                format!("{}  {} - {}", self.colorize("⚠ ERROR", "33"), subject, message)
            }
            Status::Skipped { reason } => {
                format!("{}  {} - {}", self.colorize("- SKIPPED", "36"), subject, reason)
            }
            Status::Empty => {
                format!("{}  {} - no kind", self.colorize("- EMPTY", "36"), subject)
            }
        }
    }

    fn format_summary(&self) -> String {
        let mut output = String::new();
        output.push_str("Summary:\n");
        output.push_str(&format!("  Total resources: {}\n", self.summary.total()));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", "32"),
            self.summary.valid
        ));

        if self.summary.invalid > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Invalid:", "31"),
                self.summary.invalid
            ));
        }
        if self.summary.errors > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                self.summary.errors
            ));
        }
        if self.summary.skipped > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                self.summary.skipped
            ));
        }
        if self.summary.empty > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Empty:", "36"),
                self.summary.empty
            ));
        }

        output
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }
}

fn result_to_json(result: &CheckResult) -> serde_json::Value {
    let (status, detail) = match &result.status {
        Status::Valid => ("valid", json!(null)),
        Status::Invalid { violations } => (
            "invalid",
            json!(violations
                .iter()
                .map(|v| json!({ "path": v.instance_path, "message": v.message }))
                .collect::<Vec<_>>()),
        ),
        Status::Error { message } => ("error", json!(message)),
        Status::Skipped { reason } => ("skipped", json!(reason)),
        Status::Empty => ("empty", json!(null)),
    };

    json!({
        "source": result.source,
        "kind": result.signature.as_ref().map(|s| s.kind.clone()),
        "name": result.signature.as_ref().map(|s| s.name.clone()),
        "namespace": result.signature.as_ref().map(|s| s.namespace.clone()),
        "version": result.signature.as_ref().map(|s| s.version.clone()),
        "status": status,
        "detail": detail,
    })
}

#[cfg(test)]
use std::sync::{Arc, Mutex};

#[cfg(test)]
#[derive(Default, Clone)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Signature;
    use crate::schema::Violation;

    fn valid_result() -> CheckResult {
        CheckResult {
            source: "deploy.yaml".to_string(),
            signature: Some(Signature {
                kind: "Deployment".to_string(),
                version: "apps/v1".to_string(),
                name: "web".to_string(),
                namespace: "prod".to_string(),
            }),
            status: Status::Valid,
        }
    }

    fn invalid_result() -> CheckResult {
        CheckResult {
            source: "deploy.yaml".to_string(),
            signature: Some(Signature {
                kind: "Deployment".to_string(),
                version: "apps/v1".to_string(),
                name: "web".to_string(),
                namespace: String::new(),
            }),
            status: Status::Invalid {
                violations: vec![Violation {
                    instance_path: "/spec/replicas".to_string(),
                    message: "\"three\" is not of type \"integer\"".to_string(),
                }],
            },
        }
    }

    #[test]
    fn test_normal_mode_reports_only_problems() {
        let (mut output, buffer) = Output::buffered_text(VerbosityLevel::Normal, false);
        output.write(&valid_result()).unwrap();
        output.write(&invalid_result()).unwrap();
        output.flush().unwrap();

        let text = buffer.contents();
        assert!(!text.contains("VALID"));
        assert!(text.contains("INVALID"));
        assert!(text.contains("deploy.yaml - Deployment web"));
    }

    #[test]
    fn test_verbose_mode_reports_everything_with_detail() {
        let (mut output, buffer) = Output::buffered_text(VerbosityLevel::Verbose, false);
        output.write(&valid_result()).unwrap();
        output.write(&invalid_result()).unwrap();
        output.flush().unwrap();

        let text = buffer.contents();
        assert!(text.contains("✓ VALID  deploy.yaml - Deployment prod/web"));
        assert!(text.contains("/spec/replicas"));
    }

    #[test]
    fn test_summary_counts() {
        let (mut output, buffer) = Output::buffered_text(VerbosityLevel::Quiet, true);
        output.write(&valid_result()).unwrap();
        output.write(&valid_result()).unwrap();
        output.write(&invalid_result()).unwrap();
        output.flush().unwrap();

        assert_eq!(output.summary().valid, 2);
        assert_eq!(output.summary().invalid, 1);
        assert_eq!(output.summary().total(), 3);

        let text = buffer.contents();
        assert!(text.contains("Total resources: 3"));
        assert!(text.contains("Valid: 2"));
        assert!(text.contains("Invalid: 1"));
    }

    #[test]
    fn test_json_output_is_one_document() {
        let buffer = SharedBuffer::default();
        let mut output = Output {
            format: OutputFormat::Json,
            verbosity: VerbosityLevel::Normal,
            show_summary: false,
            show_colors: false,
            summary: Summary::default(),
            buffered: Vec::new(),
            sink: Box::new(buffer.clone()),
        };
        output.write(&valid_result()).unwrap();
        output.write(&invalid_result()).unwrap();
        output.flush().unwrap();

        let document: serde_json::Value = serde_json::from_str(&buffer.contents()).unwrap();
        assert_eq!(document["resources"].as_array().unwrap().len(), 2);
        assert_eq!(document["resources"][0]["status"], "valid");
        assert_eq!(document["resources"][1]["status"], "invalid");
        assert_eq!(document["summary"]["valid"], 1);
        assert_eq!(document["summary"]["invalid"], 1);
    }
}
