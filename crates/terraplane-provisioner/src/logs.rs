// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Log classification and secret redaction.
//!
//! Terraform emits machine-readable JSON lines on stdout when run with
//! `-json`; everything else (init output, crashes, provider noise on
//! stderr) is plain text. The classifier normalizes both into protocol
//! [`Log`] messages with a session-wide sequence number, and the redactor
//! scrubs secret-bearing environment values before any line leaves the
//! session.

use serde::Deserialize;
use terraplane_protocol::messages::{Log, LogLevel};

use crate::supervisor::{OutputLine, OutputSource};

/// Replacement text for redacted secrets.
const REDACTED: &str = "[redacted]";

/// Secrets shorter than this are not redacted; scrubbing one- or two-byte
/// values would mangle ordinary output far more than it protects.
const MIN_SECRET_LEN: usize = 4;

/// Scrubs known secret values out of log lines.
#[derive(Debug, Default, Clone)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    /// Build a redactor from the tool environment: any variable whose name
    /// contains one of `markers` contributes its value as a secret.
    pub fn from_env(markers: &[String], env: &[(String, String)]) -> Self {
        let mut secrets: Vec<String> = env
            .iter()
            .filter(|(name, _)| {
                let name = name.to_uppercase();
                markers.iter().any(|marker| name.contains(marker.as_str()))
            })
            .filter(|(_, value)| value.len() >= MIN_SECRET_LEN)
            .map(|(_, value)| value.clone())
            .collect();
        // Longest first, so overlapping secrets redact fully.
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        Self { secrets }
    }

    /// Replace every known secret in `line` with `[redacted]`.
    pub fn redact(&self, line: &str) -> String {
        let mut out = line.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        out
    }
}

#[derive(Deserialize)]
struct TerraformLogEntry {
    #[serde(rename = "@level")]
    level: Option<String>,
    #[serde(rename = "@message")]
    message: Option<String>,
}

fn parse_level(level: &str) -> LogLevel {
    match level {
        "trace" => LogLevel::Trace,
        "debug" => LogLevel::Debug,
        "info" => LogLevel::Info,
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

/// Turns raw tool output lines into protocol log messages.
///
/// Sequence numbers are global to the session, not per tool invocation, so
/// the control plane can detect gaps across init/plan/apply boundaries.
#[derive(Debug)]
pub struct LogClassifier {
    redactor: Redactor,
    sequence: u64,
}

impl LogClassifier {
    /// Create a classifier starting at sequence zero.
    pub fn new(redactor: Redactor) -> Self {
        Self {
            redactor,
            sequence: 0,
        }
    }

    /// Classify one output line into a redacted, sequenced log message.
    pub fn classify(&mut self, line: &OutputLine) -> Log {
        let (level, output) = match serde_json::from_str::<TerraformLogEntry>(&line.text) {
            Ok(TerraformLogEntry {
                level,
                message: Some(message),
            }) => {
                let level = level.as_deref().map(parse_level).unwrap_or(LogLevel::Info);
                (level, message)
            }
            _ => {
                let level = match line.source {
                    OutputSource::Stdout => LogLevel::Info,
                    OutputSource::Stderr => LogLevel::Error,
                };
                (level, line.text.clone())
            }
        };

        let log = Log {
            level: level as i32,
            output: self.redactor.redact(&output),
            sequence: self.sequence,
        };
        self.sequence += 1;
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(source: OutputSource, text: &str) -> OutputLine {
        OutputLine {
            source,
            text: text.to_string(),
        }
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn markers() -> Vec<String> {
        crate::config::SECRET_MARKERS
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    #[test]
    fn test_redactor_scrubs_marked_values() {
        let redactor = Redactor::from_env(
            &markers(),
            &env(&[("TF_VAR_API_TOKEN", "hunter22"), ("TF_LOG", "TRACE")]),
        );

        assert_eq!(
            redactor.redact("authenticating with hunter22 now"),
            "authenticating with [redacted] now"
        );
        // Unmarked variable values pass through.
        assert_eq!(redactor.redact("log level TRACE"), "log level TRACE");
    }

    #[test]
    fn test_redactor_skips_short_values() {
        let redactor = Redactor::from_env(&markers(), &env(&[("MY_SECRET", "ab")]));
        assert_eq!(redactor.redact("ab abab"), "ab abab");
    }

    #[test]
    fn test_classify_json_line() {
        let mut classifier = LogClassifier::new(Redactor::default());
        let log = classifier.classify(&line(
            OutputSource::Stdout,
            r#"{"@level":"warn","@message":"Warning: deprecated attribute","@module":"terraform.ui"}"#,
        ));
        assert_eq!(log.level, LogLevel::Warn as i32);
        assert_eq!(log.output, "Warning: deprecated attribute");
    }

    #[test]
    fn test_classify_plain_lines_by_source() {
        let mut classifier = LogClassifier::new(Redactor::default());

        let stdout = classifier.classify(&line(OutputSource::Stdout, "Initializing backend..."));
        assert_eq!(stdout.level, LogLevel::Info as i32);

        let stderr = classifier.classify(&line(OutputSource::Stderr, "something went wrong"));
        assert_eq!(stderr.level, LogLevel::Error as i32);
    }

    #[test]
    fn test_sequence_is_monotonic_across_lines() {
        let mut classifier = LogClassifier::new(Redactor::default());
        let sequences: Vec<u64> = (0..4)
            .map(|i| {
                classifier
                    .classify(&line(OutputSource::Stdout, &format!("line {i}")))
                    .sequence
            })
            .collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_unknown_json_level_defaults_to_info() {
        let mut classifier = LogClassifier::new(Redactor::default());
        let log = classifier.classify(&line(
            OutputSource::Stdout,
            r#"{"@level":"fatal","@message":"boom"}"#,
        ));
        assert_eq!(log.level, LogLevel::Info as i32);
        assert_eq!(log.output, "boom");
    }

    #[test]
    fn test_json_line_is_redacted() {
        let redactor = Redactor::from_env(&markers(), &env(&[("DB_PASSWORD", "s3cretvalue")]));
        let mut classifier = LogClassifier::new(redactor);
        let log = classifier.classify(&line(
            OutputSource::Stdout,
            r#"{"@level":"info","@message":"connecting with s3cretvalue"}"#,
        ));
        assert_eq!(log.output, "connecting with [redacted]");
    }
}
