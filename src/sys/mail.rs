//! Mail.app export. File promises coming from Mail are unreliable, so the
//! selected messages are exported through an isolated `osascript` run that
//! returns the raw message source, and the `.eml` files are written here.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::common::BoxFuture;
use crate::model::payload::MailSelection;
use crate::sys::fs::{sanitize_file_stem, unique_child_path};

const RECORD_SEPARATOR: char = '\u{1e}';
const UNIT_SEPARATOR: char = '\u{1f}';

const EXPORT_SCRIPT: &str = r#"set RS to (ASCII character 30)
set US to (ASCII character 31)
set out to ""
tell application "Mail"
    set theMessages to selection
    repeat with m in theMessages
        set out to out & (message id of m) & US & (subject of m) & US & (source of m) & RS
    end repeat
end tell
return out"#;

#[derive(Debug, Error)]
pub enum MailExportError {
    #[error("failed to launch osascript: {0}")]
    Launch(#[source] std::io::Error),
    #[error("Mail automation failed: {0}")]
    Script(String),
    #[error("failed to write exported message {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Exports Mail messages into `dest`, returning the written files. An empty
/// result means there was nothing to export.
pub trait MailExporter: Send + Sync {
    fn export<'a>(
        &'a self,
        selection: &'a MailSelection,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>, MailExportError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedMessage {
    pub message_id: String,
    pub subject: String,
    pub source: String,
}

pub struct OsascriptMailExporter {
    program: PathBuf,
}

impl Default for OsascriptMailExporter {
    fn default() -> Self { Self { program: PathBuf::from("osascript") } }
}

impl OsascriptMailExporter {
    pub fn with_program(program: impl Into<PathBuf>) -> Self { Self { program: program.into() } }

    async fn run_script(&self) -> Result<String, MailExportError> {
        let output = Command::new(&self.program)
            .arg("-e")
            .arg(EXPORT_SCRIPT)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(MailExportError::Launch)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(MailExportError::Script(stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl MailExporter for OsascriptMailExporter {
    fn export<'a>(
        &'a self,
        selection: &'a MailSelection,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>, MailExportError>> {
        Box::pin(async move {
            let raw = self.run_script().await?;
            let messages: Vec<_> = parse_export_output(&raw)
                .into_iter()
                .filter(|m| selection.includes(&m.message_id))
                .collect();
            debug!(count = messages.len(), "Exported Mail messages");
            write_messages(dest, &messages)
        })
    }
}

pub fn parse_export_output(raw: &str) -> Vec<ExportedMessage> {
    raw.split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let mut fields = record.trim_start_matches(['\n', '\r']).splitn(3, UNIT_SEPARATOR);
            let message_id = fields.next()?.trim().to_string();
            let subject = fields.next()?.trim().to_string();
            let source = fields.next()?.to_string();
            if source.trim().is_empty() {
                trace!(%message_id, "Skipping message without source");
                return None;
            }
            Some(ExportedMessage { message_id, subject, source })
        })
        .collect()
}

pub fn write_messages(
    dest: &Path,
    messages: &[ExportedMessage],
) -> Result<Vec<PathBuf>, MailExportError> {
    let mut written = Vec::with_capacity(messages.len());
    for message in messages {
        let stem = sanitize_file_stem(&message.subject, "Message");
        let path = unique_child_path(dest, &stem, "eml");
        std::fs::write(&path, message.source.as_bytes())
            .map_err(|source| MailExportError::Write { path: path.clone(), source })?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(id: &str, subject: &str, source: &str) -> String {
        format!("{id}{UNIT_SEPARATOR}{subject}{UNIT_SEPARATOR}{source}{RECORD_SEPARATOR}")
    }

    #[test]
    fn parses_records_and_ignores_trailing_newline() {
        let raw = format!(
            "{}{}\n",
            record("<a@x>", "Hello", "From: a\r\n\r\nbody"),
            record("<b@x>", "Re: plans", "From: b\r\n\r\nother")
        );
        let parsed = parse_export_output(&raw);
        assert_eq!(parsed, vec![
            ExportedMessage {
                message_id: "<a@x>".to_string(),
                subject: "Hello".to_string(),
                source: "From: a\r\n\r\nbody".to_string(),
            },
            ExportedMessage {
                message_id: "<b@x>".to_string(),
                subject: "Re: plans".to_string(),
                source: "From: b\r\n\r\nother".to_string(),
            },
        ]);
    }

    #[test]
    fn empty_output_is_nothing_to_export() {
        assert!(parse_export_output("\n").is_empty());
        assert!(parse_export_output("").is_empty());
    }

    #[test]
    fn writes_eml_files_with_unique_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let messages = vec![
            ExportedMessage {
                message_id: "1".to_string(),
                subject: "Invoice".to_string(),
                source: "a".to_string(),
            },
            ExportedMessage {
                message_id: "2".to_string(),
                subject: "Invoice".to_string(),
                source: "b".to_string(),
            },
        ];
        let written = write_messages(dir.path(), &messages).expect("write");
        assert_eq!(written, vec![
            dir.path().join("Invoice.eml"),
            dir.path().join("Invoice 2.eml"),
        ]);
        assert_eq!(std::fs::read_to_string(&written[1]).expect("read"), "b");
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let exporter = OsascriptMailExporter::with_program("/nonexistent/osascript-droppy");
        let dir = tempfile::tempdir().expect("tempdir");
        let result = exporter.export(&MailSelection::default(), dir.path()).await;
        assert!(matches!(result, Err(MailExportError::Launch(_))));
    }
}
