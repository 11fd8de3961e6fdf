//! Turns a classified drag payload into files the shelf can hold.
//!
//! Local files are taken as they are. Links and text are written into a
//! fresh `<prefix>-<UUID>` drop directory right away. File promises and Mail
//! messages take a round trip through another process, so they are resolved
//! on a task, reporting every item as soon as it lands.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::common::BoxFuture;
use crate::common::collections::HashSet;
use crate::common::config::IngestSettings;
use crate::model::payload::{self, DragPayload, MailSelection, PasteboardSnapshot, PromiseHandle};
use crate::model::shelf::IngestedFile;
use crate::sys::fs::{
    create_drop_dir, remove_all_except, remove_quietly, sanitize_file_stem, standardize_path,
    unique_child_path,
};
use crate::sys::mail::{MailExportError, MailExporter};

#[derive(Debug, Error)]
pub enum PromiseError {
    #[error("the dragging source rejected the promise: {0}")]
    Rejected(String),
    #[error("timed out waiting for the promised file")]
    TimedOut,
    #[error("failed to receive promised file: {0}")]
    Io(#[from] io::Error),
}

/// Resolves one file promise into `dest`, returning the written file.
pub trait PromiseResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        handle: &'a PromiseHandle,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf, PromiseError>>;
}

/// Used where no window layer can receive promises, e.g. in the CLI.
#[derive(Debug, Default)]
pub struct RejectingPromiseResolver;

impl PromiseResolver for RejectingPromiseResolver {
    fn resolve<'a>(
        &'a self,
        _handle: &'a PromiseHandle,
        _dest: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf, PromiseError>> {
        Box::pin(async { Err(PromiseError::Rejected("no promise receiver".to_string())) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to prepare drop directory: {0}")]
    Io(#[from] io::Error),
    #[error("the drop contained nothing to add")]
    EmptyPayload,
    #[error("all {failed} promised files failed to arrive")]
    AllPromisesFailed { failed: usize },
    #[error(transparent)]
    MailExport(#[from] MailExportError),
    #[error("ingestion was cancelled")]
    Cancelled,
    #[error("no async runtime available")]
    NoRuntime,
}

impl IngestError {
    /// The user-facing alert for this failure, if it deserves one.
    pub fn alert(&self) -> Option<Alert> {
        let (title, message) = match self {
            IngestError::Cancelled | IngestError::EmptyPayload => return None,
            IngestError::AllPromisesFailed { .. } => (
                "Couldn't add the dropped items",
                "None of the promised files arrived. If they come from iCloud (for example \
                 Photos), make sure they are downloaded locally first and try again."
                    .to_string(),
            ),
            IngestError::MailExport(err) => (
                "Couldn't export the Mail messages",
                format!("Mail did not hand over the selected messages: {err}"),
            ),
            IngestError::Io(err) => ("Couldn't add the dropped items", err.to_string()),
            IngestError::NoRuntime => ("Couldn't add the dropped items", self.to_string()),
        };
        Some(Alert { title: title.to_string(), message })
    }
}

#[derive(Debug)]
pub enum IngestEvent {
    /// One file is ready for the shelf.
    Item(IngestedFile),
    /// One item failed; the rest continue.
    Failed { reason: String },
    Finished {
        succeeded: usize,
        failed: usize,
        alert: Option<Alert>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct IngestNormalizer {
    temp_root: PathBuf,
    prefix: String,
    promise_timeout: Duration,
    resolver: Arc<dyn PromiseResolver>,
    mail: Arc<dyn MailExporter>,
}

impl IngestNormalizer {
    pub fn new(
        settings: &IngestSettings,
        resolver: Arc<dyn PromiseResolver>,
        mail: Arc<dyn MailExporter>,
    ) -> Self {
        Self {
            temp_root: settings.temp_root(),
            prefix: settings.temp_prefix.clone(),
            promise_timeout: settings.promise_timeout(),
            resolver,
            mail,
        }
    }

    pub fn classify(&self, snapshot: &PasteboardSnapshot) -> Option<DragPayload> {
        payload::classify(snapshot)
    }

    fn drop_dir(&self) -> io::Result<PathBuf> { create_drop_dir(&self.temp_root, &self.prefix) }

    /// Materializes payloads that need no other process. Returns `None` for
    /// deferred payloads, which go through [`IngestNormalizer::spawn_async`].
    pub fn materialize_now(
        &self,
        payload: &DragPayload,
    ) -> Option<Result<Vec<IngestedFile>, IngestError>> {
        let result = match payload {
            DragPayload::FilePromises(_) | DragPayload::MailMessages(_) => return None,
            DragPayload::LocalFileUrls(paths) => Ok(local_files(paths)),
            DragPayload::RemoteUrls(urls) => self.write_links(urls),
            DragPayload::PlainText(text) => self.write_text(text),
        };
        Some(result.and_then(|files| {
            if files.is_empty() { Err(IngestError::EmptyPayload) } else { Ok(files) }
        }))
    }

    fn write_links(&self, urls: &[String]) -> Result<Vec<IngestedFile>, IngestError> {
        let mut seen = HashSet::default();
        let urls: Vec<_> = urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty() && seen.insert(url.to_string()))
            .collect();
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let dir = self.drop_dir()?;
        let mut files = Vec::with_capacity(urls.len());
        for url in urls {
            let stem = sanitize_file_stem(url_host(url).unwrap_or_default(), "Link");
            let path = unique_child_path(&dir, &stem, "webloc");
            if let Err(e) = std::fs::write(&path, webloc_plist(url)) {
                remove_quietly(&dir);
                return Err(e.into());
            }
            files.push(IngestedFile::temporary(path, &dir).with_source_url(url));
        }
        debug!(count = files.len(), ?dir, "Wrote link files");
        Ok(files)
    }

    fn write_text(&self, text: &str) -> Result<Vec<IngestedFile>, IngestError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let dir = self.drop_dir()?;
        let first_line = text.lines().map(str::trim).find(|line| !line.is_empty());
        let stem = sanitize_file_stem(first_line.unwrap_or_default(), "Text");
        let path = unique_child_path(&dir, &stem, "txt");
        if let Err(e) = std::fs::write(&path, text) {
            remove_quietly(&dir);
            return Err(e.into());
        }
        debug!(?path, "Wrote text file");
        Ok(vec![IngestedFile::temporary(path, &dir)])
    }

    /// Resolves a deferred payload on a task. Every resolved file is emitted
    /// as [`IngestEvent::Item`] right away; [`IngestEvent::Finished`] is
    /// always the last event.
    pub fn spawn_async<F>(
        self: &Arc<Self>,
        payload: DragPayload,
        cancel: CancellationToken,
        emit: F,
    ) -> Result<JoinHandle<Result<IngestSummary, IngestError>>, IngestError>
    where
        F: Fn(IngestEvent) + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| IngestError::NoRuntime)?;
        let normalizer = Arc::clone(self);
        let span = info_span!("ingest::resolve_deferred");
        Ok(runtime.spawn(
            async move {
                let result = normalizer.resolve_deferred(payload, cancel, &emit).await;
                let (summary, alert) = match &result {
                    Ok(summary) => (*summary, None),
                    Err(err) => {
                        warn!("Deferred ingestion failed: {err}");
                        let failed = match err {
                            IngestError::AllPromisesFailed { failed } => *failed,
                            _ => 0,
                        };
                        (IngestSummary { succeeded: 0, failed }, err.alert())
                    }
                };
                emit(IngestEvent::Finished {
                    succeeded: summary.succeeded,
                    failed: summary.failed,
                    alert,
                });
                result
            }
            .instrument(span),
        ))
    }

    pub async fn resolve_deferred(
        &self,
        payload: DragPayload,
        cancel: CancellationToken,
        emit: &(dyn Fn(IngestEvent) + Send + Sync),
    ) -> Result<IngestSummary, IngestError> {
        match payload {
            DragPayload::FilePromises(handles) => {
                self.resolve_promises(handles, cancel, emit).await
            }
            DragPayload::MailMessages(selection) => {
                self.export_mail(&selection, cancel, emit).await
            }
            other => {
                let files = self.materialize_now(&other).unwrap_or(Err(IngestError::EmptyPayload))?;
                let succeeded = files.len();
                files.into_iter().for_each(|file| emit(IngestEvent::Item(file)));
                Ok(IngestSummary { succeeded, failed: 0 })
            }
        }
    }

    async fn resolve_promises(
        &self,
        handles: Vec<PromiseHandle>,
        cancel: CancellationToken,
        emit: &(dyn Fn(IngestEvent) + Send + Sync),
    ) -> Result<IngestSummary, IngestError> {
        if handles.is_empty() {
            return Err(IngestError::EmptyPayload);
        }
        let dir = self.drop_dir()?;
        let mut tasks = JoinSet::new();
        for handle in handles {
            let resolver = Arc::clone(&self.resolver);
            let dest = dir.clone();
            let timeout = self.promise_timeout;
            tasks.spawn(async move {
                let result = tokio::time::timeout(timeout, resolver.resolve(&handle, &dest))
                    .await
                    .unwrap_or(Err(PromiseError::TimedOut));
                (handle, result)
            });
        }

        let mut summary = IngestSummary::default();
        let mut delivered = Vec::new();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    // Delivered files belong to the shelf now.
                    let removed = remove_all_except(&dir, &delivered);
                    debug!(delivered = delivered.len(), removed, "Promise resolution cancelled");
                    return Err(IngestError::Cancelled);
                }
                next = tasks.join_next() => next,
            };
            match next {
                None => break,
                Some(Ok((_, Ok(path)))) => {
                    summary.succeeded += 1;
                    delivered.push(path.clone());
                    emit(IngestEvent::Item(IngestedFile::temporary(path, &dir)));
                }
                Some(Ok((handle, Err(err)))) => {
                    summary.failed += 1;
                    warn!(
                        promise = handle.id,
                        file_name = ?handle.file_name,
                        "Promise failed: {err}"
                    );
                    emit(IngestEvent::Failed { reason: err.to_string() });
                }
                Some(Err(err)) => {
                    summary.failed += 1;
                    warn!("Promise task failed: {err}");
                    emit(IngestEvent::Failed { reason: err.to_string() });
                }
            }
        }

        if summary.succeeded == 0 {
            remove_quietly(&dir);
            return Err(IngestError::AllPromisesFailed { failed: summary.failed });
        }
        debug!(?summary, "Promises resolved");
        Ok(summary)
    }

    async fn export_mail(
        &self,
        selection: &MailSelection,
        cancel: CancellationToken,
        emit: &(dyn Fn(IngestEvent) + Send + Sync),
    ) -> Result<IngestSummary, IngestError> {
        let dir = self.drop_dir()?;
        let exported = tokio::select! {
            _ = cancel.cancelled() => {
                remove_quietly(&dir);
                return Err(IngestError::Cancelled);
            }
            exported = self.mail.export(selection, &dir) => exported,
        };
        let paths = match exported {
            Ok(paths) => paths,
            Err(err) => {
                remove_quietly(&dir);
                return Err(err.into());
            }
        };
        if paths.is_empty() {
            debug!("Mail exported nothing; nothing to ingest");
            remove_quietly(&dir);
            return Ok(IngestSummary::default());
        }
        let succeeded = paths.len();
        for path in paths {
            emit(IngestEvent::Item(IngestedFile::temporary(path, &dir)));
        }
        Ok(IngestSummary { succeeded, failed: 0 })
    }
}

fn local_files(paths: &[PathBuf]) -> Vec<IngestedFile> {
    let mut seen = HashSet::default();
    paths
        .iter()
        .map(|path| standardize_path(path))
        .filter(|path| seen.insert(path.clone()))
        .map(IngestedFile::existing)
        .collect()
}

/// `example.com` for `https://www.example.com:8080/x?y`.
fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split(':').next()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    (!host.is_empty()).then_some(host)
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn webloc_plist(url: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
         \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n\
         <dict>\n\
         \t<key>URL</key>\n\
         \t<string>{}</string>\n\
         </dict>\n\
         </plist>\n",
        xml_escape(url)
    )
}
