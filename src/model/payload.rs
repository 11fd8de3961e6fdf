//! Classification of drag pasteboard contents.
//!
//! A drop is classified into exactly one [`DragPayload`]. The first matching
//! kind (mail > file promises > file URLs > text/URL) consumes the whole
//! pasteboard; kinds are never merged.

use std::path::PathBuf;
use std::sync::LazyLock;

use bitflags::bitflags;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const PASTEBOARD_TYPE_FILE_URL: &str = "public.file-url";
pub const PASTEBOARD_TYPE_URL: &str = "public.url";
pub const PASTEBOARD_TYPE_STRING: &str = "public.utf8-plain-text";

pub const MAIL_TYPES: [&str; 2] = [
    "com.apple.mail.PasteboardTypeMessageTransfer",
    "com.apple.mail.PasteboardTypeAutomator",
];

pub const PROMISE_TYPES: [&str; 2] = [
    "com.apple.NSFilePromiseItemMetaData",
    "com.apple.pasteboard.promised-file-url",
];

static SINGLE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(https?|ftp)://[^\s/$.?#][^\s]*$").expect("static regex is valid")
});

/// A deferred file reference handed out by the dragging source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromiseHandle {
    pub id: u64,
    /// Name the source announced for the file, if any.
    pub file_name: Option<String>,
    pub source_app: Option<String>,
}

/// The messages selected in Mail when the drag started. An empty id list
/// means "whatever Mail has selected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSelection {
    pub message_ids: Vec<String>,
}

impl MailSelection {
    pub fn includes(&self, message_id: &str) -> bool {
        self.message_ids.is_empty() || self.message_ids.iter().any(|id| id == message_id)
    }
}

/// Raw drag pasteboard contents as read by the window layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PasteboardSnapshot {
    pub types: Vec<String>,
    pub file_urls: Vec<PathBuf>,
    pub promises: Vec<PromiseHandle>,
    pub urls: Vec<String>,
    pub text: Option<String>,
    pub mail_selection: Option<MailSelection>,
}

impl PasteboardSnapshot {
    pub fn has_type(&self, ty: &str) -> bool { self.types.iter().any(|t| t == ty) }

    pub fn has_any_type(&self, types: &[&str]) -> bool { types.iter().any(|ty| self.has_type(ty)) }

    /// Cheap summary consulted before a drop is accepted.
    pub fn drag_info(&self) -> DragInfo {
        DragInfo {
            contains_directory: self.file_urls.iter().any(|path| path.is_dir()),
            is_empty: self.kinds().is_empty(),
        }
    }

    /// Every kind of content present, regardless of priority.
    pub fn kinds(&self) -> PayloadKinds {
        let mut kinds = PayloadKinds::empty();
        if self.mail_selection.is_some() || self.has_any_type(&MAIL_TYPES) {
            kinds |= PayloadKinds::MAIL;
        }
        if !self.promises.is_empty() {
            kinds |= PayloadKinds::PROMISES;
        }
        if !self.file_urls.is_empty() {
            kinds |= PayloadKinds::FILE_URLS;
        }
        if !self.urls.is_empty() {
            kinds |= PayloadKinds::REMOTE_URLS;
        }
        if self.text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
            kinds |= PayloadKinds::TEXT;
        }
        kinds
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PayloadKinds: u8 {
        const MAIL = 1 << 0;
        const PROMISES = 1 << 1;
        const FILE_URLS = 1 << 2;
        const REMOTE_URLS = 1 << 3;
        const TEXT = 1 << 4;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DragPayload {
    LocalFileUrls(Vec<PathBuf>),
    FilePromises(Vec<PromiseHandle>),
    MailMessages(MailSelection),
    PlainText(String),
    RemoteUrls(Vec<String>),
}

impl DragPayload {
    /// Whether materializing this payload needs a round trip to another
    /// process.
    pub fn is_deferred(&self) -> bool {
        matches!(self, DragPayload::FilePromises(_) | DragPayload::MailMessages(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragInfo {
    pub contains_directory: bool,
    pub is_empty: bool,
}

pub fn is_single_url(text: &str) -> bool { SINGLE_URL.is_match(text.trim()) }

/// Picks the one payload kind that wins for this pasteboard.
pub fn classify(snapshot: &PasteboardSnapshot) -> Option<DragPayload> {
    let kinds = snapshot.kinds();
    if kinds.contains(PayloadKinds::MAIL) {
        return Some(DragPayload::MailMessages(
            snapshot.mail_selection.clone().unwrap_or_default(),
        ));
    }
    if kinds.contains(PayloadKinds::PROMISES) {
        return Some(DragPayload::FilePromises(snapshot.promises.clone()));
    }
    if kinds.contains(PayloadKinds::FILE_URLS) {
        return Some(DragPayload::LocalFileUrls(snapshot.file_urls.clone()));
    }
    if kinds.contains(PayloadKinds::REMOTE_URLS) {
        return Some(DragPayload::RemoteUrls(snapshot.urls.clone()));
    }
    let text = snapshot.text.as_deref()?.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(path) = path_from_file_url(text) {
        return Some(DragPayload::LocalFileUrls(vec![path]));
    }
    if is_single_url(text) {
        return Some(DragPayload::RemoteUrls(vec![text.to_string()]));
    }
    Some(DragPayload::PlainText(text.to_string()))
}

/// Converts a `file://` URL into a path, percent-decoding it.
pub fn path_from_file_url(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file://")?;
    // `file://localhost/path` and `file:///path` both name a local file.
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    if !rest.starts_with('/') {
        return None;
    }
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let decoded = String::from_utf8(percent_decode(rest.as_bytes())).ok()?;
    Some(PathBuf::from(decoded))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%'
            && i + 2 < input.len()
            && let (Some(hi), Some(lo)) = (hex_value(input[i + 1]), hex_value(input[i + 2]))
        {
            out.push((hi << 4) | lo);
            i += 3;
            continue;
        }
        out.push(input[i]);
        i += 1;
    }
    out
}
