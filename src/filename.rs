//! Identifier and folder generation
//!
//! Identifiers are derived from the user's filename but only ever contain
//! `[a-z0-9-]`, so they are safe as a path segment for every provider.

use chrono::Utc;
use std::path::Path;
use uuid::Uuid;

const MAX_STEM_LEN: usize = 50;
pub const DEFAULT_SUBFOLDER: &str = "uploads";

#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameGenerator;

impl FilenameGenerator {
    pub fn new() -> Self {
        Self
    }

    /// `<sanitized-stem>-<unix-millis>-<uuid-v4>`
    pub fn generate(&self, original_name: &str) -> String {
        let stem = sanitize(strip_extension(original_name));
        let stem = if stem.is_empty() { "file".to_string() } else { stem };

        format!(
            "{}-{}-{}",
            stem,
            Utc::now().timestamp_millis(),
            Uuid::new_v4()
        )
    }

    /// Prefix `folder` with the tenant namespace. Each segment is sanitized;
    /// an empty folder maps to the default subfolder.
    pub fn folder_path(&self, namespace: &str, folder: &str) -> String {
        let sub: Vec<String> = folder
            .split('/')
            .map(sanitize)
            .filter(|s| !s.trim_matches('-').is_empty())
            .collect();
        let sub = if sub.is_empty() {
            DEFAULT_SUBFOLDER.to_string()
        } else {
            sub.join("/")
        };

        let namespace = namespace.trim_matches('/');
        if namespace.is_empty() {
            sub
        } else {
            format!("{}/{}", namespace, sub)
        }
    }
}

fn strip_extension(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base)
}

/// Lower-case, collapse runs outside `[a-z0-9]` into one `-`, cap the length.
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }

    out.truncate(MAX_STEM_LEN);
    out
}
