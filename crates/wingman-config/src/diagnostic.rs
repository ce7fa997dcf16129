// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config errors rendered as miette diagnostics.
//!
//! Unknown keys are the common mistake in a hand-edited `wingman.toml`, so
//! they get a label pointing into the file and a "did you mean" hint. Every
//! other load failure is reported against the dotted key it concerns.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key needs before it is offered as a hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}`{}", in_table(.table))]
    #[diagnostic(code(wingman::config::unknown_key), help("{hint}"))]
    UnknownKey {
        key: String,
        /// Dotted table the key appeared in; empty for the root.
        table: String,
        suggestion: Option<String>,
        hint: String,
        #[label("not a wingman setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that is present but unusable, or a required key that is
    /// absent. `key` is empty when figment could not attribute the error.
    #[error("{}", describe(.key, .detail))]
    #[diagnostic(code(wingman::config::bad_value))]
    BadValue { key: String, detail: String },

    /// A cross-field rule from [`crate::validation`].
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(wingman::config::invalid))]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

fn in_table(table: &str) -> String {
    if table.is_empty() {
        String::new()
    } else {
        format!(" in [{table}]")
    }
}

fn describe(key: &str, detail: &str) -> String {
    if key.is_empty() {
        detail.to_string()
    } else {
        format!("`{key}`: {detail}")
    }
}

/// Turns a figment error into one diagnostic per underlying failure.
///
/// `sources` pairs a display path with the TOML text read from it, so
/// unknown keys can be located.
pub fn diagnose(err: figment::Error, sources: &[(String, String)]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let table = table_path(&error.path);
            match &error.kind {
                Kind::UnknownField(key, valid) => {
                    let suggestion = suggest_key(key, valid);
                    let hint = match &suggestion {
                        Some(s) => format!("did you mean `{s}`? valid keys: {}", valid.join(", ")),
                        None => format!("valid keys: {}", valid.join(", ")),
                    };
                    let located = source_for(&error, sources).and_then(|(path, text)| {
                        let offset = locate_key(text, &table, key)?;
                        Some((
                            SourceSpan::new(offset.into(), key.len()),
                            NamedSource::new(path, text.clone()),
                        ))
                    });
                    let (span, src) = located.unzip();
                    ConfigError::UnknownKey {
                        key: key.clone(),
                        table,
                        suggestion,
                        hint,
                        span,
                        src,
                    }
                }
                Kind::MissingField(key) => ConfigError::BadValue {
                    key: join_key(&table, key),
                    detail: "missing required key".into(),
                },
                Kind::InvalidType(actual, expected) => ConfigError::BadValue {
                    key: table,
                    detail: format!("expected {expected}, found {actual}"),
                },
                _ => ConfigError::BadValue {
                    key: table,
                    detail: error.kind.to_string(),
                },
            }
        })
        .collect()
}

/// Dotted table name for a figment path; array indices are dropped so
/// `providers.backends.0` becomes `providers.backends`.
fn table_path(path: &[String]) -> String {
    path.iter()
        .filter(|segment| segment.parse::<usize>().is_err())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(".")
}

fn join_key(table: &str, key: &str) -> String {
    if table.is_empty() {
        key.to_string()
    } else {
        format!("{table}.{key}")
    }
}

fn source_for<'a>(
    error: &figment::error::Error,
    sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    match file {
        Some(file) => sources.iter().find(|(path, _)| *path == file),
        // Inline strings carry no file source.
        None if sources.len() == 1 => sources.first(),
        None => None,
    }
}

/// Byte offset of `key` inside the TOML table `table` (dotted, `""` for the
/// root). Array-of-tables headers count as their dotted name. A root-level
/// key that names a table matches that table's header.
pub fn locate_key(content: &str, table: &str, key: &str) -> Option<usize> {
    let mut current = String::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let body = &line[indent..];

        if body.starts_with('[') {
            let name = body
                .trim_start_matches('[')
                .split(']')
                .next()
                .unwrap_or_default()
                .trim();
            if table.is_empty() && (name == key || name.starts_with(&format!("{key}."))) {
                let start = indent + (body.len() - body.trim_start_matches('[').len());
                return Some(offset + start);
            }
            current = name.to_string();
        } else if current == table
            && body
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Closest valid key to `unknown`, if any is similar enough.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, valid: &[S]) -> Option<String> {
    valid
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key.as_ref()), key.as_ref()))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints each error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_key() {
        let valid = ["max_attempts", "backoff_base_ms", "failure_threshold"];
        assert_eq!(suggest_key("max_atempts", &valid).as_deref(), Some("max_attempts"));
        assert_eq!(suggest_key("zzzzzz", &valid), None);
    }

    #[test]
    fn locates_key_in_its_own_table() {
        let content = "[gateway]\nport = 1\n\n[agent]\n  naem = \"test\"\n";
        let offset = locate_key(content, "agent", "naem").unwrap();
        assert_eq!(&content[offset..offset + 4], "naem");
        assert_eq!(locate_key(content, "gateway", "naem"), None);
    }

    #[test]
    fn locates_key_in_array_table() {
        let content = "[providers]\nnmae = 1\n\n[[providers.backends]] # primary\nnmae = \"x\"\n";
        let offset = locate_key(content, "providers.backends", "nmae").unwrap();
        assert!(content[..offset].ends_with("# primary\n"));
    }

    #[test]
    fn locates_unknown_root_table_header() {
        let content = "[agent]\nname = \"w\"\n[telegram]\nbot_token = \"x\"\n";
        let offset = locate_key(content, "", "telegram").unwrap();
        assert_eq!(&content[offset..offset + 8], "telegram");
    }

    #[test]
    fn table_path_drops_array_indices() {
        let path = ["providers".to_string(), "backends".to_string(), "0".to_string()];
        assert_eq!(table_path(&path), "providers.backends");
    }
}
