//! Compiler argument extraction and sanitization.

use crate::paths::normalize_path;
use crate::xcodebuild::FileSettings;

const PARSEABLE_OUTPUT: &str = "-use-frontend-parseable-output";
const LOCALIZED_STRINGS: &str = "-emit-localized-strings";
const LOCALIZED_STRINGS_PATH: &str = "-emit-localized-strings-path";
const SDK: &str = "-sdk";
const INDEX_STORE_PATH: &str = "-index-store-path";
const MODULE_MAP_FILE: &str = "-fmodule-map-file";
const XCC: &str = "-Xcc";

/// Swift AST, then clang AST, then clang PCH arguments of one file.
#[must_use]
pub fn compiler_arguments(settings: &FileSettings) -> Vec<String> {
    [
        &settings.swift_ast_command_arguments,
        &settings.clang_ast_command_arguments,
        &settings.clang_pch_command_arguments,
    ]
    .into_iter()
    .flatten()
    .flatten()
    .cloned()
    .collect()
}

/// Strip arguments sourcekit cannot use.
///
/// Applied in order: parseable-output flag; localized-strings flags (the `-path` form
/// with its value); `-sdk <path>` pairs whose path `path_exists` rejects.
#[must_use]
pub fn sanitize_arguments(
    arguments: Vec<String>,
    path_exists: impl Fn(&str) -> bool,
) -> Vec<String> {
    let arguments: Vec<String> = arguments
        .into_iter()
        .filter(|arg| arg != PARSEABLE_OUTPUT)
        .collect();

    let mut without_localized = Vec::with_capacity(arguments.len());
    let mut iter = arguments.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            LOCALIZED_STRINGS_PATH => {
                iter.next();
            }
            LOCALIZED_STRINGS => {}
            _ => without_localized.push(arg),
        }
    }

    let mut sanitized = Vec::with_capacity(without_localized.len());
    let mut iter = without_localized.into_iter().peekable();
    while let Some(arg) = iter.next() {
        if arg == SDK
            && let Some(path) = iter.peek()
            && !path_exists(path.as_str())
        {
            tracing::trace!("dropping -sdk with missing path {path}");
            iter.next();
            continue;
        }
        sanitized.push(arg);
    }
    sanitized
}

/// First `-index-store-path` value; absolute values are normalized.
#[must_use]
pub fn index_store_path(arguments: &[String]) -> Option<String> {
    let mut iter = arguments.iter();
    while let Some(arg) = iter.next() {
        let value = if arg == INDEX_STORE_PATH {
            iter.next().map(String::as_str)
        } else {
            arg.strip_prefix("-index-store-path=")
        };
        if let Some(value) = value {
            return Some(if value.starts_with('/') {
                normalize_path(value)
            } else {
                value.to_string()
            });
        }
    }
    None
}

/// Whether any `-fmodule-map-file` path is missing.
///
/// Recognizes `-fmodule-map-file <p>`, `-fmodule-map-file=<p>`,
/// `-Xcc -fmodule-map-file -Xcc <p>` and `-Xcc -fmodule-map-file=<p>`.
#[must_use]
pub fn has_missing_module_map(arguments: &[String], path_exists: impl Fn(&str) -> bool) -> bool {
    let prefix = format!("{MODULE_MAP_FILE}=");
    let mut index = 0;
    while index < arguments.len() {
        let arg = arguments[index].as_str();
        let path = if arg == MODULE_MAP_FILE {
            arguments
                .get(index + 1)
                .map(String::as_str)
                .filter(|next| *next != XCC)
        } else if let Some(path) = arg.strip_prefix(&prefix) {
            Some(path)
        } else if arg == XCC {
            match arguments.get(index + 1).map(String::as_str) {
                Some(MODULE_MAP_FILE) if arguments.get(index + 2).is_some_and(|a| a == XCC) => {
                    arguments.get(index + 3).map(String::as_str)
                }
                Some(wrapped) => wrapped.strip_prefix(&prefix),
                None => None,
            }
        } else {
            None
        };

        if let Some(path) = path
            && !path_exists(path)
        {
            return true;
        }
        index += 1;
    }
    false
}
