use serde::{Deserialize, Serialize};

/// Compiler invocation for one source file.
///
/// Derived from `xcodebuild` output once per snapshot generation; equality is structural
/// so snapshots can be diffed file by file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

impl CompilerOptions {
    #[must_use]
    pub fn new(options: Vec<String>, working_directory: Option<String>) -> Self {
        Self {
            options,
            working_directory,
        }
    }

    /// Build options from an argument list, extracting `-working-directory`.
    #[must_use]
    pub fn from_arguments(options: Vec<String>) -> Self {
        let working_directory = working_directory(&options);
        Self {
            options,
            working_directory,
        }
    }
}

/// Value of the first `-working-directory <dir>` or `-working-directory=<dir>` argument.
#[must_use]
pub fn working_directory(arguments: &[String]) -> Option<String> {
    let mut iter = arguments.iter().peekable();
    while let Some(argument) = iter.next() {
        if argument == "-working-directory" {
            if let Some(value) = iter.peek() {
                return Some((*value).clone());
            }
        } else if let Some(value) = argument.strip_prefix("-working-directory=") {
            return Some(value.to_string());
        }
    }
    None
}
