//! Helpful error types for the CLI
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug, Serialize)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggestion for fixing the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Instance path does not exist
    pub fn instance_not_found(path: &Path) -> Self {
        Self::new(format!("Instance path not found: {}", path.display()))
            .with_context("--instance must name an instance directory, an instance file, or a glob of directories")
            .with_suggestions([
                format!("TRY: Check that the path exists: ls -la {}", path.display()),
                "TRY: Quote glob patterns so the shell does not expand them: -i 'instances/*'"
                    .to_string(),
            ])
    }

    /// Glob pattern could not be compiled
    pub fn invalid_pattern(pattern: &str, reason: &str) -> Self {
        Self::new(format!("Invalid instance pattern: '{}'", pattern))
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Use * for any name, ? for one character, [ab] for a set".to_string(),
                "TRY: Close every '[' with a matching ']'".to_string(),
            ])
    }

    /// Pattern matched no directories
    pub fn no_instances(instance_spec: &str) -> Self {
        Self::new(format!("No instance directories matched: {}", instance_spec))
            .with_context("Each ODK Collect submission lives in its own directory under instances/")
            .with_suggestions([
                format!("TRY: List what the pattern sees: ls -d {}", instance_spec),
                "TRY: Patterns are resolved from the current directory".to_string(),
            ])
    }

    /// Config file missing or invalid
    pub fn invalid_config(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot load config: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Known keys: output_dir, write_csv, write_geojson, skip_fields".to_string(),
                "TRY: Unset FIELDWORK_CONFIG to run with defaults".to_string(),
            ])
    }

    /// Every discovered instance failed
    pub fn nothing_converted(discovered: usize) -> Self {
        Self::new(format!("No instance converted ({} discovered)", discovered))
            .with_context("Nothing was written")
            .with_suggestions([
                "TRY: Rerun with -v to see why each instance was skipped".to_string(),
                "TRY: Check that each instance file has a <data> root element".to_string(),
            ])
    }

    /// Output could not be written
    pub fn cannot_write_output(reason: &str) -> Self {
        Self::new("Failed to write output")
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Check that the output directory is writable".to_string(),
                "TRY: Choose another location with --outfile or --output-dir".to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as a JSON object on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let payload = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({ "error": helpful }),
        None => serde_json::json!({
            "error": {
                "message": format!("{:#}", err),
                "context": null,
                "suggestions": [],
            }
        }),
    };
    match serde_json::to_string_pretty(&payload) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:?}", err),
    }
}
