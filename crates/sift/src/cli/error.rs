//! Operator-facing errors
//!
//! Every error carries what went wrong, optionally the situation it happened
//! in, and `TRY:` lines suggesting a fix.

use std::fmt;
use std::path::Path;

use sift_jobs::{BuildError, JobFactory};

#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    /// Store directory missing or not a directory
    pub fn store_not_found(path: &Path) -> Self {
        Self::new(format!("Store not found: {}", path.display()))
            .with_context("A store is a directory holding nodes.store and relationships.store")
            .with_suggestions([
                format!("TRY: Create a demo store: sift init {}", path.display()),
                "TRY: Check for typos in the path".to_string(),
            ])
    }

    /// Store directory exists but could not be opened
    pub fn store_unreadable(path: &Path, cause: impl fmt::Display) -> Self {
        Self::new(format!("Cannot open store {}", path.display()))
            .with_context(cause.to_string())
            .with_suggestions([
                format!("TRY: Check permissions: ls -la {}", path.display()),
                format!("TRY: Rebuild it: sift init --force {}", path.display()),
            ])
    }

    pub fn unknown_job<'a>(name: &str, available: impl IntoIterator<Item = &'a str>) -> Self {
        let available: Vec<&str> = available.into_iter().collect();
        Self::new(format!("No such job: {}", name))
            .with_context(format!("Available jobs: {}", available.join(", ")))
            .with_suggestion("TRY: List jobs with usage: sift shell <STORE>, then 'help'")
    }

    pub fn bad_job_args(factory: &dyn JobFactory, err: &BuildError) -> Self {
        Self::new(format!("Invalid arguments for {}: {}", factory.name(), err))
            .with_context(format!("Usage: {} {}", factory.name(), factory.args_help()))
            .with_suggestion(format!("TRY: sift run <STORE> {} 4", factory.name()))
    }

    pub fn store_exists(path: &Path) -> Self {
        Self::new(format!("Store already exists: {}", path.display()))
            .with_context("init refuses to overwrite existing record files")
            .with_suggestions([
                format!("TRY: Overwrite it: sift init --force {}", path.display()),
                "TRY: Pick another directory".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use sift_jobs::JobRegistry;
    use std::path::PathBuf;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While scanning")
            .with_suggestion("TRY: again");

        let display = err.to_string();
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While scanning"));
        assert!(display.contains("  TRY: again"));
    }

    #[test]
    fn test_store_not_found_suggests_init() {
        let err = HelpfulError::store_not_found(&PathBuf::from("/no/such/store"));
        let display = err.to_string();
        assert!(display.contains("/no/such/store"));
        assert!(display.contains("sift init /no/such/store"));
    }

    #[test]
    fn test_bad_job_args_shows_usage() {
        let registry = JobRegistry::new();
        let factory = registry.lookup("countnodes").unwrap();
        let err = HelpfulError::bad_job_args(
            factory,
            &BuildError::MissingArgument { name: "threads" },
        );
        let display = err.to_string();
        assert!(display.contains("missing argument <threads>"));
        assert!(display.contains("Usage: countnodes <threads> [chunks] [probe|raw]"));
    }

    #[test]
    fn test_unknown_job_lists_available() {
        let err = HelpfulError::unknown_job("countedges", ["countnodes", "countrels"]);
        assert!(err.to_string().contains("countnodes, countrels"));
    }
}
