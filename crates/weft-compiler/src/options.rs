//! Compiler configuration.

use rustc_hash::FxHashMap;

use crate::{Error, Result};

/// Default truncation length for display hashes in filenames.
pub const DEFAULT_HASH_DIGEST_LENGTH: usize = 20;

/// Options for one [`Compiler`](crate::Compiler).
///
/// Built fluently; validated once by [`Compiler::new`](crate::Compiler::new).
///
/// ```
/// use weft_compiler::CompilerOptions;
///
/// let options = CompilerOptions::new("/project")
///     .entry("main", "./src/index.js")
///     .entry("admin", "./src/admin.js")
///     .filename("[name].[hash].js")
///     .chunk_filename("[id].[chunkhash].js")
///     .bail(true);
/// ```
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Named entry requests, in declaration order.
    pub entries: Vec<(String, String)>,
    /// Base context (directory) handed to the resolver.
    pub context: String,
    /// Requests resolved and built once, without recursing into their
    /// dependencies.
    pub prefetch: Vec<String>,
    /// Filename template for entry (runtime) chunks.
    pub filename: String,
    /// Filename template for non-entry chunks.
    pub chunk_filename: String,
    /// Truncation length for `[hash]`/`[chunkhash]` substitutions.
    pub hash_digest_length: usize,
    /// Stop scheduling new work after the first error.
    pub bail: bool,
    /// Record factory/build timings on modules.
    pub profile: bool,
    /// Maximum concurrently running resolution/build tasks.
    pub concurrency: usize,
}

impl CompilerOptions {
    /// Create options with the given resolution context and defaults
    /// matching a plain production build.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            context: context.into(),
            prefetch: Vec::new(),
            filename: "[name].js".to_string(),
            chunk_filename: "[id].js".to_string(),
            hash_digest_length: DEFAULT_HASH_DIGEST_LENGTH,
            bail: false,
            profile: false,
            concurrency: default_concurrency(),
        }
    }

    /// Add a named entry point.
    pub fn entry(mut self, name: impl Into<String>, request: impl Into<String>) -> Self {
        self.entries.push((name.into(), request.into()));
        self
    }

    /// Add several named entries from a map. Iteration order of `entries`
    /// becomes declaration order, so pass an ordered map when order matters.
    pub fn entries(mut self, entries: FxHashMap<String, String>) -> Self {
        let mut pairs: Vec<_> = entries.into_iter().collect();
        pairs.sort();
        self.entries.extend(pairs);
        self
    }

    /// Add a one-shot prefetch request.
    pub fn prefetch(mut self, request: impl Into<String>) -> Self {
        self.prefetch.push(request.into());
        self
    }

    /// Filename template for entry chunks (`[name]`, `[id]`, `[hash]`,
    /// `[chunkhash]`).
    pub fn filename(mut self, template: impl Into<String>) -> Self {
        self.filename = template.into();
        self
    }

    /// Filename template for non-entry chunks.
    pub fn chunk_filename(mut self, template: impl Into<String>) -> Self {
        self.chunk_filename = template.into();
        self
    }

    pub fn hash_digest_length(mut self, length: usize) -> Self {
        self.hash_digest_length = length;
        self
    }

    pub fn bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    pub fn profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when no entry is declared, an entry
    /// name repeats, the digest length is out of range, or concurrency is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one entry is required".to_string(),
            ));
        }
        let mut seen = rustc_hash::FxHashSet::default();
        for (name, _) in &self.entries {
            if !seen.insert(name) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate entry name '{name}'"
                )));
            }
        }
        // BLAKE3 hex digests are 64 characters long.
        if self.hash_digest_length == 0 || self.hash_digest_length > 64 {
            return Err(Error::InvalidConfig(format!(
                "hash_digest_length must be within 1..=64, got {}",
                self.hash_digest_length
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_concurrency() -> usize {
    num_cpus::get().min(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_an_entry() {
        let err = CompilerOptions::new("/p").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_entry_names() {
        let options = CompilerOptions::new("/p")
            .entry("main", "./a")
            .entry("main", "./b");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_digest_length() {
        let options = CompilerOptions::new("/p")
            .entry("main", "./a")
            .hash_digest_length(65);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let options = CompilerOptions::new("/p").entry("main", "./a");
        options.validate().unwrap();
        assert_eq!(options.filename, "[name].js");
        assert!(options.concurrency >= 1);
    }
}
