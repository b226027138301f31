//! Configuration options for filing queries.
//!
//! This module provides builder-style option structs for customizing filing queries.
//! Options use the builder pattern for clean, composable configuration.

/// Options for filtering and configuring filing queries.
///
/// This struct allows you to filter filings by form type, skip or limit results,
/// filter by CIK, and control whether amendments are automatically included. It's
/// used across both direct filing operations and index-based queries to provide
/// consistent filtering behavior.
///
/// The default configuration includes amendments and applies no filters, returning
/// all available filings. Use the builder methods to narrow results based on your
/// specific needs.
///
/// # Examples
///
/// Basic usage with form type filter:
/// ```rust
/// # use filingwatch::edgar::FilingOptions;
/// let options = FilingOptions::new()
///     .with_form_type("10-K")
///     .with_limit(10);
/// ```
///
/// Multiple form types with pagination:
/// ```rust
/// # use filingwatch::edgar::FilingOptions;
/// let options = FilingOptions::new()
///     .with_form_types(vec!["10-K".to_string(), "10-Q".to_string()])
///     .with_offset(20)
///     .with_limit(10);
/// ```
///
/// Exclude amendments:
/// ```rust
/// # use filingwatch::edgar::FilingOptions;
/// let options = FilingOptions::new()
///     .with_form_type("S-1")
///     .with_include_amendments(false);
/// ```
#[cfg(feature = "filings")]
#[derive(Debug, Clone)]
pub struct FilingOptions {
    // Which form types to include (e.g., ["10-K"])
    pub form_types: Option<Vec<String>>,

    // Skip this many filings from the start
    pub offset: Option<usize>,

    // Return at most this many filings
    pub limit: Option<usize>,

    // Optional filter for multiple CIKs
    pub ciks: Option<Vec<u64>>,

    /// Whether to automatically include amendment forms (e.g., S-1/A when S-1 is requested).
    /// Defaults to true.
    pub include_amendments: bool,
}

#[cfg(feature = "filings")]
impl Default for FilingOptions {
    fn default() -> Self {
        Self {
            form_types: None,
            offset: None,
            limit: None,
            ciks: None,
            include_amendments: true,
        }
    }
}

#[cfg(feature = "filings")]
impl FilingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form_type(mut self, form_type: impl Into<String>) -> Self {
        let form_type = form_type.into();
        self.form_types = Some(vec![form_type]);
        self
    }

    pub fn with_form_types(mut self, form_types: Vec<String>) -> Self {
        self.form_types = Some(form_types);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cik(mut self, cik: u64) -> Self {
        self.ciks = Some(vec![cik]);
        self
    }

    pub fn with_ciks(mut self, ciks: Vec<u64>) -> Self {
        self.ciks = Some(ciks);
        self
    }

    /// Set whether to include amendment forms automatically.
    ///
    /// When true (default), requesting "S-1" will also include "S-1/A" filings.
    /// When false, only the exact form type specified will be returned.
    pub fn with_include_amendments(mut self, include_amendments: bool) -> Self {
        self.include_amendments = include_amendments;
        self
    }
}
