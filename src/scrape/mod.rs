//! Readers for the two upstream pages.
//!
//! Both endpoints are third-party surfaces that change without notice. All
//! knowledge of their URLs and payload shapes lives here, so adapting to a
//! new markup touches only these files.

pub mod results;
pub mod suggestions;

pub use results::CountExtractor;
pub use suggestions::SuggestionExpander;

/// Trim and collapse runs of whitespace to single spaces.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
