//! Cross-site request forgery token extraction.

use cabsdock_common::{CabsError, Result};
use scraper::{Html, Selector};

const CSRF_FIELD: &str = "csrf_token";

/// Reads the `value` of the `<input name="csrf_token">` element in `html`.
///
/// `source` only labels the error.
pub fn extract_csrf_token(html: &str, source: &str) -> Result<String> {
    let missing = || CabsError::Extraction {
        what: "CSRF token",
        url: source.to_string(),
    };

    let selector = Selector::parse(&format!("input[name=\"{}\"]", CSRF_FIELD)).map_err(|_| missing())?;
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|input| input.value().attr("value"))
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(missing)
}
