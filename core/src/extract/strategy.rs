//! Ordered fallback strategies.
//!
//! Each site-structure variant is a named entry in a table. Adding a variant
//! means adding a row, not another branch.

use scraper::Html;

pub struct Strategy<T> {
    pub name: &'static str,
    pub run: fn(&Html) -> Option<T>,
}

impl<T> Strategy<T> {
    pub const fn new(name: &'static str, run: fn(&Html) -> Option<T>) -> Self {
        Self { name, run }
    }
}

/// Runs strategies in order and returns the first hit with its name.
pub fn first_success<T>(strategies: &[Strategy<T>], doc: &Html) -> Option<(&'static str, T)> {
    strategies.iter().find_map(|s| {
        let hit = (s.run)(doc);
        if hit.is_some() {
            tracing::debug!(strategy = s.name, "strategy matched");
        }
        hit.map(|v| (s.name, v))
    })
}

/// Tries a list of selectors and returns the first non-empty value `f` produces.
pub fn first_selector<T>(
    doc: &Html,
    selectors: &[&str],
    mut f: impl FnMut(scraper::ElementRef<'_>) -> Option<T>,
) -> Option<T> {
    selectors.iter().find_map(|css| {
        super::page::select_all(doc, css)
            .into_iter()
            .find_map(&mut f)
    })
}
