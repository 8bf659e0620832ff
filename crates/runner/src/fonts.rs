//! Font inventory
//!
//! Tracks the `font-family` values actually computed on rendered elements,
//! per page route. Rebuilt fresh each run and emitted as `fonts.json` for
//! cross-browser font-loading verification.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Fonts detected per page route
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FontInventory {
    /// Route -> computed font-family stacks seen on that page
    pub pages: BTreeMap<String, BTreeSet<String>>,
}

impl FontInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one capture's detected fonts into the route's set. Captures of
    /// the same route at different viewports union together.
    pub fn record<I>(&mut self, route: &str, fonts: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.pages.entry(route.to_string()).or_default().extend(fonts);
    }

    /// All distinct font stacks across the site
    pub fn all_fonts(&self) -> BTreeSet<&str> {
        self.pages
            .values()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_unions_across_viewports() {
        let mut inventory = FontInventory::new();
        inventory.record("/", vec!["Georgia, serif".to_string()]);
        inventory.record(
            "/",
            vec![
                "Georgia, serif".to_string(),
                "\"P22 Mackinac\", serif".to_string(),
            ],
        );

        assert_eq!(inventory.pages.len(), 1);
        assert_eq!(inventory.pages["/"].len(), 2);
    }

    #[test]
    fn test_all_fonts_deduplicates_across_pages() {
        let mut inventory = FontInventory::new();
        inventory.record("/", vec!["Georgia, serif".to_string()]);
        inventory.record("/publications/", vec!["Georgia, serif".to_string()]);

        assert_eq!(inventory.all_fonts().len(), 1);
    }

    #[test]
    fn test_serializes_keyed_by_route() {
        let mut inventory = FontInventory::new();
        inventory.record("/talks/", vec!["monospace".to_string()]);

        let json = serde_json::to_value(&inventory).unwrap();
        assert_eq!(json["pages"]["/talks/"][0], "monospace");
    }
}
