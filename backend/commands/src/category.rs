/// Command category validation.
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{CATEGORY_GENERAL, CATEGORY_PLUGIN, CATEGORY_SYSTEM};

static CATEGORY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("category pattern is valid"));

pub const CORE_CATEGORIES: [&str; 3] = [CATEGORY_GENERAL, CATEGORY_SYSTEM, CATEGORY_PLUGIN];

/// Tracks the categories commands may be filed under.
#[derive(Debug, Clone)]
pub struct CategoryValidator {
    categories: BTreeSet<String>,
}

impl CategoryValidator {
    pub fn new() -> Self {
        Self {
            categories: CORE_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Lowercase letters, digits, `_` and `-`, starting with a letter.
    pub fn validate_category_name(name: &str) -> bool {
        CATEGORY_NAME.is_match(name)
    }

    pub fn is_valid_category(&self, name: &str) -> bool {
        self.categories.contains(name)
    }

    /// Admit a category. Returns whether the name is valid; adding a
    /// known category again is a no-op that still returns true.
    pub fn add_category(&mut self, name: &str) -> bool {
        if !Self::validate_category_name(name) {
            return false;
        }
        self.categories.insert(name.to_string());
        true
    }

    /// Core categories cannot be removed.
    pub fn remove_category(&mut self, name: &str) -> bool {
        if CORE_CATEGORIES.contains(&name) {
            return false;
        }
        self.categories.remove(name)
    }

    pub fn get_all_categories(&self) -> Vec<String> {
        self.categories.iter().cloned().collect()
    }
}

impl Default for CategoryValidator {
    fn default() -> Self {
        Self::new()
    }
}
