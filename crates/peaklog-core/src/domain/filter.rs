//! Mountain list filtering

use serde::{Deserialize, Serialize};

use super::mountain::{Mountain, MountainCategory};

/// Climbed-status criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimbedStatus {
    #[default]
    All,
    Climbed,
    Unclimbed,
}

/// Filter criteria for the mountain list
///
/// All criteria are combined with AND logic; empty criteria match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountainFilter {
    /// Substring that must appear in the name
    pub search_text: String,
    /// Accepted categories (empty = any)
    pub categories: Vec<MountainCategory>,
    pub climbed_status: ClimbedStatus,
}

impl MountainFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_text(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    pub fn with_category(mut self, category: MountainCategory) -> Self {
        self.categories.push(category);
        self
    }

    pub fn with_climbed_status(mut self, status: ClimbedStatus) -> Self {
        self.climbed_status = status;
        self
    }

    /// Returns true if the mountain passes every criterion
    pub fn matches(&self, mountain: &Mountain) -> bool {
        if !self.search_text.is_empty() && !mountain.name.contains(&self.search_text) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&mountain.category) {
            return false;
        }
        match self.climbed_status {
            ClimbedStatus::All => true,
            ClimbedStatus::Climbed => mountain.is_climbed,
            ClimbedStatus::Unclimbed => !mountain.is_climbed,
        }
    }

    /// Applies the filter to a slice, preserving order
    pub fn apply<'a>(&self, mountains: &'a [Mountain]) -> Vec<&'a Mountain> {
        mountains.iter().filter(|m| self.matches(m)).collect()
    }
}
