use crate::types::{Dataset, Record};
use std::collections::BTreeMap;

/// Which categories the user currently wants on the map.
///
/// Every category starts enabled the first time it is seen; afterwards the
/// last choice sticks for the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorySelection {
    choices: BTreeMap<String, bool>,
}

impl CategorySelection {
    pub fn with_all_enabled<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = Self::default();
        selection.sync(categories);
        selection
    }

    /// Only the given categories are enabled; the rest of `known` are disabled.
    pub fn only<I, S>(known: &[String], enabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = Self {
            choices: known.iter().map(|c| (c.clone(), false)).collect(),
        };
        for category in enabled {
            selection.set(category, true);
        }
        selection
    }

    /// Registers categories not seen before as enabled. Existing choices are kept.
    pub fn sync<I, S>(&mut self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for category in categories {
            self.choices.entry(category.into()).or_insert(true);
        }
    }

    pub fn set(&mut self, category: impl Into<String>, enabled: bool) {
        self.choices.insert(category.into(), enabled);
    }

    /// Records the state of one control. Returns false for labels with no
    /// control, which are left out.
    pub fn update(&mut self, category: &str, enabled: bool) -> bool {
        match self.choices.get_mut(category) {
            Some(choice) => {
                *choice = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, category: &str) -> bool {
        self.choices.get(category).copied().unwrap_or(false)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.choices
            .iter()
            .filter(|(_, on)| **on)
            .map(|(c, _)| c.as_str())
    }

    /// All known categories in sorted order with their state.
    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        self.choices.iter().map(|(c, on)| (c.as_str(), *on))
    }

    pub fn is_empty(&self) -> bool {
        self.enabled().next().is_none()
    }
}

/// Rows whose category is enabled, in dataset order. Rows without a category
/// never match since there is no control to select them.
pub fn filter_records<'a>(dataset: &'a Dataset, selection: &CategorySelection) -> Vec<&'a Record> {
    dataset
        .records
        .iter()
        .filter(|r| r.category.as_deref().is_some_and(|c| selection.is_enabled(c)))
        .collect()
}
