use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::category::Category;
use super::window::Window;

/// Summed points per category for one window.
///
/// Every category is always present; categories without qualifying events
/// report zero, so callers never need existence checks. This also holds for
/// deserialized values: missing keys are filled with zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<Category, i64>",
    into = "BTreeMap<Category, i64>"
)]
pub struct WindowTotals(BTreeMap<Category, i64>);

impl WindowTotals {
    /// Totals with every category at zero.
    pub fn zeroed() -> Self {
        Self(Category::ALL.into_iter().map(|c| (c, 0)).collect())
    }

    /// Build totals from per-category sums, zero-filling the rest.
    ///
    /// Repeated categories are added together.
    pub fn from_sums(sums: impl IntoIterator<Item = (Category, i64)>) -> Self {
        let mut totals = Self::zeroed();
        for (category, points) in sums {
            *totals.0.entry(category).or_insert(0) += points;
        }
        totals
    }

    pub fn get(&self, category: Category) -> i64 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, i64)> + '_ {
        self.0.iter().map(|(c, p)| (*c, *p))
    }
}

impl Default for WindowTotals {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl From<BTreeMap<Category, i64>> for WindowTotals {
    fn from(map: BTreeMap<Category, i64>) -> Self {
        Self::from_sums(map)
    }
}

impl From<WindowTotals> for BTreeMap<Category, i64> {
    fn from(totals: WindowTotals) -> Self {
        totals.0
    }
}

/// Totals for all three windows, evaluated at the same instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllWindowTotals {
    pub short: WindowTotals,
    pub medium: WindowTotals,
    pub unbounded: WindowTotals,
}

impl AllWindowTotals {
    pub fn get(&self, window: Window) -> &WindowTotals {
        match window {
            Window::Short => &self.short,
            Window::Medium => &self.medium,
            Window::Unbounded => &self.unbounded,
        }
    }
}
