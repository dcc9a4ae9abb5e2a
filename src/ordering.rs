use std::collections::BTreeMap;

/// Display priority of categories: earlier entries are shown first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryOrder {
    names: Vec<String>,
}

impl CategoryOrder {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Position of `category` in the list; unlisted and missing categories rank last.
    pub fn rank(&self, category: Option<&str>) -> usize {
        category
            .and_then(|name| self.names.iter().position(|n| n == name))
            .unwrap_or(usize::MAX)
    }
}

/// Tags sorted by their category's rank. Tags of equal rank keep their input order.
pub fn order_tags(
    tags: &[String],
    assignments: &BTreeMap<String, String>,
    order: &CategoryOrder,
) -> Vec<String> {
    let mut sorted = tags.to_vec();
    // sort_by_key is stable
    sorted.sort_by_key(|tag| order.rank(assignments.get(tag).map(String::as_str)));
    sorted
}
