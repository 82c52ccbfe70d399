use std::collections::HashMap;

/// Column names of one reader and their positions.
///
/// Shared by the reader and every row it hands out, so named field access
/// works on rows that outlive the reader.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColNames {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColNames {
    /// Index `names`. A duplicated name resolves to its first column.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let mut positions = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            positions.entry(name.clone()).or_insert(i);
        }
        Self { names, positions }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_resolve_to_first_column() {
        let names = ColNames::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(names.index_of("a"), Some(0));
        assert_eq!(names.index_of("b"), Some(1));
        assert_eq!(names.index_of("c"), None);
        assert_eq!(names.len(), 3);
    }
}
