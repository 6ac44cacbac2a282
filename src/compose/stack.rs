//! Composition stack data model

/// One file's contribution to a composed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    name: String,
    /// Processed source text; rewritten in place by later stages
    pub body: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    /// Logical name of the file this unit came from
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Units ordered general to specific, unique by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionStack {
    units: Vec<SourceUnit>,
}

impl CompositionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit; returns `false` and drops it if the name is already present
    pub fn push(&mut self, unit: SourceUnit) -> bool {
        if self.contains(unit.name()) {
            return false;
        }
        self.units.push(unit);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.iter().any(|u| u.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&SourceUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn first(&self) -> Option<&SourceUnit> {
        self.units.first()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceUnit> {
        self.units.iter()
    }

    /// Mutable access to unit bodies; names stay fixed
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, SourceUnit> {
        self.units.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(SourceUnit::name).collect()
    }

    pub fn into_units(self) -> Vec<SourceUnit> {
        self.units
    }
}

impl<'a> IntoIterator for &'a CompositionStack {
    type Item = &'a SourceUnit;
    type IntoIter = std::slice::Iter<'a, SourceUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_dedups_by_name() {
        let mut stack = CompositionStack::new();
        assert!(stack.push(SourceUnit::new("a.html", "first")));
        assert!(stack.push(SourceUnit::new("b.html", "b")));
        assert!(!stack.push(SourceUnit::new("a.html", "second")));

        assert_eq!(stack.names(), vec!["a.html", "b.html"]);
        assert_eq!(stack.get("a.html").map(|u| u.body.as_str()), Some("first"));
    }

    #[test]
    fn test_bodies_are_mutable() {
        let mut stack = CompositionStack::new();
        stack.push(SourceUnit::new("a.html", "x"));
        for unit in stack.iter_mut() {
            unit.body.push('y');
        }
        assert_eq!(stack.first().map(|u| u.body.as_str()), Some("xy"));
    }
}
