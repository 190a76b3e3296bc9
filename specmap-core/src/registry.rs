//! Ordered collection of derived maps.

use crate::map::DerivedMap;
use log::debug;

/// Maps in creation order, with a running count of every map ever added.
///
/// Names are not unique; removal by name drops every match.
#[derive(Debug, Clone, Default)]
pub struct MapRegistry {
    maps: Vec<DerivedMap>,
    created: usize,
}

impl MapRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a map and returns its index.
    pub fn add(&mut self, map: DerivedMap) -> usize {
        debug!("registering map '{}' ({})", map.name(), map.map_type());
        self.maps.push(map);
        self.created += 1;
        self.maps.len() - 1
    }

    /// Removes the map at `index`, if any.
    pub fn remove_at(&mut self, index: usize) -> Option<DerivedMap> {
        (index < self.maps.len()).then(|| self.maps.remove(index))
    }

    /// Removes every map named `name`; returns how many were removed.
    pub fn remove_by_name(&mut self, name: &str) -> usize {
        let before = self.maps.len();
        self.maps.retain(|m| m.name() != name);
        before - self.maps.len()
    }

    /// Names of the current maps, in order.
    #[must_use]
    pub fn names_in_order(&self) -> Vec<&str> {
        self.maps.iter().map(DerivedMap::name).collect()
    }

    /// Number of maps added over the registry's lifetime.
    #[must_use]
    pub fn count_created(&self) -> usize {
        self.created
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DerivedMap> {
        self.maps.get(index)
    }

    /// First map named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&DerivedMap> {
        self.maps.iter().find(|m| m.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedMap> {
        self.maps.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn map(name: &str) -> DerivedMap {
        DerivedMap::new(name, "test", array![1.0], array![0.0], array![0.0]).unwrap()
    }

    #[test]
    fn test_remove_by_name_removes_duplicates() {
        let mut registry = MapRegistry::new();
        registry.add(map("a"));
        registry.add(map("b"));
        registry.add(map("a"));
        assert_eq!(registry.remove_by_name("a"), 2);
        assert_eq!(registry.names_in_order(), vec!["b"]);
        assert_eq!(registry.count_created(), 3);
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let mut registry = MapRegistry::new();
        assert_eq!(registry.add(map("a")), 0);
        assert!(registry.remove_at(3).is_none());
        assert_eq!(registry.remove_at(0).unwrap().name(), "a");
        assert!(registry.is_empty());
        assert_eq!(registry.count_created(), 1);
    }
}
