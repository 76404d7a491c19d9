//! Variable universe: ordered union of variable names plus occurrence counts

use std::collections::{HashMap, HashSet};

/// Ordered union of variable names across waves
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableUniverse {
    /// First-seen order over wave-rank order
    names: Vec<String>,

    /// Variable -> number of waves declaring it
    counts: HashMap<String, usize>,
}

impl VariableUniverse {
    /// Build from per-wave name lists given in wave-rank order
    pub fn build<S: AsRef<str>>(wave_lists: &[Vec<S>]) -> Self {
        let mut universe = Self::default();

        for list in wave_lists {
            let mut in_this_wave = HashSet::new();
            for name in list {
                let name = name.as_ref();
                if !in_this_wave.insert(name) {
                    continue;
                }

                match universe.counts.get_mut(name) {
                    Some(count) => *count += 1,
                    None => {
                        universe.names.push(name.to_string());
                        universe.counts.insert(name.to_string(), 1);
                    }
                }
            }
        }

        universe
    }

    /// Replace occurrence counts with counts over another wave set
    ///
    /// The name order is untouched. A variable missing from `wave_lists`
    /// keeps a count of zero.
    pub fn recount<S: AsRef<str>>(mut self, wave_lists: &[Vec<S>]) -> Self {
        let other = Self::build(wave_lists);
        for name in &self.names {
            self.counts.insert(name.clone(), other.count(name));
        }
        self
    }

    /// Variable names in universe order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Occurrence count (0 for unknown names)
    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// (name, count) in universe order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.names.iter().map(move |n| (n.as_str(), self.count(n)))
    }
}
