//! Annotation store interface.
//!
//! The timeline never owns annotations.  It looks classes up by name through
//! [`AnnotationStore`] when generating aligned epochs or evaluating mask
//! predicates.  [`AnnotationSet`] is a simple in-memory implementation for
//! callers that already hold parsed annotations.
use std::collections::BTreeMap;

use crate::interval::{Interval, Tp};

/// Opaque reference to one annotation class inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationHandle(pub usize);

/// One annotated event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationInstance {
    /// Instance identifier (free text, often empty or the class name).
    pub id: String,
    pub interval: Interval,
    /// Optional textual value, e.g. a stage label or an artifact subtype.
    pub value: Option<String>,
}

/// Source of interval annotations, keyed by class name.
pub trait AnnotationStore {
    /// All class names, in store order.
    fn names(&self) -> Vec<String>;

    /// Handle for class `name`, or `None` if the class does not exist.
    fn find(&self, name: &str) -> Option<AnnotationHandle>;

    /// Instances of a class overlapping `window`, ordered by start.
    fn extract(&self, handle: AnnotationHandle, window: &Interval) -> Vec<AnnotationInstance>;

    /// Every instance of a class.
    fn instances(&self, handle: AnnotationHandle) -> Vec<AnnotationInstance> {
        self.extract(handle, &Interval::new(0, Tp::MAX))
    }
}

/// In-memory annotation store.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    classes: Vec<(String, Vec<AnnotationInstance>)>,
    by_name: BTreeMap<String, usize>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one instance to `class`, creating the class if needed.
    pub fn add(&mut self, class: &str, interval: Interval, value: Option<&str>) {
        let idx = match self.by_name.get(class) {
            Some(&i) => i,
            None => {
                self.classes.push((class.to_string(), Vec::new()));
                self.by_name.insert(class.to_string(), self.classes.len() - 1);
                self.classes.len() - 1
            }
        };
        let list = &mut self.classes[idx].1;
        list.push(AnnotationInstance {
            id: class.to_string(),
            interval,
            value: value.map(str::to_string),
        });
        list.sort_by_key(|a| a.interval);
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, class: &str, interval: Interval, value: Option<&str>) -> Self {
        self.add(class, interval, value);
        self
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl AnnotationStore for AnnotationSet {
    fn names(&self) -> Vec<String> {
        self.classes.iter().map(|(n, _)| n.clone()).collect()
    }

    fn find(&self, name: &str) -> Option<AnnotationHandle> {
        self.by_name.get(name).map(|&i| AnnotationHandle(i))
    }

    fn extract(&self, handle: AnnotationHandle, window: &Interval) -> Vec<AnnotationInstance> {
        let Some((_, list)) = self.classes.get(handle.0) else {
            return vec![];
        };
        list.iter()
            .take_while(|a| a.interval.start <= window.stop)
            .filter(|a| a.interval.overlaps(window))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_by_overlap() {
        let set = AnnotationSet::new()
            .with("N2", Interval::new(0, 30), None)
            .with("N2", Interval::new(60, 90), None)
            .with("arousal", Interval::point(45), Some("spontaneous"));
        let h = set.find("N2").unwrap();
        assert_eq!(set.extract(h, &Interval::new(20, 70)).len(), 2);
        assert_eq!(set.extract(h, &Interval::new(30, 60)).len(), 0);

        let a = set.find("arousal").unwrap();
        let hits = set.extract(a, &Interval::new(30, 60));
        assert_eq!(hits[0].value.as_deref(), Some("spontaneous"));
        assert!(set.find("REM").is_none());
        assert_eq!(set.names(), vec!["N2", "arousal"]);
    }
}
