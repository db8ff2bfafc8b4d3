use std::ops::Range;

use crate::{ParameterStore, Result, TrainErr};

/// Maps a flat parameter buffer into named tensors.
///
/// The order is the store's canonical order, captured once. The trainable-only view is a
/// filter over that same order, never a separately computed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLayout {
    entries: Vec<LayoutEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LayoutEntry {
    name: String,
    len: usize,
    trainable: bool,
}

impl ParameterLayout {
    /// Captures the layout of `store`.
    pub fn new(store: &ParameterStore) -> Self {
        let entries = store
            .iter()
            .map(|(name, param)| LayoutEntry {
                name: name.to_string(),
                len: param.len(),
                trainable: param.requires_grad(),
            })
            .collect();

        Self { entries }
    }

    fn selected(&self, trainable_only: bool) -> impl Iterator<Item = &LayoutEntry> {
        self.entries
            .iter()
            .filter(move |entry| !trainable_only || entry.trainable)
    }

    /// The total amount of scalar elements in the selected parameters.
    pub fn size(&self, trainable_only: bool) -> usize {
        self.selected(trainable_only).map(|entry| entry.len).sum()
    }

    /// The selected parameters with their range in the flat buffer, in order.
    pub fn ranges(&self, trainable_only: bool) -> impl Iterator<Item = (&str, Range<usize>)> {
        self.selected(trainable_only).scan(0, |offset, entry| {
            let range = *offset..*offset + entry.len;
            *offset = range.end;
            Some((entry.name.as_str(), range))
        })
    }

    fn check_buffer(&self, len: usize, trainable_only: bool) -> Result<()> {
        let expected = self.size(trainable_only);

        if len != expected {
            return Err(TrainErr::SizeMismatch {
                what: "parameters buffer",
                got: len,
                expected,
            });
        }

        Ok(())
    }

    /// Flattens the selected parameters of `store` into `buffer`.
    ///
    /// # Returns
    /// A size mismatch error if `buffer` doesn't have exactly `size(trainable_only)`
    /// elements, in which case `buffer` is left untouched.
    pub fn copy_to_buffer(
        &self,
        store: &ParameterStore,
        buffer: &mut [f32],
        trainable_only: bool,
    ) -> Result<()> {
        self.check_buffer(buffer.len(), trainable_only)?;
        self.check_store(store, trainable_only)?;

        for (name, range) in self.ranges(trainable_only) {
            if let Some(param) = store.get(name) {
                buffer[range].copy_from_slice(param.data().data());
            }
        }

        Ok(())
    }

    /// Unflattens `buffer` back into the selected parameters of `store`, in place.
    ///
    /// # Returns
    /// A size mismatch error if `buffer` doesn't have exactly `size(trainable_only)`
    /// elements, in which case `store` is left untouched.
    pub fn copy_from_buffer(
        &self,
        store: &mut ParameterStore,
        buffer: &[f32],
        trainable_only: bool,
    ) -> Result<()> {
        self.check_buffer(buffer.len(), trainable_only)?;
        self.check_store(store, trainable_only)?;

        for (name, range) in self.ranges(trainable_only) {
            if let Some(param) = store.get_mut(name) {
                param.data_mut().data_mut().copy_from_slice(&buffer[range]);
            }
        }

        Ok(())
    }

    /// Checks that `store` still matches the captured layout.
    fn check_store(&self, store: &ParameterStore, trainable_only: bool) -> Result<()> {
        for entry in self.selected(trainable_only) {
            let len = store.get(&entry.name).map(|param| param.len());

            if len != Some(entry.len) {
                return Err(TrainErr::SizeMismatch {
                    what: "parameter",
                    got: len.unwrap_or_default(),
                    expected: entry.len,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Parameter, Tensor};

    fn store() -> ParameterStore {
        let mut store = ParameterStore::new();
        let entries = [
            ("b", vec![3.], false),
            ("a", vec![1., 2.], true),
            ("c", vec![4., 5., 6.], true),
        ];

        for (name, data, requires_grad) in entries {
            let data = Tensor::new(vec![data.len()], data).unwrap();
            store
                .insert(name, Parameter::new(data, requires_grad))
                .unwrap();
        }

        store
    }

    #[test]
    fn trainable_ranges_are_a_filter_of_the_full_order() {
        let layout = ParameterLayout::new(&store());

        let full: Vec<_> = layout.ranges(false).collect();
        assert_eq!(full, [("a", 0..2), ("b", 2..3), ("c", 3..6)]);

        let trainable: Vec<_> = layout.ranges(true).collect();
        assert_eq!(trainable, [("a", 0..2), ("c", 2..5)]);
    }

    #[test]
    fn copies_follow_the_canonical_order() {
        let store = store();
        let layout = ParameterLayout::new(&store);

        let mut full = vec![0.; layout.size(false)];
        layout.copy_to_buffer(&store, &mut full, false).unwrap();
        assert_eq!(full, [1., 2., 3., 4., 5., 6.]);

        let mut trainable = vec![0.; layout.size(true)];
        layout.copy_to_buffer(&store, &mut trainable, true).unwrap();
        assert_eq!(trainable, [1., 2., 4., 5., 6.]);
    }

    #[test]
    fn copy_from_buffer_leaves_frozen_parameters_alone() {
        let mut store = store();
        let layout = ParameterLayout::new(&store);

        layout
            .copy_from_buffer(&mut store, &[9., 9., 9., 9., 9.], true)
            .unwrap();

        assert_eq!(store.get("a").unwrap().data().data(), &[9., 9.]);
        assert_eq!(store.get("b").unwrap().data().data(), &[3.]);
    }

    #[test]
    fn wrong_buffer_size_touches_nothing() {
        let mut store = store();
        let layout = ParameterLayout::new(&store);

        let mut short = vec![-1.; layout.size(true) - 1];
        let res = layout.copy_to_buffer(&store, &mut short, true);
        assert!(matches!(
            res,
            Err(TrainErr::SizeMismatch {
                got: 4,
                expected: 5,
                ..
            })
        ));
        assert!(short.iter().all(|&x| x == -1.));

        let before = store.clone();
        let res = layout.copy_from_buffer(&mut store, &[0.; 6], true);
        assert!(matches!(res, Err(TrainErr::SizeMismatch { .. })));
        assert_eq!(store, before);
    }
}
