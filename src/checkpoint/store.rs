use std::collections::{BTreeMap, btree_map::Entry};

use serde::{Deserialize, Serialize};

use super::Parameter;
use crate::{Result, TrainErr};

/// The canonical set of named parameters.
///
/// Iteration always follows the lexicographic order of the parameter names, every
/// flat buffer produced from a store relies on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterStore {
    params: BTreeMap<String, Parameter>,
}

impl ParameterStore {
    /// Creates a new empty `ParameterStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new parameter.
    ///
    /// # Arguments
    /// * `name` - The unique name of the parameter.
    /// * `param` - The parameter itself.
    ///
    /// # Returns
    /// A configuration error if there's already a parameter with that name.
    pub fn insert(&mut self, name: impl Into<String>, param: Parameter) -> Result<()> {
        match self.params.entry(name.into()) {
            Entry::Occupied(e) => Err(TrainErr::Configuration(format!(
                "parameter {} is already defined",
                e.key()
            ))),
            Entry::Vacant(e) => {
                e.insert(param);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    /// The amount of parameters in the store.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates the parameters in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|(name, param)| (name.as_str(), param))
    }

    /// Iterates the parameters mutably in canonical order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Parameter)> {
        self.params
            .iter_mut()
            .map(|(name, param)| (name.as_str(), param))
    }

    /// Iterates the trainable parameters in canonical order.
    pub fn trainable(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.iter().filter(|(_, param)| param.requires_grad())
    }

    /// Returns the total amount of scalar elements.
    ///
    /// # Arguments
    /// * `trainable_only` - Whether to count only the trainable parameters.
    pub fn numel(&self, trainable_only: bool) -> usize {
        self.iter()
            .filter(|(_, param)| !trainable_only || param.requires_grad())
            .map(|(_, param)| param.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tensor;

    fn store() -> ParameterStore {
        let mut store = ParameterStore::new();
        store
            .insert("fc.weight", Parameter::new(Tensor::zeros(&[2, 3]), true))
            .unwrap();
        store
            .insert("fc.bias", Parameter::new(Tensor::zeros(&[3]), false))
            .unwrap();
        store
            .insert("emb", Parameter::new(Tensor::zeros(&[4]), true))
            .unwrap();
        store
    }

    #[test]
    fn iterates_in_lexicographic_order() {
        let store = store();
        let names: Vec<_> = store.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["emb", "fc.bias", "fc.weight"]);

        let trainable: Vec<_> = store.trainable().map(|(name, _)| name).collect();
        assert_eq!(trainable, ["emb", "fc.weight"]);
    }

    #[test]
    fn rejects_duplicates() {
        let mut store = store();
        let res = store.insert("emb", Parameter::new(Tensor::zeros(&[1]), true));
        assert!(matches!(res, Err(TrainErr::Configuration(_))));
        assert_eq!(store.get("emb").unwrap().len(), 4);
    }

    #[test]
    fn counts_elements() {
        let store = store();
        assert_eq!(store.numel(false), 13);
        assert_eq!(store.numel(true), 10);
    }
}
