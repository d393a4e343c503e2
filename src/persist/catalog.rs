//! Loader registry.

use std::collections::HashMap;
use std::fmt;

use super::context::ModelLoadContext;
use super::repository::ModelRepository;
use super::PersistError;
use crate::error::Result;
use crate::learner::{LinearScorer, ScalarPredictor, SoftmaxModel, VectorPredictor};
use crate::multiclass::MultiToBinaryPredictor;

/// Loads a scalar-output model from a context positioned after its signature.
pub type ScalarLoader =
    fn(&mut ModelLoadContext<'_>, &ComponentCatalog) -> Result<Box<dyn ScalarPredictor>>;

/// Loads a vector-output model from a context positioned after its signature.
pub type VectorLoader =
    fn(&mut ModelLoadContext<'_>, &ComponentCatalog) -> Result<Box<dyn VectorPredictor>>;

/// Registry of model loaders, keyed by loader signature.
///
/// Composite models receive the catalog so they can load their sub-models.
#[derive(Clone, Default)]
pub struct ComponentCatalog {
    scalar: HashMap<String, ScalarLoader>,
    vector: HashMap<String, VectorLoader>,
}

impl fmt::Debug for ComponentCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scalar: Vec<_> = self.scalar.keys().collect();
        let mut vector: Vec<_> = self.vector.keys().collect();
        scalar.sort();
        vector.sort();
        f.debug_struct("ComponentCatalog")
            .field("scalar", &scalar)
            .field("vector", &vector)
            .finish()
    }
}

impl ComponentCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every model type of this crate registered.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register_scalar(LinearScorer::LOADER_SIGNATURE, LinearScorer::load);
        catalog.register_vector(SoftmaxModel::LOADER_SIGNATURE, SoftmaxModel::load_boxed);
        catalog.register_vector(
            MultiToBinaryPredictor::LOADER_SIGNATURE,
            MultiToBinaryPredictor::load_boxed,
        );
        catalog
    }

    pub fn register_scalar(&mut self, signature: &str, loader: ScalarLoader) {
        self.scalar.insert(signature.to_string(), loader);
    }

    pub fn register_vector(&mut self, signature: &str, loader: VectorLoader) {
        self.vector.insert(signature.to_string(), loader);
    }

    /// Load scalar sub-model `name` of `parent`.
    pub fn load_scalar(
        &self,
        parent: &ModelLoadContext<'_>,
        name: &str,
    ) -> Result<Box<dyn ScalarPredictor>> {
        self.load_root_scalar(parent.repository(), &parent.sub_dir(name))
    }

    /// Load vector sub-model `name` of `parent`.
    pub fn load_vector(
        &self,
        parent: &ModelLoadContext<'_>,
        name: &str,
    ) -> Result<Box<dyn VectorPredictor>> {
        self.load_root_vector(parent.repository(), &parent.sub_dir(name))
    }

    /// Load the scalar model stored in directory `dir`.
    pub fn load_root_scalar(
        &self,
        repo: &ModelRepository,
        dir: &str,
    ) -> Result<Box<dyn ScalarPredictor>> {
        let mut ctx = ModelLoadContext::open(repo, dir)?;
        let signature = ctx.read_string()?;
        let loader = self
            .scalar
            .get(&signature)
            .ok_or(PersistError::UnknownLoader(signature))?;
        tracing::debug!(dir, "loading scalar model");
        loader(&mut ctx, self)
    }

    /// Load the vector model stored in directory `dir`.
    pub fn load_root_vector(
        &self,
        repo: &ModelRepository,
        dir: &str,
    ) -> Result<Box<dyn VectorPredictor>> {
        let mut ctx = ModelLoadContext::open(repo, dir)?;
        let signature = ctx.read_string()?;
        let loader = self
            .vector
            .get(&signature)
            .ok_or(PersistError::UnknownLoader(signature))?;
        tracing::debug!(dir, "loading vector model");
        loader(&mut ctx, self)
    }
}
