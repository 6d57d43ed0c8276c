//! Data sources and the registry used to open them.
//!
//! A data source is a named collection of layers. Statements may join
//! against tables of a secondary data source; the registry resolves those
//! data source names.

use crate::layer::LayerRef;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use featql_core::{Error, Result};

/// Shared handle to a data source.
pub type DataSourceRef = Rc<dyn DataSource>;

/// A named collection of layers.
pub trait DataSource {
    /// Returns the data source name.
    fn name(&self) -> &str;

    /// Returns the number of layers.
    fn layer_count(&self) -> usize;

    /// Returns a layer by position.
    fn layer(&self, index: usize) -> Option<LayerRef>;

    /// Finds a layer by name, ignoring case.
    fn layer_by_name(&self, name: &str) -> Option<LayerRef>;
}

/// Opens data sources by name.
pub trait DataSourceRegistry {
    fn open(&self, name: &str) -> Result<DataSourceRef>;
}

/// A data source holding layers in insertion order.
pub struct MemoryDataSource {
    name: String,
    layers: Vec<(String, LayerRef)>,
}

impl MemoryDataSource {
    /// Creates an empty data source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    /// Adds a layer under its own name.
    pub fn add_layer(&mut self, layer: LayerRef) -> Result<()> {
        let name = layer.borrow().name().to_string();
        if self.layers.iter().any(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            return Err(Error::invalid_operation(alloc::format!(
                "Layer already exists: {}",
                name
            )));
        }
        self.layers.push((name, layer));
        Ok(())
    }

    /// Adds a layer, builder style.
    pub fn with_layer(mut self, layer: LayerRef) -> Result<Self> {
        self.add_layer(layer)?;
        Ok(self)
    }

    /// Returns all layer names.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|(n, _)| n.as_str()).collect()
    }
}

impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer(&self, index: usize) -> Option<LayerRef> {
        self.layers.get(index).map(|(_, l)| l.clone())
    }

    fn layer_by_name(&self, name: &str) -> Option<LayerRef> {
        self.layers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, l)| l.clone())
    }
}

/// Registry of data sources keyed by name.
#[derive(Default)]
pub struct MemoryRegistry {
    sources: BTreeMap<String, DataSourceRef>,
    /// Every successful or failed `open` call, in order.
    opened: core::cell::RefCell<Vec<String>>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a data source under its own name.
    pub fn register(&mut self, source: DataSourceRef) {
        self.sources.insert(source.name().to_string(), source);
    }

    /// Names passed to `open` so far.
    pub fn open_requests(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

impl DataSourceRegistry for MemoryRegistry {
    fn open(&self, name: &str) -> Result<DataSourceRef> {
        self.opened.borrow_mut().push(name.to_string());
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| Error::data_source_not_found(name))
    }
}
