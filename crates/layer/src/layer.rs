//! The source layer contract.

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;
use featql_core::schema::LayerDefn;
use featql_core::{Envelope, Feature, Fid, Geometry, Result};

/// Optional services a layer may provide cheaply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `feature_count` answers without reading features one by one.
    FastFeatureCount,
    /// `get_feature` is efficient.
    RandomRead,
    /// `set_next_by_index` repositions without reading preceding features.
    FastSetNextByIndex,
    /// `extent` answers without reading features one by one.
    FastGetExtent,
}

/// Shared handle to a layer.
pub type LayerRef = Rc<RefCell<dyn SourceLayer>>;

/// Wraps a layer into a shared handle.
pub fn layer_ref<L: SourceLayer + 'static>(layer: L) -> LayerRef {
    Rc::new(RefCell::new(layer))
}

/// A scannable, optionally randomly accessible and filterable table of
/// features with a fixed schema.
///
/// Iteration honors the installed attribute and spatial filters; random
/// access by identifier does not.
pub trait SourceLayer {
    /// Returns the schema.
    fn defn(&self) -> &LayerDefn;

    /// Returns the layer name.
    fn name(&self) -> &str {
        self.defn().name()
    }

    /// Restarts iteration from the first feature.
    fn reset_reading(&mut self);

    /// Returns the next feature passing the installed filters, or None at the end.
    fn next_feature(&mut self) -> Result<Option<Feature>>;

    /// Fetches a feature by identifier, ignoring filters.
    fn get_feature(&mut self, fid: Fid) -> Result<Option<Feature>>;

    /// Positions iteration so that the next feature returned is the one at
    /// `index` among the features passing the filters.
    fn set_next_by_index(&mut self, index: u64) -> Result<()> {
        self.reset_reading();
        for _ in 0..index {
            if self.next_feature()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Installs attribute filter text, or clears it with None or empty text.
    fn set_attribute_filter(&mut self, filter: Option<&str>) -> Result<()>;

    /// Returns the installed attribute filter text.
    fn attribute_filter(&self) -> Option<&str>;

    /// Installs a spatial filter, or clears it with None.
    fn set_spatial_filter(&mut self, geometry: Option<Geometry>);

    /// Returns the installed spatial filter.
    fn spatial_filter(&self) -> Option<&Geometry>;

    /// Marks the named fields as not needed by the caller. Names not in the
    /// schema are an error, except the `OGR_GEOMETRY` and `OGR_STYLE`
    /// pseudo-names.
    fn set_ignored_fields(&mut self, names: &[String]) -> Result<()>;

    /// Skips reading geometries.
    fn set_geometry_ignored(&mut self, ignored: bool);

    /// Number of features passing the filters.
    ///
    /// Returns None if the count is not cheaply known and `force` is false.
    fn feature_count(&mut self, force: bool) -> Result<Option<u64>> {
        if !force {
            return Ok(None);
        }
        self.reset_reading();
        let mut count = 0;
        while self.next_feature()?.is_some() {
            count += 1;
        }
        self.reset_reading();
        Ok(Some(count))
    }

    /// Bounding rectangle of all geometries, or None if unknown or empty.
    fn extent(&mut self, force: bool) -> Result<Option<Envelope>> {
        if !force {
            return Ok(None);
        }
        self.reset_reading();
        let mut extent: Option<Envelope> = None;
        while let Some(feature) = self.next_feature()? {
            if let Some(env) = feature.geometry().and_then(Geometry::envelope) {
                match extent.as_mut() {
                    Some(e) => e.merge(&env),
                    None => extent = Some(env),
                }
            }
        }
        self.reset_reading();
        Ok(extent)
    }

    /// Reports whether a capability is available.
    fn test_capability(&self, capability: Capability) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use featql_core::schema::LayerDefnBuilder;
    use featql_core::{FieldType, Value};

    /// Bare layer relying on every default method.
    struct ListLayer {
        defn: LayerDefn,
        rows: Vec<Feature>,
        cursor: usize,
    }

    impl SourceLayer for ListLayer {
        fn defn(&self) -> &LayerDefn {
            &self.defn
        }
        fn reset_reading(&mut self) {
            self.cursor = 0;
        }
        fn next_feature(&mut self) -> Result<Option<Feature>> {
            let f = self.rows.get(self.cursor).cloned();
            self.cursor += 1;
            Ok(f)
        }
        fn get_feature(&mut self, fid: Fid) -> Result<Option<Feature>> {
            Ok(self.rows.iter().find(|f| f.fid() == Some(fid)).cloned())
        }
        fn set_attribute_filter(&mut self, _filter: Option<&str>) -> Result<()> {
            Ok(())
        }
        fn attribute_filter(&self) -> Option<&str> {
            None
        }
        fn set_spatial_filter(&mut self, _geometry: Option<Geometry>) {}
        fn spatial_filter(&self) -> Option<&Geometry> {
            None
        }
        fn set_ignored_fields(&mut self, _names: &[String]) -> Result<()> {
            Ok(())
        }
        fn set_geometry_ignored(&mut self, _ignored: bool) {}
        fn test_capability(&self, _capability: Capability) -> bool {
            false
        }
    }

    fn list_layer() -> ListLayer {
        let defn = LayerDefnBuilder::new("list")
            .add_field("v", FieldType::Integer)
            .unwrap()
            .build();
        let rows = (0..4)
            .map(|i| Feature::new(i, vec![Value::Integer(i as i32)]).with_geometry(Geometry::point(i as f64, 1.0)))
            .collect();
        ListLayer { defn, rows, cursor: 0 }
    }

    #[test]
    fn test_default_set_next_by_index() {
        let mut layer = list_layer();
        layer.set_next_by_index(2).unwrap();
        assert_eq!(layer.next_feature().unwrap().unwrap().fid(), Some(2));
    }

    #[test]
    fn test_default_count_and_extent() {
        let mut layer = list_layer();
        assert_eq!(layer.feature_count(false).unwrap(), None);
        assert_eq!(layer.feature_count(true).unwrap(), Some(4));
        assert_eq!(layer.extent(false).unwrap(), None);
        assert_eq!(layer.extent(true).unwrap(), Some(Envelope::new(0.0, 1.0, 3.0, 1.0)));
        assert_eq!(layer.name(), "list");
    }
}
