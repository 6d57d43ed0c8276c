//! In-memory source layer.
//!
//! `MemoryLayer` keeps its features in a vector and evaluates attribute
//! filters with the default expression evaluator. It records every access
//! so callers can observe how a layer was driven: how many features were
//! read sequentially or by identifier, how often counts were requested and
//! which filter texts were installed.

use crate::layer::{Capability, SourceLayer};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use featql_core::schema::LayerDefn;
use featql_core::{Envelope, Error, Feature, Fid, Geometry, Result, SpecialField, Value};
use featql_expr::{compile_filter, Evaluator, Expr, ExprEvaluator};
use hashbrown::HashMap;

/// Counters describing how a `MemoryLayer` has been accessed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessStats {
    /// Features returned by `next_feature`.
    pub sequential_reads: u64,
    /// Calls to `get_feature`.
    pub random_reads: u64,
    /// Calls to `feature_count`.
    pub count_requests: u64,
    /// Calls to `set_attribute_filter`, clearing included.
    pub filter_installs: u64,
    /// Calls to `reset_reading`.
    pub resets: u64,
}

/// Capabilities advertised by a `MemoryLayer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerCapabilities {
    pub fast_feature_count: bool,
    pub random_read: bool,
    pub fast_set_next_by_index: bool,
    pub fast_get_extent: bool,
}

impl Default for LayerCapabilities {
    fn default() -> Self {
        Self {
            fast_feature_count: true,
            random_read: true,
            fast_set_next_by_index: true,
            fast_get_extent: true,
        }
    }
}

impl LayerCapabilities {
    /// A layer that can only be scanned forward.
    pub fn sequential_only() -> Self {
        Self {
            fast_feature_count: false,
            random_read: false,
            fast_set_next_by_index: false,
            fast_get_extent: false,
        }
    }
}

/// A layer backed by a vector of features.
pub struct MemoryLayer {
    defn: LayerDefn,
    features: Vec<Feature>,
    /// fid → position in `features`
    positions: HashMap<Fid, usize>,
    next_fid: Fid,
    cursor: usize,
    attribute_filter: Option<(String, Expr)>,
    spatial_filter: Option<Geometry>,
    capabilities: LayerCapabilities,
    stats: AccessStats,
    filter_history: Vec<Option<String>>,
}

impl MemoryLayer {
    /// Creates an empty layer with the given schema.
    pub fn new(defn: LayerDefn) -> Self {
        Self {
            defn,
            features: Vec::new(),
            positions: HashMap::new(),
            next_fid: 0,
            cursor: 0,
            attribute_filter: None,
            spatial_filter: None,
            capabilities: LayerCapabilities::default(),
            stats: AccessStats::default(),
            filter_history: Vec::new(),
        }
    }

    /// Sets the advertised capabilities.
    pub fn with_capabilities(mut self, capabilities: LayerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Appends a feature and returns its identifier. A feature without an
    /// identifier gets the next free one.
    pub fn add_feature(&mut self, mut feature: Feature) -> Result<Fid> {
        if feature.field_count() != self.defn.field_count() {
            return Err(Error::invalid_operation(format!(
                "feature has {} fields, layer {} has {}",
                feature.field_count(),
                self.defn.name(),
                self.defn.field_count()
            )));
        }
        let fid = match feature.fid() {
            Some(fid) => fid,
            None => self.next_fid,
        };
        if self.positions.contains_key(&fid) {
            return Err(Error::invalid_operation(format!(
                "duplicate feature id {} in layer {}",
                fid,
                self.defn.name()
            )));
        }
        feature.set_fid(Some(fid));
        self.next_fid = self.next_fid.max(fid + 1);
        self.positions.insert(fid, self.features.len());
        self.features.push(feature);
        Ok(fid)
    }

    /// Number of stored features, ignoring filters.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns the access counters.
    pub fn stats(&self) -> AccessStats {
        self.stats
    }

    /// Resets the access counters and the filter history.
    pub fn reset_stats(&mut self) {
        self.stats = AccessStats::default();
        self.filter_history.clear();
    }

    /// Every attribute filter installed so far, in order.
    pub fn filter_history(&self) -> &[Option<String>] {
        &self.filter_history
    }

    fn passes(&self, feature: &Feature) -> Result<bool> {
        if let Some(filter) = &self.spatial_filter {
            match feature.geometry() {
                Some(g) if g.envelope_intersects(filter) => {}
                _ => return Ok(false),
            }
        }
        if let Some((_, expr)) = &self.attribute_filter {
            let defn = &self.defn;
            let mut resolver =
                |_table: usize, field: usize, _ty: featql_core::FieldType| -> Result<Value> {
                    Ok(feature.field_value(defn, field))
                };
            return ExprEvaluator.test(expr, &mut resolver);
        }
        Ok(true)
    }

    /// Copy of a stored feature with ignored parts removed.
    fn deliver(&self, feature: &Feature) -> Feature {
        let mut out = feature.clone();
        for (i, field) in self.defn.fields().iter().enumerate() {
            if field.is_ignored() {
                out.set_field(i, Value::Null);
            }
        }
        if self.defn.is_geometry_ignored() {
            out.set_geometry(None);
        }
        if self.defn.is_style_ignored() {
            out.set_style(None);
        }
        out
    }

    fn has_filters(&self) -> bool {
        self.attribute_filter.is_some() || self.spatial_filter.is_some()
    }
}

impl SourceLayer for MemoryLayer {
    fn defn(&self) -> &LayerDefn {
        &self.defn
    }

    fn reset_reading(&mut self) {
        self.stats.resets += 1;
        self.cursor = 0;
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        while self.cursor < self.features.len() {
            let pos = self.cursor;
            self.cursor += 1;
            if self.passes(&self.features[pos])? {
                self.stats.sequential_reads += 1;
                return Ok(Some(self.deliver(&self.features[pos])));
            }
        }
        Ok(None)
    }

    fn get_feature(&mut self, fid: Fid) -> Result<Option<Feature>> {
        self.stats.random_reads += 1;
        Ok(self
            .positions
            .get(&fid)
            .map(|&pos| self.deliver(&self.features[pos])))
    }

    fn set_next_by_index(&mut self, index: u64) -> Result<()> {
        self.cursor = 0;
        let mut remaining = index;
        while remaining > 0 && self.cursor < self.features.len() {
            if self.passes(&self.features[self.cursor])? {
                remaining -= 1;
            }
            self.cursor += 1;
        }
        Ok(())
    }

    fn set_attribute_filter(&mut self, filter: Option<&str>) -> Result<()> {
        self.stats.filter_installs += 1;
        let filter = filter.filter(|text| !text.trim().is_empty());
        self.filter_history.push(filter.map(String::from));
        self.attribute_filter = match filter {
            Some(text) => {
                let expr = compile_filter(text, &self.defn)?;
                log::debug!("layer {}: attribute filter {}", self.defn.name(), text);
                Some((String::from(text), expr))
            }
            None => None,
        };
        self.cursor = 0;
        Ok(())
    }

    fn attribute_filter(&self) -> Option<&str> {
        self.attribute_filter.as_ref().map(|(text, _)| text.as_str())
    }

    fn set_spatial_filter(&mut self, geometry: Option<Geometry>) {
        self.spatial_filter = geometry;
        self.cursor = 0;
    }

    fn spatial_filter(&self) -> Option<&Geometry> {
        self.spatial_filter.as_ref()
    }

    fn set_ignored_fields(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            let known = self.defn.field_index(name).is_some()
                || name.eq_ignore_ascii_case(SpecialField::Geometry.name())
                || name.eq_ignore_ascii_case(SpecialField::Style.name());
            if !known {
                return Err(Error::field_not_found(self.defn.name(), name.as_str()));
            }
        }
        self.defn.set_ignored_fields(names);
        Ok(())
    }

    fn set_geometry_ignored(&mut self, ignored: bool) {
        self.defn.set_geometry_ignored(ignored);
    }

    fn feature_count(&mut self, force: bool) -> Result<Option<u64>> {
        self.stats.count_requests += 1;
        if !self.has_filters() && self.capabilities.fast_feature_count {
            return Ok(Some(self.features.len() as u64));
        }
        if !force && !self.capabilities.fast_feature_count {
            return Ok(None);
        }
        let mut count = 0;
        for feature in &self.features {
            if self.passes(feature)? {
                count += 1;
            }
        }
        Ok(Some(count))
    }

    fn extent(&mut self, force: bool) -> Result<Option<Envelope>> {
        if !force && !self.capabilities.fast_get_extent {
            return Ok(None);
        }
        let mut extent: Option<Envelope> = None;
        for env in self.features.iter().filter_map(|f| f.geometry().and_then(Geometry::envelope)) {
            match extent.as_mut() {
                Some(e) => e.merge(&env),
                None => extent = Some(env),
            }
        }
        Ok(extent)
    }

    fn test_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::FastFeatureCount => self.capabilities.fast_feature_count,
            Capability::RandomRead => self.capabilities.random_read,
            Capability::FastSetNextByIndex => self.capabilities.fast_set_next_by_index,
            Capability::FastGetExtent => self.capabilities.fast_get_extent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use featql_core::schema::LayerDefnBuilder;
    use featql_core::{FieldType, GeometryType};

    fn cities() -> MemoryLayer {
        let defn = LayerDefnBuilder::new("cities")
            .add_field("name", FieldType::String)
            .unwrap()
            .add_field("pop", FieldType::Integer)
            .unwrap()
            .geometry_type(GeometryType::Point)
            .build();
        let mut layer = MemoryLayer::new(defn);
        for (i, (name, pop)) in [("Oslo", 700), ("Bergen", 285), ("Tromso", 77)].iter().enumerate() {
            let mut f = Feature::empty(2).with_geometry(Geometry::point(i as f64, i as f64));
            f.set_field(0, Value::from(*name));
            f.set_field(1, Value::Integer(*pop));
            layer.add_feature(f).unwrap();
        }
        layer
    }

    fn names(layer: &mut MemoryLayer) -> Vec<String> {
        layer.reset_reading();
        let mut out = Vec::new();
        while let Some(f) = layer.next_feature().unwrap() {
            out.push(f.field(0).unwrap().to_text());
        }
        out
    }

    #[test]
    fn test_add_feature_assigns_fids() {
        let mut layer = cities();
        assert_eq!(layer.len(), 3);
        assert_eq!(layer.get_feature(2).unwrap().unwrap().fid(), Some(2));
        assert!(layer.get_feature(9).unwrap().is_none());
        assert!(layer.add_feature(Feature::new(1, vec![Value::Null, Value::Null])).is_err());
        assert!(layer.add_feature(Feature::new(5, vec![Value::Null])).is_err());
    }

    #[test]
    fn test_attribute_filter() {
        let mut layer = cities();
        layer.set_attribute_filter(Some("pop > 100")).unwrap();
        assert_eq!(names(&mut layer), vec!["Oslo", "Bergen"]);
        assert_eq!(layer.attribute_filter(), Some("pop > 100"));
        layer.set_attribute_filter(Some("")).unwrap();
        assert_eq!(layer.attribute_filter(), None);
        assert_eq!(names(&mut layer).len(), 3);
        assert_eq!(
            layer.filter_history(),
            &[Some("pop > 100".to_string()), None]
        );
        assert!(layer.set_attribute_filter(Some("nope = 1")).is_err());
    }

    #[test]
    fn test_spatial_filter() {
        let mut layer = cities();
        layer.set_spatial_filter(Some(Envelope::new(0.5, 0.5, 5.0, 5.0).to_polygon()));
        assert_eq!(names(&mut layer), vec!["Bergen", "Tromso"]);
        assert_eq!(layer.feature_count(true).unwrap(), Some(2));
    }

    #[test]
    fn test_count_does_not_scan() {
        let mut layer = cities();
        layer.set_attribute_filter(Some("name LIKE 'o%'")).unwrap();
        assert_eq!(layer.feature_count(true).unwrap(), Some(1));
        assert_eq!(layer.stats().sequential_reads, 0);
        assert_eq!(layer.stats().count_requests, 1);
    }

    #[test]
    fn test_sequential_only_count() {
        let mut layer = cities().with_capabilities(LayerCapabilities::sequential_only());
        assert_eq!(layer.feature_count(false).unwrap(), None);
        assert_eq!(layer.feature_count(true).unwrap(), Some(3));
        assert!(!layer.test_capability(Capability::RandomRead));
    }

    #[test]
    fn test_ignored_fields() {
        let mut layer = cities();
        layer
            .set_ignored_fields(&["pop".to_string(), "OGR_GEOMETRY".to_string()])
            .unwrap();
        let f = layer.next_feature().unwrap().unwrap();
        assert!(f.field(1).unwrap().is_null());
        assert!(f.geometry().is_none());
        // filters still see ignored values
        layer.set_attribute_filter(Some("pop = 77")).unwrap();
        assert_eq!(layer.next_feature().unwrap().unwrap().fid(), Some(2));
        assert!(layer.set_ignored_fields(&["bogus".to_string()]).is_err());
    }

    #[test]
    fn test_set_next_by_index_honors_filter() {
        let mut layer = cities();
        layer.set_attribute_filter(Some("pop < 500")).unwrap();
        layer.set_next_by_index(1).unwrap();
        assert_eq!(layer.next_feature().unwrap().unwrap().fid(), Some(2));
    }

    #[test]
    fn test_extent() {
        let mut layer = cities();
        assert_eq!(layer.extent(false).unwrap(), Some(Envelope::new(0.0, 0.0, 2.0, 2.0)));
    }
}
