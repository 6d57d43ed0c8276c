//! The SQL results layer.
//!
//! `ResultsLayer` runs one compiled SELECT over its resolved tables and
//! exposes the result through the same `SourceLayer` contract the tables
//! implement. Rows are pulled lazily:
//!
//! - recordset statements scan the primary table (directly, or through an
//!   ORDER BY index of feature identifiers), join and translate each row
//! - summary and distinct statements stream the primary table once into a
//!   `SummaryState` and return its rows by position
//!
//! The ORDER BY index and the summary are built on first use and dropped
//! whenever the attribute or spatial filter changes.

use crate::catalog::{resolve_tables, FieldCatalog, ResolvedTables};
use crate::executor::{
    sort_key_values, BestRow, CacheState, KeyBuffer, LookupJoin, OrderIndex, RowTuple, Summarizer, SummaryState,
    Translator,
};
use crate::pushdown::{PushdownPlan, QueryOptions};
use crate::statement::{expr_reads_geometry, reads_geometry, CompiledStatement, QueryMode, SelectBuilder};
use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use featql_core::schema::LayerDefn;
use featql_core::{Envelope, Error, Feature, Fid, FieldType, Geometry, GeometryType, Result, SpecialField, Value};
use featql_expr::{compile_filter, Evaluator, Expr, ExprEvaluator};
use featql_layer::{Capability, DataSourceRef, DataSourceRegistry, LayerRef, SourceLayer};

/// A layer producing the rows of one SELECT statement.
pub struct ResultsLayer {
    statement: CompiledStatement,
    /// Schema of the result rows.
    defn: LayerDefn,
    /// Schemas of the source tables, primary first.
    table_defns: Vec<LayerDefn>,
    layers: Vec<LayerRef>,
    /// Keeps secondary data sources open while their layers are in use.
    _data_sources: Vec<DataSourceRef>,
    joins: Vec<LookupJoin>,
    plan: PushdownPlan,
    options: QueryOptions,
    evaluator: Box<dyn Evaluator>,
    where_reads_joins: bool,

    attribute_filter: Option<(String, Expr)>,
    spatial_filter: Option<Geometry>,

    order_index: CacheState<OrderIndex>,
    summary: CacheState<SummaryState>,

    started: bool,
    /// Next position in the order index or summary rows.
    next_index: u64,
    /// Rows returned since the last repositioning, for LIMIT.
    iterated: u64,
    /// Qualifying rows still to be skipped for OFFSET.
    pending_skip: u64,
    features_read: u64,
}

impl ResultsLayer {
    /// Resolves the tables of `builder`, compiles it and opens the result.
    ///
    /// Tables without a data source name are looked up in `primary`; the
    /// others are opened through `registry`.
    pub fn open(
        builder: SelectBuilder,
        primary: &DataSourceRef,
        registry: &dyn DataSourceRegistry,
        options: QueryOptions,
    ) -> Result<Self> {
        let tables = resolve_tables(builder.tables(), primary, registry)?;
        let catalog = FieldCatalog::build(builder.tables(), &tables.layers);
        let statement = builder.compile(&catalog)?;
        Self::new(statement, tables, options)
    }

    /// Opens the result of an already compiled statement.
    pub fn new(statement: CompiledStatement, tables: ResolvedTables, options: QueryOptions) -> Result<Self> {
        let ResolvedTables { layers, data_sources } = tables;
        let table_defns: Vec<LayerDefn> = layers.iter().map(|l| l.borrow().defn().clone()).collect();
        statement.validate(&table_defns)?;

        let primary = &layers[0];
        for (table, layer) in layers.iter().enumerate().skip(1) {
            if core::ptr::addr_eq(Rc::as_ptr(layer), Rc::as_ptr(primary)) {
                return Err(Error::unsupported(format!(
                    "table {} joins {} to itself",
                    table,
                    table_defns[0].name()
                )));
            }
        }

        let joins = statement
            .joins
            .iter()
            .map(|j| LookupJoin::new(j, &table_defns[0], &table_defns[j.secondary_table]))
            .collect::<Result<Vec<_>>>()?;

        let plan = PushdownPlan::build(&statement, &table_defns, &options);
        for (table, layer) in layers.iter().enumerate() {
            layer
                .borrow_mut()
                .set_ignored_fields(plan.ignored_fields(table))
                .map_err(|e| {
                    log::error!("cannot set ignored fields on {}: {}", table_defns[table].name(), e);
                    e
                })?;
        }

        let where_reads_joins = statement
            .where_expr
            .as_ref()
            .map(|e| e.references(&mut |c| c.table_index != 0))
            .unwrap_or(false);
        let defn = statement.result_defn(&table_defns);
        let spatial_filter = options.get_spatial_filter().cloned();

        let layer = Self {
            statement,
            defn,
            table_defns,
            layers,
            _data_sources: data_sources,
            joins,
            plan,
            options,
            evaluator: Box::new(ExprEvaluator),
            where_reads_joins,
            attribute_filter: None,
            spatial_filter,
            order_index: CacheState::Unbuilt,
            summary: CacheState::Unbuilt,
            started: false,
            next_index: 0,
            iterated: 0,
            pending_skip: 0,
            features_read: 0,
        };
        if layer.statement.mode == QueryMode::Recordset {
            layer.apply_filters_to_source()?;
        }
        log::debug!(
            "results layer {}: {:?} mode, {} columns, {} joins",
            layer.defn.name(),
            layer.statement.mode,
            layer.statement.columns.len(),
            layer.joins.len()
        );
        Ok(layer)
    }

    /// Replaces the evaluator used for computed columns and for WHERE
    /// clauses evaluated at this level.
    pub fn with_evaluator<E: Evaluator + 'static>(mut self, evaluator: E) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn statement(&self) -> &CompiledStatement {
        &self.statement
    }

    pub fn pushdown(&self) -> &PushdownPlan {
        &self.plan
    }

    /// Primary features read from the source so far.
    pub fn features_read(&self) -> u64 {
        self.features_read
    }

    /// Returns true if the ORDER BY index is built and not the source order.
    pub fn has_order_index(&self) -> bool {
        matches!(self.order_index.ready(), Some(OrderIndex::Fids(_)))
    }

    fn primary(&self) -> &LayerRef {
        &self.layers[0]
    }

    fn primary_name(&self) -> &str {
        self.table_defns[0].name()
    }

    /// True if some rows the source returns may still be rejected here.
    fn filters_locally(&self) -> bool {
        self.plan.evaluates_where_locally() || self.attribute_filter.is_some()
    }

    fn translator(&self) -> Translator<'_> {
        Translator::new(
            &self.statement.columns,
            &self.table_defns,
            &self.defn,
            self.evaluator.as_ref(),
        )
    }

    fn apply_filters_to_source(&self) -> Result<()> {
        let mut primary = self.primary().borrow_mut();
        primary
            .set_attribute_filter(self.plan.source_filter())
            .map_err(|e| {
                log::error!("cannot forward WHERE to {}: {}", self.primary_name(), e);
                e
            })?;
        primary.set_spatial_filter(self.spatial_filter.clone());
        primary.reset_reading();
        Ok(())
    }

    fn invalidate(&mut self) {
        if self.order_index.is_ready() || self.summary.is_ready() {
            log::debug!("results layer {}: filters changed, dropping cached rows", self.defn.name());
        }
        self.order_index.invalidate();
        self.summary.invalidate();
    }

    /// Fetches the joined features of `primary`.
    fn joined_row(&self, primary: Feature) -> Result<RowTuple> {
        let mut joined = Vec::with_capacity(self.joins.len());
        for join in &self.joins {
            let secondary = &self.layers[join.secondary_table()];
            joined.push(join.fetch(&primary, &self.table_defns[0], secondary)?);
        }
        Ok(RowTuple::with_joined(primary, joined))
    }

    fn passes_where(&self, row: &RowTuple) -> Result<bool> {
        if !self.plan.evaluates_where_locally() {
            return Ok(true);
        }
        if let Some(filter) = &self.spatial_filter {
            match row.primary().geometry() {
                Some(g) if g.envelope_intersects(filter) => {}
                _ => return Ok(false),
            }
        }
        match &self.statement.where_expr {
            Some(expr) => row
                .test(expr, &self.table_defns, self.evaluator.as_ref())
                .map_err(|e| {
                    log::warn!("WHERE on {} failed: {}", self.primary_name(), e);
                    e
                }),
            None => Ok(true),
        }
    }

    fn passes_attribute_filter(&self, feature: &Feature) -> Result<bool> {
        let Some((_, expr)) = &self.attribute_filter else {
            return Ok(true);
        };
        let defn = &self.defn;
        let mut resolver =
            |_table: usize, field: usize, _ty: FieldType| -> Result<Value> { Ok(feature.field_value(defn, field)) };
        self.evaluator.test(expr, &mut resolver)
    }

    /// Reads the next primary feature that passes every WHERE check.
    /// Joined features are fetched when `with_joins` is set or the WHERE
    /// clause needs them.
    fn read_qualifying(&mut self, with_joins: bool) -> Result<Option<RowTuple>> {
        loop {
            let next = self.primary().borrow_mut().next_feature()?;
            let Some(primary) = next else {
                return Ok(None);
            };
            self.features_read += 1;
            let row = if with_joins || (self.where_reads_joins && self.plan.evaluates_where_locally()) {
                self.joined_row(primary)?
            } else {
                RowTuple::new(primary)
            };
            if self.passes_where(&row)? {
                return Ok(Some(row));
            }
        }
    }

    fn row_fid(&self, row: &RowTuple) -> Result<Fid> {
        row.primary().fid().ok_or_else(|| {
            Error::invalid_operation(format!("feature of {} has no identifier", self.primary_name()))
        })
    }

    fn ensure_order_index(&mut self) -> Result<()> {
        if self.statement.order_by.is_empty() {
            return Ok(());
        }
        match self.order_index {
            CacheState::Ready(_) => return Ok(()),
            CacheState::Building => {
                return Err(Error::invalid_operation("ORDER BY index requested while being built"));
            }
            CacheState::Unbuilt => {}
        }
        self.order_index = CacheState::Building;
        let built = self.build_order_index();
        self.primary().borrow_mut().reset_reading();
        match built {
            Ok(index) => {
                self.order_index = CacheState::Ready(index);
                Ok(())
            }
            Err(e) => {
                self.order_index.invalidate();
                log::error!("ORDER BY on {}: {}", self.primary_name(), e);
                Err(e)
            }
        }
    }

    fn build_order_index(&mut self) -> Result<OrderIndex> {
        let keys = self.statement.order_by.clone();
        self.primary().borrow_mut().reset_reading();

        let best_only =
            self.statement.limit == Some(1) && self.statement.offset == 0 && self.attribute_filter.is_none();
        if best_only {
            let mut best = BestRow::new();
            while let Some(row) = self.read_qualifying(false)? {
                let values = sort_key_values(row.primary(), &self.table_defns[0], &keys);
                best.offer(self.row_fid(&row)?, values, &keys);
            }
            log::debug!("ORDER BY with LIMIT 1 on {}: best row scan", self.primary_name());
            return Ok(best.into_index());
        }

        let mut buffer = KeyBuffer::new(keys.len(), self.options.get_max_sort_rows())?;
        while let Some(row) = self.read_qualifying(false)? {
            let values = sort_key_values(row.primary(), &self.table_defns[0], &keys);
            buffer.push(self.row_fid(&row)?, values)?;
        }
        Ok(buffer.into_index(&keys))
    }

    fn ensure_summary(&mut self) -> Result<()> {
        match self.summary {
            CacheState::Ready(_) => return Ok(()),
            CacheState::Building => {
                return Err(Error::invalid_operation("summary requested while being built"));
            }
            CacheState::Unbuilt => {}
        }
        self.summary = CacheState::Building;
        match self.build_summary() {
            Ok(state) => {
                self.summary = CacheState::Ready(state);
                Ok(())
            }
            Err(e) => {
                self.summary.invalidate();
                log::error!("summary of {}: {}", self.primary_name(), e);
                Err(e)
            }
        }
    }

    fn build_summary(&mut self) -> Result<SummaryState> {
        self.apply_filters_to_source()?;
        let layer = self.primary().clone();

        if SummaryState::is_count_star_only(&self.statement) && !self.plan.evaluates_where_locally() {
            let count = layer.borrow_mut().feature_count(true)?;
            if let Some(count) = count {
                log::debug!("COUNT(*) on {} answered by the source: {}", self.primary_name(), count);
                return SummaryState::from_count(&self.statement, count);
            }
        }

        let primary_fields = self.table_defns[0].field_count();
        let needs_geometry = self.spatial_filter.is_some()
            || self
                .statement
                .columns
                .iter()
                .any(|c| reads_geometry(c, primary_fields))
            || self
                .statement
                .where_expr
                .as_ref()
                .map(|e| expr_reads_geometry(e, primary_fields))
                .unwrap_or(false);
        let was_ignored = layer.borrow().defn().is_geometry_ignored();
        if !needs_geometry {
            layer.borrow_mut().set_geometry_ignored(true);
        }
        let result = self.accumulate_summary();
        layer.borrow_mut().set_geometry_ignored(was_ignored);
        layer.borrow_mut().reset_reading();
        result
    }

    fn accumulate_summary(&mut self) -> Result<SummaryState> {
        let mut state = SummaryState::new(&self.statement);
        while let Some(row) = self.read_qualifying(false)? {
            state.accumulate(row.primary(), &self.table_defns[0])?;
        }
        state.finish()?;
        Ok(state)
    }

    /// Positions the layer on output row `index`, counted after OFFSET.
    fn position(&mut self, index: u64) -> Result<()> {
        let target = index.saturating_add(self.statement.offset);
        self.pending_skip = 0;
        self.next_index = 0;
        match self.statement.mode {
            QueryMode::Recordset => {
                self.ensure_order_index()?;
                if self.has_order_index() {
                    if self.attribute_filter.is_some() {
                        self.pending_skip = target;
                    } else {
                        self.next_index = target;
                    }
                } else if self.filters_locally() {
                    self.primary().borrow_mut().reset_reading();
                    self.pending_skip = target;
                } else if target == 0 {
                    self.primary().borrow_mut().reset_reading();
                } else {
                    self.primary().borrow_mut().set_next_by_index(target)?;
                }
            }
            QueryMode::Summary | QueryMode::Distinct => {
                self.ensure_summary()?;
                if self.attribute_filter.is_some() {
                    self.pending_skip = target;
                } else {
                    self.next_index = target;
                }
            }
        }
        self.started = true;
        Ok(())
    }

    fn next_recordset_row(&mut self) -> Result<Option<Feature>> {
        let row = if self.has_order_index() {
            loop {
                let fid = self.order_index.ready().and_then(|index| index.fid_at(self.next_index));
                let Some(fid) = fid else {
                    return Ok(None);
                };
                self.next_index += 1;
                let found = self.primary().borrow_mut().get_feature(fid)?;
                match found {
                    Some(primary) => {
                        self.features_read += 1;
                        break self.joined_row(primary)?;
                    }
                    None => log::warn!("feature {} of {} disappeared after indexing", fid, self.primary_name()),
                }
            }
        } else {
            match self.read_qualifying(true)? {
                Some(row) => row,
                None => return Ok(None),
            }
        };
        self.translator().translate(&row).map(Some)
    }

    fn next_summary_row(&mut self) -> Option<Feature> {
        let feature = self.summary.ready().and_then(|s| s.feature_at(self.next_index));
        if feature.is_some() {
            self.next_index += 1;
        }
        feature
    }

    fn scan_count(&mut self) -> Result<u64> {
        self.primary().borrow_mut().reset_reading();
        let translate = self.attribute_filter.is_some();
        let mut count = 0;
        while let Some(row) = self.read_qualifying(translate)? {
            if translate {
                let feature = self.translator().translate(&row)?;
                if !self.passes_attribute_filter(&feature)? {
                    continue;
                }
            }
            count += 1;
        }
        Ok(count)
    }
}

impl SourceLayer for ResultsLayer {
    fn defn(&self) -> &LayerDefn {
        &self.defn
    }

    fn reset_reading(&mut self) {
        self.started = false;
        self.next_index = 0;
        self.iterated = 0;
        self.pending_skip = 0;
        if self.statement.mode == QueryMode::Recordset {
            self.primary().borrow_mut().reset_reading();
        }
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        if !self.started {
            self.position(0)?;
        }
        loop {
            if let Some(limit) = self.statement.limit {
                if self.iterated >= limit {
                    return Ok(None);
                }
            }
            let candidate = match self.statement.mode {
                QueryMode::Recordset => self.next_recordset_row()?,
                QueryMode::Summary | QueryMode::Distinct => self.next_summary_row(),
            };
            let Some(feature) = candidate else {
                return Ok(None);
            };
            if !self.passes_attribute_filter(&feature)? {
                continue;
            }
            if self.pending_skip > 0 {
                self.pending_skip -= 1;
                continue;
            }
            self.iterated += 1;
            return Ok(Some(feature));
        }
    }

    fn get_feature(&mut self, fid: Fid) -> Result<Option<Feature>> {
        match self.statement.mode {
            QueryMode::Summary | QueryMode::Distinct => {
                self.ensure_summary()?;
                let Ok(index) = u64::try_from(fid) else {
                    return Ok(None);
                };
                Ok(self.summary.ready().and_then(|s| s.feature_at(index)))
            }
            QueryMode::Recordset => {
                let found = self.primary().borrow_mut().get_feature(fid)?;
                let Some(primary) = found else {
                    return Ok(None);
                };
                self.features_read += 1;
                let row = self.joined_row(primary)?;
                self.translator().translate(&row).map(Some)
            }
        }
    }

    fn set_next_by_index(&mut self, index: u64) -> Result<()> {
        self.iterated = index;
        self.position(index)
    }

    fn set_attribute_filter(&mut self, filter: Option<&str>) -> Result<()> {
        let filter = filter.filter(|text| !text.trim().is_empty());
        self.attribute_filter = match filter {
            Some(text) => {
                let expr = compile_filter(text, &self.defn).map_err(|e| {
                    log::error!("results layer {}: bad attribute filter: {}", self.defn.name(), e);
                    e
                })?;
                Some((text.to_string(), expr))
            }
            None => None,
        };
        self.invalidate();
        self.reset_reading();
        Ok(())
    }

    fn attribute_filter(&self) -> Option<&str> {
        self.attribute_filter.as_ref().map(|(text, _)| text.as_str())
    }

    fn set_spatial_filter(&mut self, geometry: Option<Geometry>) {
        self.spatial_filter = geometry;
        self.invalidate();
        if self.statement.mode == QueryMode::Recordset {
            self.primary().borrow_mut().set_spatial_filter(self.spatial_filter.clone());
        }
        self.reset_reading();
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
        let total = match self.statement.mode {
            QueryMode::Distinct => {
                self.ensure_summary()?;
                self.summary.ready().map(SummaryState::row_count).unwrap_or(0)
            }
            QueryMode::Summary => 1,
            QueryMode::Recordset if !self.filters_locally() => {
                match self.primary().borrow_mut().feature_count(force)? {
                    Some(n) => n,
                    None => return Ok(None),
                }
            }
            QueryMode::Recordset => {
                if !force {
                    return Ok(None);
                }
                let counted = self.scan_count();
                self.reset_reading();
                counted?
            }
        };
        let mut count = total.saturating_sub(self.statement.offset);
        if let Some(limit) = self.statement.limit {
            count = count.min(limit);
        }
        Ok(Some(count))
    }

    fn extent(&mut self, force: bool) -> Result<Option<Envelope>> {
        if self.statement.mode != QueryMode::Recordset || self.defn.geometry_type() == GeometryType::None {
            return Ok(None);
        }
        self.primary().borrow_mut().extent(force)
    }

    fn test_capability(&self, capability: Capability) -> bool {
        let recordset = self.statement.mode == QueryMode::Recordset;
        match capability {
            Capability::FastSetNextByIndex => {
                !recordset || self.has_order_index() || self.primary().borrow().test_capability(capability)
            }
            Capability::FastFeatureCount if recordset => {
                !self.filters_locally() && self.primary().borrow().test_capability(capability)
            }
            Capability::FastFeatureCount => true,
            Capability::RandomRead | Capability::FastGetExtent if recordset => {
                self.primary().borrow().test_capability(capability)
            }
            _ => false,
        }
    }
}

impl Drop for ResultsLayer {
    fn drop(&mut self) {
        log::debug!(
            "results layer {}: {} features read from {}",
            self.defn.name(),
            self.features_read,
            self.primary_name()
        );
        for (table, layer) in self.layers.iter().enumerate() {
            let Ok(mut layer) = layer.try_borrow_mut() else {
                log::warn!("table {} busy, leaving its filters installed", self.table_defns[table].name());
                continue;
            };
            if let Err(e) = layer.set_attribute_filter(None) {
                log::warn!("cannot clear filter on {}: {}", self.table_defns[table].name(), e);
            }
            if table == 0 {
                layer.set_spatial_filter(None);
            }
            if let Err(e) = layer.set_ignored_fields(&[]) {
                log::warn!("cannot clear ignored fields on {}: {}", self.table_defns[table].name(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{ColumnSpec, TableDef};
    use alloc::vec;
    use featql_core::schema::LayerDefnBuilder;
    use featql_layer::{layer_ref, MemoryDataSource, MemoryLayer, MemoryRegistry};

    fn employees() -> MemoryLayer {
        let defn = LayerDefnBuilder::new("A")
            .add_field("id", FieldType::Integer)
            .unwrap()
            .add_field("name", FieldType::String)
            .unwrap()
            .add_field("dept_id", FieldType::Integer)
            .unwrap()
            .geometry_type(GeometryType::Point)
            .build();
        let mut layer = MemoryLayer::new(defn);
        for (fid, (id, name, dept)) in [(1, "x", 10), (2, "y", 99), (3, "z", 10)].into_iter().enumerate() {
            layer
                .add_feature(
                    Feature::new(fid as Fid, vec![Value::Integer(id), Value::from(name), Value::Integer(dept)])
                        .with_geometry(Geometry::point(id as f64, 0.0)),
                )
                .unwrap();
        }
        layer
    }

    fn open(builder: SelectBuilder) -> (ResultsLayer, LayerRef) {
        let primary = layer_ref(employees());
        let ds: DataSourceRef = Rc::new(MemoryDataSource::new("ds").with_layer(primary.clone()).unwrap());
        let layer = ResultsLayer::open(builder, &ds, &MemoryRegistry::default(), QueryOptions::new()).unwrap();
        (layer, primary)
    }

    fn collect(layer: &mut ResultsLayer) -> Vec<Feature> {
        let mut out = Vec::new();
        while let Some(f) = layer.next_feature().unwrap() {
            out.push(f);
        }
        out
    }

    #[test]
    fn test_forwarded_where_and_ignored_fields() {
        let (mut layer, primary) = open(SelectBuilder::new(TableDef::new("A")).column("name").filter("dept_id = 10"));
        assert_eq!(primary.borrow().attribute_filter(), Some("\"dept_id\" = 10"));
        assert!(primary.borrow().defn().field(0).unwrap().is_ignored());

        let rows = collect(&mut layer);
        let names: Vec<_> = rows.iter().map(|f| f.field(0).cloned()).collect();
        assert_eq!(names, vec![Some(Value::from("x")), Some(Value::from("z"))]);
        assert_eq!(rows[1].fid(), Some(2));
        assert_eq!(layer.features_read(), 2);

        drop(layer);
        assert_eq!(primary.borrow().attribute_filter(), None);
        assert!(!primary.borrow().defn().field(0).unwrap().is_ignored());
    }

    #[test]
    fn test_limit_offset_and_count() {
        let (mut layer, _) = open(SelectBuilder::new(TableDef::new("A")).column("id").offset(1).limit(1));
        let rows = collect(&mut layer);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field(0), Some(&Value::Integer(2)));
        assert_eq!(layer.feature_count(true).unwrap(), Some(1));

        layer.set_next_by_index(0).unwrap();
        assert_eq!(layer.next_feature().unwrap().unwrap().fid(), Some(1));
    }

    #[test]
    fn test_own_attribute_filter() {
        let (mut layer, _) = open(SelectBuilder::new(TableDef::new("A")).column("name").column("id"));
        layer.set_attribute_filter(Some("id >= 2")).unwrap();
        assert_eq!(layer.attribute_filter(), Some("id >= 2"));
        assert_eq!(collect(&mut layer).len(), 2);
        assert_eq!(layer.feature_count(false).unwrap(), None);
        assert_eq!(layer.feature_count(true).unwrap(), Some(2));
        assert!(!layer.test_capability(Capability::FastFeatureCount));
        assert!(layer.set_attribute_filter(Some("missing = 1")).is_err());
    }

    #[test]
    fn test_summary_and_capabilities() {
        let (mut layer, _) = open(
            SelectBuilder::new(TableDef::new("A"))
                .select(ColumnSpec::aggregate(crate::statement::ColumnFunc::Max, "id"))
                .select(ColumnSpec::count_star()),
        );
        assert!(layer.test_capability(Capability::FastFeatureCount));
        assert!(layer.test_capability(Capability::FastSetNextByIndex));
        assert!(!layer.test_capability(Capability::RandomRead));
        assert_eq!(layer.feature_count(false).unwrap(), Some(1));
        let rows = collect(&mut layer);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields(), &[Value::Integer(3), Value::Integer64(3)]);
        assert_eq!(layer.get_feature(0).unwrap().unwrap().fid(), Some(0));
        assert_eq!(layer.get_feature(1).unwrap(), None);
        assert_eq!(layer.extent(true).unwrap(), None);
    }

    #[test]
    fn test_self_join_is_rejected() {
        let primary = layer_ref(employees());
        let ds: DataSourceRef = Rc::new(MemoryDataSource::new("ds").with_layer(primary).unwrap());
        let builder = SelectBuilder::new(TableDef::new("A").with_alias("a1")).join(
            TableDef::new("A").with_alias("a2"),
            "dept_id",
            "id",
        );
        let result = ResultsLayer::open(builder, &ds, &MemoryRegistry::default(), QueryOptions::new());
        assert!(matches!(result, Err(Error::Unsupported { .. })));
    }
}
