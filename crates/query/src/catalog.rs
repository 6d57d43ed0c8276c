//! Field catalog and table resolution.
//!
//! The catalog is the flat list of every addressable field of a statement:
//! the stored fields of each table in table order, followed by the
//! pseudo-fields of the primary table. Statement compilation resolves column
//! names through it.

use crate::statement::{ColumnDef, TableDef};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use featql_core::schema::LayerDefn;
use featql_core::{Error, FieldType, Result, SpecialField};
use featql_expr::{ColumnRef, ColumnResolver};
use featql_layer::{DataSourceRef, DataSourceRegistry, LayerRef};

/// One addressable field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogField {
    pub table_index: usize,
    pub field_index: usize,
    pub name: String,
    pub field_type: FieldType,
}

#[derive(Clone, Debug)]
struct CatalogTable {
    alias: String,
    table_name: String,
}

/// Flat, index-addressable list of the fields of all tables of a statement.
#[derive(Clone, Debug)]
pub struct FieldCatalog {
    tables: Vec<CatalogTable>,
    fields: Vec<CatalogField>,
}

impl FieldCatalog {
    /// Builds the catalog from resolved layers.
    pub fn build(tables: &[TableDef], layers: &[LayerRef]) -> Self {
        let defns: Vec<LayerDefn> = layers.iter().map(|l| l.borrow().defn().clone()).collect();
        Self::from_defns(tables, &defns)
    }

    /// Builds the catalog from table schemas.
    pub fn from_defns(tables: &[TableDef], defns: &[LayerDefn]) -> Self {
        let mut fields = Vec::new();
        for (table_index, defn) in defns.iter().enumerate() {
            for (field_index, field) in defn.fields().iter().enumerate() {
                fields.push(CatalogField {
                    table_index,
                    field_index,
                    name: field.name().to_string(),
                    field_type: field.field_type(),
                });
            }
        }
        if let Some(primary) = defns.first() {
            for special in SpecialField::ALL {
                fields.push(CatalogField {
                    table_index: 0,
                    field_index: primary.field_count() + special.index(),
                    name: special.name().to_string(),
                    field_type: special.field_type(),
                });
            }
        }
        let tables = tables
            .iter()
            .map(|t| CatalogTable {
                alias: t.alias_or_name().to_string(),
                table_name: t.table_name.clone(),
            })
            .collect();
        Self { tables, fields }
    }

    /// All fields in catalog order.
    pub fn fields(&self) -> &[CatalogField] {
        &self.fields
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finds a field by name. `alias.field` restricts the search to one
    /// table; an unqualified name matches the first table that has it.
    pub fn find(&self, name: &str) -> Result<&CatalogField> {
        if let Some((qualifier, field)) = name.split_once('.') {
            if let Some(table) = self.table_index(qualifier) {
                return self.find_in_table(table, field);
            }
        }
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::field_not_found(self.primary_name(), name))
    }

    /// Finds a field of one table. A qualifier, if present, must name that table.
    pub fn find_in_table(&self, table: usize, name: &str) -> Result<&CatalogField> {
        let field = match name.split_once('.') {
            Some((qualifier, field)) if self.table_index(qualifier) == Some(table) => field,
            _ => name,
        };
        let table_name = self
            .tables
            .get(table)
            .map(|t| t.alias.as_str())
            .unwrap_or_default();
        self.fields
            .iter()
            .find(|f| f.table_index == table && f.name.eq_ignore_ascii_case(field))
            .ok_or_else(|| Error::field_not_found(table_name, name))
    }

    /// Expands `*` into direct references to every stored field. Fields of
    /// joined tables are qualified with the table alias.
    pub fn expand_wildcard(&self) -> Vec<ColumnDef> {
        let primary_stored = self
            .fields
            .iter()
            .filter(|f| f.table_index == 0)
            .count()
            .saturating_sub(featql_core::SPECIAL_FIELD_COUNT);
        self.fields
            .iter()
            .filter(|f| !(f.table_index == 0 && f.field_index >= primary_stored))
            .map(|f| {
                let mut col = ColumnDef::field(f.table_index, f.field_index, f.name.clone(), f.field_type);
                if f.table_index > 0 {
                    col.table_name = self.tables.get(f.table_index).map(|t| t.alias.clone());
                }
                col
            })
            .collect()
    }

    fn table_index(&self, qualifier: &str) -> Option<usize> {
        self.tables
            .iter()
            .position(|t| t.alias.eq_ignore_ascii_case(qualifier))
            .or_else(|| {
                self.tables
                    .iter()
                    .position(|t| t.table_name.eq_ignore_ascii_case(qualifier))
            })
    }

    fn primary_name(&self) -> &str {
        self.tables.first().map(|t| t.alias.as_str()).unwrap_or_default()
    }
}

impl ColumnResolver for FieldCatalog {
    fn resolve_column(&self, name: &str) -> Result<ColumnRef> {
        let field = self.find(name)?;
        Ok(ColumnRef::new(
            field.table_index,
            field.field_index,
            field.field_type,
            field.name.clone(),
        ))
    }
}

/// Layers and secondary data sources a statement reads from.
pub struct ResolvedTables {
    pub layers: Vec<LayerRef>,
    /// Secondary data sources opened for the statement. They stay open as
    /// long as the layers are in use.
    pub data_sources: Vec<DataSourceRef>,
}

/// Resolves every table of a statement to a layer handle.
///
/// Tables without a data source name come from `primary`; the others are
/// opened through `registry`, once per distinct name.
pub fn resolve_tables(
    tables: &[TableDef],
    primary: &DataSourceRef,
    registry: &dyn DataSourceRegistry,
) -> Result<ResolvedTables> {
    let mut layers = Vec::with_capacity(tables.len());
    let mut data_sources: Vec<DataSourceRef> = Vec::new();
    for table in tables {
        let source = match &table.data_source {
            None => primary.clone(),
            Some(name) => match data_sources.iter().find(|ds| ds.name() == name.as_str()) {
                Some(ds) => ds.clone(),
                None => {
                    let ds = registry.open(name).map_err(|e| {
                        log::error!("cannot open data source {} for table {}: {}", name, table.table_name, e);
                        e
                    })?;
                    data_sources.push(ds.clone());
                    ds
                }
            },
        };
        let layer = source.layer_by_name(&table.table_name).ok_or_else(|| {
            log::error!("table {} not found in data source {}", table.table_name, source.name());
            Error::table_not_found(format!("{}.{}", source.name(), table.table_name))
        })?;
        layers.push(layer);
    }
    Ok(ResolvedTables {
        layers,
        data_sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use featql_core::schema::LayerDefnBuilder;
    use featql_layer::{layer_ref, MemoryDataSource, MemoryLayer, MemoryRegistry};

    fn defn(name: &str, fields: &[(&str, FieldType)]) -> LayerDefn {
        let mut b = LayerDefnBuilder::new(name);
        for (n, t) in fields {
            b = b.add_field(*n, *t).unwrap();
        }
        b.build()
    }

    fn catalog() -> FieldCatalog {
        let tables = vec![TableDef::new("emp").with_alias("e"), TableDef::new("dept")];
        let defns = vec![
            defn("emp", &[("id", FieldType::Integer), ("dept_id", FieldType::Integer)]),
            defn("dept", &[("dept_id", FieldType::Integer), ("title", FieldType::String)]),
        ];
        FieldCatalog::from_defns(&tables, &defns)
    }

    #[test]
    fn test_catalog_layout() {
        let c = catalog();
        assert_eq!(c.len(), 4 + featql_core::SPECIAL_FIELD_COUNT);
        let fid = c.find("FID").unwrap();
        assert_eq!((fid.table_index, fid.field_index), (0, 2));
        let area = c.find("ogr_geom_area").unwrap();
        assert_eq!(area.field_index, 2 + SpecialField::GeomArea.index());
        assert_eq!(area.field_type, FieldType::Real);
    }

    #[test]
    fn test_qualified_lookup() {
        let c = catalog();
        assert_eq!(c.find("dept_id").unwrap().table_index, 0);
        assert_eq!(c.find("dept.dept_id").unwrap().table_index, 1);
        assert_eq!(c.find("e.dept_id").unwrap().table_index, 0);
        assert_eq!(c.find("emp.dept_id").unwrap().table_index, 0);
        assert_eq!(c.find_in_table(1, "dept_id").unwrap().field_index, 0);
        assert!(matches!(c.find("e.title"), Err(Error::FieldNotFound { .. })));
        assert!(c.find("nope").is_err());
    }

    #[test]
    fn test_expand_wildcard() {
        let cols = catalog().expand_wildcard();
        let names: Vec<String> = cols.iter().enumerate().map(|(i, c)| c.output_name(i)).collect();
        assert_eq!(names, vec!["id", "dept_id", "dept.dept_id", "dept.title"]);
    }

    #[test]
    fn test_resolve_tables() {
        let main = MemoryDataSource::new("main")
            .with_layer(layer_ref(MemoryLayer::new(defn("emp", &[("id", FieldType::Integer)]))))
            .unwrap();
        let other = MemoryDataSource::new("other.db")
            .with_layer(layer_ref(MemoryLayer::new(defn("dept", &[("id", FieldType::Integer)]))))
            .unwrap();
        let mut registry = MemoryRegistry::new();
        registry.register(Rc::new(other));
        let primary: DataSourceRef = Rc::new(main);

        let tables = vec![
            TableDef::new("emp"),
            TableDef::new("dept").in_data_source("other.db"),
            TableDef::new("dept").in_data_source("other.db").with_alias("d2"),
        ];
        let resolved = resolve_tables(&tables, &primary, &registry).unwrap();
        assert_eq!(resolved.layers.len(), 3);
        assert_eq!(resolved.data_sources.len(), 1);
        assert_eq!(registry.open_requests().len(), 1);

        let missing = vec![TableDef::new("emp"), TableDef::new("dept").in_data_source("gone.db")];
        assert!(matches!(
            resolve_tables(&missing, &primary, &registry),
            Err(Error::DataSourceNotFound { .. })
        ));
        let missing = vec![TableDef::new("nothing")];
        let err = resolve_tables(&missing, &primary, &registry).err().unwrap();
        assert!(err.is_construction());
    }
}
