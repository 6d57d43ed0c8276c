//! Lookup join against a secondary layer.
//!
//! For every primary feature the join builds a point-equality attribute
//! filter on the secondary layer's key field, installs it and takes the first
//! feature the layer returns. Lookups are not cached.

use crate::statement::JoinDef;
use alloc::format;
use alloc::string::{String, ToString};
use featql_core::numfmt::format_g;
use featql_core::schema::LayerDefn;
use featql_core::{Error, Feature, FieldType, Result, SpecialField, Value};
use featql_expr::{quote_identifier, quote_string};
use featql_layer::LayerRef;

/// One equi-join resolved against both schemas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupJoin {
    primary_field: usize,
    primary_type: FieldType,
    secondary_table: usize,
    secondary_field: String,
    secondary_type: FieldType,
}

impl LookupJoin {
    pub fn new(join: &JoinDef, primary: &LayerDefn, secondary: &LayerDefn) -> Result<Self> {
        let primary_type = primary
            .field_type_at(join.primary_field)
            .ok_or_else(|| Error::field_not_found(primary.name(), format!("#{}", join.primary_field)))?;
        let secondary_type = secondary
            .field_type_at(join.secondary_field)
            .ok_or_else(|| Error::field_not_found(secondary.name(), format!("#{}", join.secondary_field)))?;
        let secondary_field = match secondary.field(join.secondary_field) {
            Some(field) => field.name().to_string(),
            None => SpecialField::from_field_index(join.secondary_field, secondary.field_count())
                .map(|s| s.name().to_string())
                .unwrap_or_default(),
        };
        Ok(Self {
            primary_field: join.primary_field,
            primary_type,
            secondary_table: join.secondary_table,
            secondary_field,
            secondary_type,
        })
    }

    /// Table this join reads from.
    #[inline]
    pub fn secondary_table(&self) -> usize {
        self.secondary_table
    }

    /// Attribute filter selecting the secondary features matching `primary`,
    /// or None if the primary key is unset.
    ///
    /// A numeric primary key matched against a text secondary key casts the
    /// secondary side to the primary type. A text primary key is always
    /// compared as a quoted literal.
    pub fn filter_for(&self, primary: &Feature, primary_defn: &LayerDefn) -> Option<String> {
        let value = primary.field_value(primary_defn, self.primary_field);
        if value.is_null() {
            return None;
        }
        let literal = join_literal(&value, self.primary_type);
        let field = quote_identifier(&self.secondary_field);
        if self.primary_type.is_numeric() && self.secondary_type == FieldType::String {
            Some(format!(
                "CAST({} AS {}) = {}",
                field,
                self.primary_type.sql_name(),
                literal
            ))
        } else {
            Some(format!("{} = {}", field, literal))
        }
    }

    /// Fetches the first secondary feature matching `primary`.
    pub fn fetch(
        &self,
        primary: &Feature,
        primary_defn: &LayerDefn,
        secondary: &LayerRef,
    ) -> Result<Option<Feature>> {
        let Some(filter) = self.filter_for(primary, primary_defn) else {
            return Ok(None);
        };
        let mut layer = secondary.borrow_mut();
        layer.reset_reading();
        layer.set_attribute_filter(Some(&filter)).map_err(|e| {
            log::error!(
                "join on table {}: cannot install filter {}: {}",
                self.secondary_table,
                filter,
                e
            );
            e
        })?;
        layer.next_feature()
    }
}

/// Renders a join key as a filter literal according to the key's field type.
pub fn join_literal(value: &Value, field_type: FieldType) -> String {
    match field_type {
        FieldType::Integer | FieldType::Integer64 => match value.as_integer64() {
            Some(i) => i.to_string(),
            None => quote_string(&value.to_text()),
        },
        FieldType::Real => match value.as_real() {
            Some(f) => format_g(f, 16),
            None => quote_string(&value.to_text()),
        },
        _ => quote_string(&value.to_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use featql_core::schema::LayerDefnBuilder;
    use featql_layer::{layer_ref, MemoryLayer};

    fn defn(name: &str, fields: &[(&str, FieldType)]) -> LayerDefn {
        let mut b = LayerDefnBuilder::new(name);
        for (n, t) in fields {
            b = b.add_field(*n, *t).unwrap();
        }
        b.build()
    }

    fn join_def() -> JoinDef {
        JoinDef {
            primary_field: 1,
            secondary_table: 1,
            secondary_field: 0,
        }
    }

    #[test]
    fn test_join_literals() {
        assert_eq!(join_literal(&Value::Integer(10), FieldType::Integer), "10");
        assert_eq!(join_literal(&Value::Integer64(-3), FieldType::Integer64), "-3");
        assert_eq!(join_literal(&Value::Real(0.1), FieldType::Real), "0.1");
        assert_eq!(join_literal(&Value::Real(1.0 / 3.0), FieldType::Real), "0.3333333333333333");
        assert_eq!(join_literal(&Value::from("O'Hara"), FieldType::String), "'O''Hara'");
    }

    #[test]
    fn test_numeric_key_against_text_key_is_cast() {
        let primary = defn("A", &[("name", FieldType::String), ("dept", FieldType::Integer)]);
        let secondary = defn("B", &[("code", FieldType::String)]);
        let join = LookupJoin::new(&join_def(), &primary, &secondary).unwrap();
        let row = Feature::new(0, vec![Value::from("x"), Value::Integer(10)]);
        assert_eq!(
            join.filter_for(&row, &primary).as_deref(),
            Some("CAST(\"code\" AS integer) = 10")
        );
    }

    #[test]
    fn test_text_key_against_numeric_key_is_quoted() {
        let primary = defn("A", &[("name", FieldType::String), ("dept", FieldType::String)]);
        let secondary = defn("B", &[("code", FieldType::Integer)]);
        let join = LookupJoin::new(&join_def(), &primary, &secondary).unwrap();
        let row = Feature::new(0, vec![Value::from("x"), Value::from("10")]);
        assert_eq!(join.filter_for(&row, &primary).as_deref(), Some("\"code\" = '10'"));
    }

    #[test]
    fn test_unset_key_matches_nothing() {
        let primary = defn("A", &[("name", FieldType::String), ("dept", FieldType::Integer)]);
        let secondary = defn("B", &[("dept", FieldType::Integer)]);
        let join = LookupJoin::new(&join_def(), &primary, &secondary).unwrap();
        let row = Feature::new(0, vec![Value::from("x"), Value::Null]);
        assert_eq!(join.filter_for(&row, &primary), None);

        let layer = layer_ref(MemoryLayer::new(secondary));
        assert_eq!(join.fetch(&row, &primary, &layer).unwrap(), None);
    }

    #[test]
    fn test_fetch_first_match() {
        let primary = defn("A", &[("name", FieldType::String), ("dept", FieldType::Integer)]);
        let secondary = defn("B", &[("dept", FieldType::Integer), ("title", FieldType::String)]);
        let mut memory = MemoryLayer::new(secondary.clone());
        for (fid, (dept, title)) in [(10, "Sales"), (20, "Ops"), (10, "Dup")].into_iter().enumerate() {
            memory
                .add_feature(Feature::new(fid as i64, vec![Value::Integer(dept), Value::from(title)]))
                .unwrap();
        }
        let layer = layer_ref(memory);
        let join = LookupJoin::new(&join_def(), &primary, &secondary).unwrap();

        let hit = Feature::new(0, vec![Value::from("x"), Value::Integer(10)]);
        let found = join.fetch(&hit, &primary, &layer).unwrap().unwrap();
        assert_eq!(found.field(1), Some(&Value::from("Sales")));

        let miss = Feature::new(1, vec![Value::from("y"), Value::Integer(99)]);
        assert_eq!(join.fetch(&miss, &primary, &layer).unwrap(), None);

        let guard = layer.borrow();
        assert_eq!(guard.attribute_filter(), Some("\"dept\" = 99"));
    }

    #[test]
    fn test_join_on_fid() {
        let primary = defn("A", &[("name", FieldType::String), ("ref", FieldType::Integer64)]);
        let secondary = defn("B", &[("title", FieldType::String)]);
        let def = JoinDef {
            primary_field: 1,
            secondary_table: 1,
            secondary_field: 1,
        };
        let join = LookupJoin::new(&def, &primary, &secondary).unwrap();
        let row = Feature::new(0, vec![Value::from("x"), Value::Integer64(4)]);
        assert_eq!(join.filter_for(&row, &primary).as_deref(), Some("\"FID\" = 4"));
    }
}
