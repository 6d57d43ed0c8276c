//! Summary and distinct-list accumulation.
//!
//! Every qualifying primary feature is streamed once through a `Summarizer`,
//! one value per output column. `SummaryState` is the default summarizer: it
//! keeps a `ColumnSummary` per column and, once finished, holds either the
//! single summary feature or the distinct value list.

use crate::statement::{ColumnDef, ColumnFunc, CompiledStatement, OrderDef, QueryMode};
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use featql_core::schema::LayerDefn;
use featql_core::{Error, Feature, Fid, Result, Value};
use hashbrown::HashSet;

/// Streaming per-column accumulator.
pub trait Summarizer {
    /// Feeds the value of output column `column` for one row. `COUNT(*)`
    /// columns receive NULL.
    fn summarize(&mut self, column: usize, value: &Value) -> Result<()>;

    /// Called once after the last row.
    fn finish(&mut self) -> Result<()>;
}

/// Accumulated statistics of one output column.
#[derive(Clone, Debug, Default)]
pub struct ColumnSummary {
    /// Rows counted by the column's function. For distinct lists, the number
    /// of distinct values.
    pub count: u64,
    /// Sum of numeric values; temporal values contribute Unix seconds.
    pub sum: f64,
    pub min: Option<Value>,
    pub max: Option<Value>,
    distinct: Vec<Value>,
    seen: HashSet<Value>,
}

impl ColumnSummary {
    /// Distinct values in first-seen order.
    pub fn distinct_values(&self) -> &[Value] {
        &self.distinct
    }

    /// Records `value` if not seen before. Returns true if it was new.
    fn insert_distinct(&mut self, value: &Value) -> bool {
        if self.seen.contains(value) {
            return false;
        }
        self.seen.insert(value.clone());
        self.distinct.push(value.clone());
        true
    }
}

/// Accumulator and finished result of a summary or distinct statement.
#[derive(Clone, Debug)]
pub struct SummaryState {
    mode: QueryMode,
    columns: Vec<ColumnDef>,
    order_by: Vec<OrderDef>,
    summaries: Vec<ColumnSummary>,
    feature: Option<Feature>,
    distinct_list: Vec<Value>,
}

impl SummaryState {
    pub fn new(statement: &CompiledStatement) -> Self {
        Self {
            mode: statement.mode,
            columns: statement.columns.clone(),
            order_by: statement.order_by.clone(),
            summaries: vec![ColumnSummary::default(); statement.columns.len()],
            feature: None,
            distinct_list: Vec::new(),
        }
    }

    /// Returns true if the statement's only column is `COUNT(*)`, which can
    /// be answered from the primary table's feature count.
    pub fn is_count_star_only(statement: &CompiledStatement) -> bool {
        statement.mode == QueryMode::Summary
            && statement.columns.len() == 1
            && statement.columns[0].is_count_star()
    }

    /// A finished `COUNT(*)` summary from a known row count.
    pub fn from_count(statement: &CompiledStatement, count: u64) -> Result<Self> {
        let mut state = Self::new(statement);
        if let Some(summary) = state.summaries.first_mut() {
            summary.count = count;
        }
        state.finish()?;
        Ok(state)
    }

    /// Feeds one primary feature.
    pub fn accumulate(&mut self, feature: &Feature, defn: &LayerDefn) -> Result<()> {
        for i in 0..self.columns.len() {
            let value = match self.columns[i].field_index {
                Some(field) if !self.columns[i].is_count_star() => feature.field_value(defn, field),
                _ => Value::Null,
            };
            self.summarize(i, &value)?;
        }
        Ok(())
    }

    pub fn column(&self, column: usize) -> Option<&ColumnSummary> {
        self.summaries.get(column)
    }

    /// The summary feature, once finished.
    pub fn summary_feature(&self) -> Option<&Feature> {
        self.feature.as_ref()
    }

    /// The distinct values in output order, once finished.
    pub fn distinct_values(&self) -> &[Value] {
        &self.distinct_list
    }

    /// Number of rows this state produces.
    pub fn row_count(&self) -> u64 {
        match self.mode {
            QueryMode::Distinct => self.distinct_list.len() as u64,
            _ => 1,
        }
    }

    /// Output feature at position `index`: the summary feature for index 0,
    /// or one distinct value.
    pub fn feature_at(&self, index: u64) -> Option<Feature> {
        match self.mode {
            QueryMode::Distinct => {
                let value = usize::try_from(index).ok().and_then(|i| self.distinct_list.get(i))?;
                let output_type = self.columns.first().map(ColumnDef::output_type)?;
                Some(Feature::new(index as Fid, vec![value.coerce(output_type)]))
            }
            _ if index == 0 => self.feature.clone(),
            _ => None,
        }
    }

    fn column_name(&self, column: usize) -> alloc::string::String {
        self.columns
            .get(column)
            .map(|c| c.output_name(column))
            .unwrap_or_default()
    }

    fn finish_summary(&mut self) -> Result<()> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (def, summary) in self.columns.iter().zip(&self.summaries) {
            let output_type = def.output_type();
            let value = match def.func {
                ColumnFunc::Count => Value::Integer64(summary.count as i64),
                _ if summary.count == 0 => Value::Null,
                ColumnFunc::Avg => {
                    let avg = summary.sum / summary.count as f64;
                    if def.field_type.is_temporal() {
                        Value::from_unix_seconds(avg, def.field_type)
                    } else {
                        Value::Real(avg)
                    }
                }
                ColumnFunc::Sum if def.field_type.is_integral() => Value::Real(libm::round(summary.sum)),
                ColumnFunc::Sum => Value::Real(summary.sum),
                ColumnFunc::Min => summary.min.clone().unwrap_or(Value::Null),
                ColumnFunc::Max => summary.max.clone().unwrap_or(Value::Null),
                ColumnFunc::None => Value::Null,
            };
            values.push(value.coerce(output_type));
        }
        self.feature = Some(Feature::new(0, values));
        Ok(())
    }

    fn finish_distinct(&mut self) -> Result<()> {
        let Some(summary) = self.summaries.first() else {
            return Ok(());
        };
        let mut list = summary.distinct.clone();
        match self.order_by.as_slice() {
            [] => {}
            [key] => {
                let column = &self.columns[0];
                if column.table_index != 0 || column.field_index != Some(key.field_index) {
                    return Err(Error::evaluation(
                        self.column_name(0),
                        "ORDER BY on a DISTINCT list must use the distinct column",
                    ));
                }
                list.sort_by(|a, b| a.compare(b).unwrap_or_else(|| a.cmp(b)));
                if !key.ascending {
                    list.reverse();
                }
            }
            _ => {
                return Err(Error::evaluation(
                    self.column_name(0),
                    "ORDER BY on a DISTINCT list takes a single key",
                ));
            }
        }
        log::debug!("distinct list of {} values", list.len());
        self.distinct_list = list;
        Ok(())
    }
}

impl Summarizer for SummaryState {
    fn summarize(&mut self, column: usize, value: &Value) -> Result<()> {
        let Some(def) = self.columns.get(column) else {
            return Err(Error::invalid_operation(format!("summary column {} out of range", column)));
        };
        let (func, distinct, count_star, temporal) =
            (def.func, def.distinct, def.is_count_star(), def.field_type.is_temporal());
        if self.mode == QueryMode::Distinct {
            let summary = &mut self.summaries[column];
            if summary.insert_distinct(value) {
                summary.count += 1;
            }
            return Ok(());
        }
        if count_star {
            self.summaries[column].count += 1;
            return Ok(());
        }
        if value.is_null() {
            return Ok(());
        }
        match func {
            ColumnFunc::Count => {
                let summary = &mut self.summaries[column];
                if !distinct || summary.insert_distinct(value) {
                    summary.count += 1;
                }
            }
            ColumnFunc::Sum | ColumnFunc::Avg => {
                let number = if temporal {
                    value.to_unix_seconds()
                } else {
                    value.as_real()
                };
                let Some(number) = number else {
                    let message = format!("{}() on non-numeric value {}", func.name(), value.to_text());
                    return Err(Error::evaluation(self.column_name(column), message));
                };
                let summary = &mut self.summaries[column];
                summary.sum += number;
                summary.count += 1;
            }
            ColumnFunc::Min | ColumnFunc::Max => {
                let summary = &mut self.summaries[column];
                let current = if func == ColumnFunc::Min {
                    &mut summary.min
                } else {
                    &mut summary.max
                };
                let wanted = if func == ColumnFunc::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let replace = match current {
                    None => true,
                    Some(best) => value.compare(best) == Some(wanted),
                };
                if replace {
                    *current = Some(value.clone());
                }
                summary.count += 1;
            }
            ColumnFunc::None => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.mode {
            QueryMode::Distinct => self.finish_distinct(),
            _ => self.finish_summary(),
        }
    }
}
