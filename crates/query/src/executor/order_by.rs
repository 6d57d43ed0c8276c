//! ORDER BY index construction.
//!
//! Sort keys of every qualifying primary feature are captured into a
//! `KeyBuffer`, a permutation of the captured rows is merge sorted, and the
//! permutation is remapped to feature identifiers. A permutation that turns
//! out to be the identity is dropped so iteration can fall back to a plain
//! forward scan of the source.

use crate::statement::OrderDef;
use alloc::format;
use alloc::vec::Vec;
use core::cmp::Ordering;
use featql_core::schema::LayerDefn;
use featql_core::{Error, Feature, Fid, Result, Value};

/// Key storage starts with room for this many rows.
const INITIAL_ROWS: usize = 100;

/// Order in which a results layer returns primary features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderIndex {
    /// Source order is already sorted.
    Native,
    /// Feature identifiers in output order.
    Fids(Vec<Fid>),
}

impl OrderIndex {
    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self, OrderIndex::Native)
    }

    /// Number of indexed rows, or None for native order.
    pub fn len(&self) -> Option<usize> {
        match self {
            OrderIndex::Native => None,
            OrderIndex::Fids(fids) => Some(fids.len()),
        }
    }

    /// Identifier of the feature at output position `index`.
    pub fn fid_at(&self, index: u64) -> Option<Fid> {
        match self {
            OrderIndex::Native => None,
            OrderIndex::Fids(fids) => usize::try_from(index).ok().and_then(|i| fids.get(i).copied()),
        }
    }
}

/// Sort key values of `feature`, one per key.
pub fn sort_key_values(feature: &Feature, defn: &LayerDefn, keys: &[OrderDef]) -> Vec<Value> {
    keys.iter().map(|k| feature.field_value(defn, k.field_index)).collect()
}

/// Compares two key tuples.
///
/// A key where either side is NULL compares equal and the next key decides.
pub fn compare_keys(a: &[Value], b: &[Value], keys: &[OrderDef]) -> Ordering {
    for (i, key) in keys.iter().enumerate() {
        let (Some(x), Some(y)) = (a.get(i), b.get(i)) else {
            continue;
        };
        if x.is_null() || y.is_null() {
            continue;
        }
        let ord = x.compare(y).unwrap_or(Ordering::Equal);
        let ord = if key.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Returns the permutation of `0..len` that sorts rows by `cmp`.
///
/// Merge sort: ties keep their relative order as long as `cmp` is
/// consistent.
pub fn sort_permutation<F>(len: usize, cmp: &F) -> Vec<usize>
where
    F: Fn(usize, usize) -> Ordering,
{
    let mut perm: Vec<usize> = (0..len).collect();
    let mut scratch = Vec::with_capacity(len);
    sort_section(&mut perm, &mut scratch, cmp);
    perm
}

fn sort_section<F>(section: &mut [usize], scratch: &mut Vec<usize>, cmp: &F)
where
    F: Fn(usize, usize) -> Ordering,
{
    if section.len() < 2 {
        return;
    }
    let mid = section.len() / 2;
    sort_section(&mut section[..mid], scratch, cmp);
    sort_section(&mut section[mid..], scratch, cmp);

    scratch.clear();
    let (mut i, mut j) = (0, mid);
    while i < mid && j < section.len() {
        // the second half wins only when strictly smaller
        if cmp(section[i], section[j]) == Ordering::Greater {
            scratch.push(section[j]);
            j += 1;
        } else {
            scratch.push(section[i]);
            i += 1;
        }
    }
    scratch.extend_from_slice(&section[i..mid]);
    scratch.extend_from_slice(&section[j..]);
    section.copy_from_slice(scratch);
}

/// Captured sort keys and identifiers, row-major.
#[derive(Debug)]
pub struct KeyBuffer {
    width: usize,
    values: Vec<Value>,
    fids: Vec<Fid>,
    capacity: usize,
    max_rows: Option<usize>,
}

impl KeyBuffer {
    /// Creates a buffer for rows of `width` keys, holding at most `max_rows`.
    pub fn new(width: usize, max_rows: Option<usize>) -> Result<Self> {
        let mut buffer = Self {
            width,
            values: Vec::new(),
            fids: Vec::new(),
            capacity: 0,
            max_rows,
        };
        buffer.reserve_rows(INITIAL_ROWS)?;
        Ok(buffer)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fids.is_empty()
    }

    /// Rows the buffer can hold before growing.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Key values of captured row `row`.
    pub fn row(&self, row: usize) -> &[Value] {
        let start = row * self.width;
        &self.values[start..start + self.width]
    }

    /// Captures one row.
    pub fn push(&mut self, fid: Fid, keys: Vec<Value>) -> Result<()> {
        if let Some(max) = self.max_rows {
            if self.fids.len() >= max {
                return Err(Error::resource_exhausted(format!(
                    "ORDER BY index exceeds {} rows",
                    max
                )));
            }
        }
        if self.fids.len() == self.capacity {
            let grown = self.capacity + self.capacity / 3;
            self.reserve_rows(grown.max(self.capacity + 1))?;
        }
        self.values.extend(keys.into_iter().take(self.width));
        self.values.resize((self.fids.len() + 1) * self.width, Value::Null);
        self.fids.push(fid);
        Ok(())
    }

    fn reserve_rows(&mut self, rows: usize) -> Result<()> {
        let extra = rows - self.fids.len();
        let reserved = extra
            .checked_mul(self.width)
            .map(|n| self.values.try_reserve_exact(n).is_ok() && self.fids.try_reserve_exact(extra).is_ok())
            .unwrap_or(false);
        if !reserved {
            log::error!("cannot allocate ORDER BY key storage for {} rows", rows);
            return Err(Error::resource_exhausted(format!(
                "cannot allocate ORDER BY key storage for {} rows",
                rows
            )));
        }
        self.capacity = rows;
        Ok(())
    }

    /// Sorts the captured rows by `keys`.
    pub fn into_index(self, keys: &[OrderDef]) -> OrderIndex {
        let perm = sort_permutation(self.len(), &|a, b| compare_keys(self.row(a), self.row(b), keys));
        if perm.iter().enumerate().all(|(slot, &p)| slot == p) {
            log::debug!("ORDER BY: {} rows already sorted, using source order", perm.len());
            return OrderIndex::Native;
        }
        log::debug!("ORDER BY: indexed {} rows", perm.len());
        OrderIndex::Fids(perm.into_iter().map(|p| self.fids[p]).collect())
    }
}

/// The first row in sort order, found without storing every key.
#[derive(Debug, Default)]
pub struct BestRow {
    best: Option<(Fid, Vec<Value>)>,
}

impl BestRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a row. It replaces the current best only if strictly smaller.
    pub fn offer(&mut self, fid: Fid, values: Vec<Value>, keys: &[OrderDef]) {
        let replace = match &self.best {
            None => true,
            Some((_, best)) => compare_keys(&values, best, keys) == Ordering::Less,
        };
        if replace {
            self.best = Some((fid, values));
        }
    }

    pub fn into_index(self) -> OrderIndex {
        OrderIndex::Fids(self.best.map(|(fid, _)| alloc::vec![fid]).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use featql_core::FieldType;

    fn asc(field: usize) -> OrderDef {
        OrderDef {
            field_index: field,
            field_type: FieldType::Integer,
            ascending: true,
        }
    }

    fn desc(field: usize) -> OrderDef {
        OrderDef {
            ascending: false,
            ..asc(field)
        }
    }

    fn ints(values: &[Option<i32>]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    #[test]
    fn test_compare_keys() {
        let keys = [asc(0), desc(1)];
        assert_eq!(
            compare_keys(&ints(&[Some(1), Some(5)]), &ints(&[Some(2), Some(0)]), &keys),
            Ordering::Less
        );
        assert_eq!(
            compare_keys(&ints(&[Some(1), Some(5)]), &ints(&[Some(1), Some(7)]), &keys),
            Ordering::Greater
        );
        // NULL on the first key defers to the second
        assert_eq!(
            compare_keys(&ints(&[None, Some(5)]), &ints(&[Some(1), Some(7)]), &keys),
            Ordering::Greater
        );
        assert_eq!(
            compare_keys(&ints(&[None, None]), &ints(&[Some(1), Some(7)]), &keys),
            Ordering::Equal
        );
    }

    #[test]
    fn test_sort_permutation_is_stable() {
        let data = [3, 1, 3, 2, 1];
        let perm = sort_permutation(data.len(), &|a, b| data[a].cmp(&data[b]));
        assert_eq!(perm, vec![1, 4, 3, 0, 2]);
        assert!(sort_permutation(0, &|_, _| Ordering::Equal).is_empty());
    }

    #[test]
    fn test_buffer_growth() {
        let mut buffer = KeyBuffer::new(1, None).unwrap();
        assert_eq!(buffer.capacity(), 100);
        for i in 0..101 {
            buffer.push(i, vec![Value::Integer(i as i32)]).unwrap();
        }
        assert_eq!(buffer.capacity(), 133);
        assert_eq!(buffer.row(100), &[Value::Integer(100)]);
    }

    #[test]
    fn test_buffer_limit() {
        let mut buffer = KeyBuffer::new(1, Some(2)).unwrap();
        buffer.push(0, vec![Value::Integer(1)]).unwrap();
        buffer.push(1, vec![Value::Integer(2)]).unwrap();
        assert!(matches!(
            buffer.push(2, vec![Value::Integer(3)]),
            Err(Error::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_identity_permutation_is_dropped() {
        let mut buffer = KeyBuffer::new(1, None).unwrap();
        for (fid, v) in [(10, 1), (11, 2), (12, 2)] {
            buffer.push(fid, vec![Value::Integer(v)]).unwrap();
        }
        assert_eq!(buffer.into_index(&[asc(0)]), OrderIndex::Native);

        let mut buffer = KeyBuffer::new(1, None).unwrap();
        for (fid, v) in [(10, 1), (11, 2), (12, 2)] {
            buffer.push(fid, vec![Value::Integer(v)]).unwrap();
        }
        let index = buffer.into_index(&[desc(0)]);
        assert_eq!(index, OrderIndex::Fids(vec![11, 12, 10]));
        assert_eq!(index.fid_at(2), Some(10));
        assert_eq!(index.fid_at(3), None);
    }

    fn best_of(rows: &[(Fid, Option<i32>)], keys: &[OrderDef]) -> OrderIndex {
        let mut best = BestRow::new();
        for (fid, v) in rows {
            best.offer(*fid, ints(&[*v]), keys);
        }
        best.into_index()
    }

    #[test]
    fn test_best_row() {
        let rows = [(1, Some(5)), (2, Some(3)), (3, Some(3))];
        assert_eq!(best_of(&rows, &[asc(0)]), OrderIndex::Fids(vec![2]));
        assert_eq!(best_of(&rows, &[desc(0)]), OrderIndex::Fids(vec![1]));
        assert_eq!(best_of(&[], &[asc(0)]), OrderIndex::Fids(vec![]));
    }
}
