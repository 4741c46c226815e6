use std::ops::Index;
use std::slice;

use crate::{DataInfo, Record};

/// Records returned by a range read or a find, or the related rows of a
/// portal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Foundset {
    records: Vec<Record>,
    info: Option<DataInfo>,
}

impl Foundset {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            info: None,
        }
    }

    pub(crate) fn with_info(mut self, info: Option<DataInfo>) -> Self {
        self.info = info;
        self
    }

    /// Counts reported by the server; absent for portals and old servers.
    pub fn info(&self) -> Option<&DataInfo> {
        self.info.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl Index<usize> for Foundset {
    type Output = Record;

    fn index(&self, index: usize) -> &Record {
        &self.records[index]
    }
}

impl IntoIterator for Foundset {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Foundset {
    type Item = &'a Record;
    type IntoIter = slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{Foundset, Record};

    fn record(name: &str, id: i64) -> Record {
        Record::new(
            vec!["name".to_owned(), "recordId".to_owned()],
            vec![json!(name), json!(id.to_string())],
        )
        .expect("must build record")
    }

    #[test]
    fn index_access_and_bounds() {
        let foundset = Foundset::new(vec![
            record("john doe", 1),
            record("john smith", 2),
            record("john wayne", 3),
        ]);

        assert_eq!(foundset[1].get_text("name"), Some("john smith"));
        assert!(foundset.get(3).is_none());
        assert_eq!(foundset.len(), 3);
    }

    #[test]
    fn iterates_repeatedly() {
        let foundset = Foundset::new(vec![record("a", 1), record("b", 2)]);
        let first: Vec<_> = foundset.iter().filter_map(Record::record_id).collect();
        let second: Vec<_> = (&foundset).into_iter().filter_map(Record::record_id).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(first, second);
        assert!(foundset.info().is_none());
    }
}
