use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

use crate::{EditRecord, FieldData, FmError, Foundset, Result};

/// A FileMaker record: field names aligned with their values.
///
/// Keys are the fields placed on the layout plus `recordId` and `modId`.
/// Related rows live in named portals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    keys: Vec<String>,
    values: Vec<JsonValue>,
    portals: BTreeMap<String, Foundset>,
    modifications: FieldData,
}

impl Record {
    /// Builds a record from aligned keys and values.
    pub fn new(keys: Vec<String>, values: Vec<JsonValue>) -> Result<Self> {
        if keys.len() != values.len() {
            return Err(FmError::Decode(format!(
                "length of keys ({}) does not match length of values ({})",
                keys.len(),
                values.len()
            )));
        }
        Ok(Self {
            keys,
            values,
            portals: BTreeMap::new(),
            modifications: Map::new(),
        })
    }

    pub(crate) fn with_portals(mut self, portals: BTreeMap<String, Foundset>) -> Self {
        self.portals = portals;
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[JsonValue] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        let idx = self.keys.iter().position(|key| key == name)?;
        self.values.get(idx)
    }

    /// Like [`Record::get`], but a missing field is an error.
    pub fn field(&self, name: &str) -> Result<&JsonValue> {
        self.get(name)
            .ok_or_else(|| FmError::MissingField(name.to_owned()))
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    /// Integer value; numeric text is accepted since FileMaker sends ids
    /// as strings.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        as_i64(self.get(name)?)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            JsonValue::Number(number) => number.as_f64(),
            JsonValue::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn record_id(&self) -> Option<i64> {
        self.get_i64("recordId")
    }

    pub fn modification_id(&self) -> Option<i64> {
        self.get_i64("modId")
    }

    pub fn portal(&self, name: &str) -> Option<&Foundset> {
        self.portals.get(name)
    }

    pub fn portal_names(&self) -> impl Iterator<Item = &str> {
        self.portals.keys().map(String::as_str)
    }

    /// Changes a field locally and remembers it for [`Record::to_edit`].
    ///
    /// Only fields the record already carries can be set; `recordId` and
    /// `modId` are read-only.
    pub fn set(&mut self, name: &str, value: impl Into<JsonValue>) -> Result<()> {
        if name == "recordId" || name == "modId" {
            return Err(FmError::Decode(format!("field {name} is read-only")));
        }
        let idx = self
            .keys
            .iter()
            .position(|key| key == name)
            .ok_or_else(|| FmError::MissingField(name.to_owned()))?;

        let value = value.into();
        self.values[idx] = value.clone();
        self.modifications.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn modifications(&self) -> &FieldData {
        &self.modifications
    }

    pub fn is_dirty(&self) -> bool {
        !self.modifications.is_empty()
    }

    /// Edit payload carrying the local modifications, guarded by the
    /// record's current `modId`.
    pub fn to_edit(&self) -> EditRecord {
        EditRecord {
            field_data: self.modifications.clone(),
            mod_id: self.modification_id(),
            ..EditRecord::default()
        }
    }

    /// Field data as a JSON object, without the id keys.
    pub fn to_field_data(&self) -> FieldData {
        self.keys
            .iter()
            .zip(&self.values)
            .filter(|(key, _)| key.as_str() != "recordId" && key.as_str() != "modId")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

pub(crate) fn as_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(number) => number.as_i64(),
        JsonValue::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
