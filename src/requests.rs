use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Field name to value map, as sent in `fieldData` and `globalFields`.
pub type FieldData = Map<String, JsonValue>;

/// One find request, e.g. `{"name": "==Kit", "omit": "true"}`.
pub type FindRequest = Map<String, JsonValue>;

/// Portal to include in a read, with its own row window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Portal {
    /// Object name of the portal on the layout.
    pub name: String,
    /// First related row, 1-based.
    pub offset: u32,
    /// Maximum number of related rows.
    pub limit: u32,
}

impl Portal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offset: 1,
            limit: 50,
        }
    }

    pub fn with_range(mut self, offset: u32, limit: u32) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascend,
    Descend,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SortOrder {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    #[serde(rename = "sortOrder")]
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn ascend(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            direction: SortDirection::Ascend,
        }
    }

    pub fn descend(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            direction: SortDirection::Descend,
        }
    }
}

/// A FileMaker script and its optional parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptCall {
    pub name: String,
    pub param: Option<String>,
}

impl ScriptCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: None,
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }
}

/// Scripts run by the server around a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scripts {
    /// Runs before the request is processed.
    pub prerequest: Option<ScriptCall>,
    /// Runs before the found set is sorted.
    pub presort: Option<ScriptCall>,
    /// Runs after the request.
    pub after: Option<ScriptCall>,
}

impl Scripts {
    pub fn is_empty(&self) -> bool {
        self.prerequest.is_none() && self.presort.is_none() && self.after.is_none()
    }

    /// Data API key/value pairs, e.g. `script.prerequest` and
    /// `script.prerequest.param`.
    pub(crate) fn pairs(&self) -> Vec<(String, String)> {
        let phases = [
            ("script.prerequest", &self.prerequest),
            ("script.presort", &self.presort),
            ("script", &self.after),
        ];

        let mut pairs = Vec::new();
        for (key, call) in phases {
            if let Some(call) = call {
                pairs.push((key.to_owned(), call.name.clone()));
                if let Some(param) = &call.param {
                    pairs.push((format!("{key}.param"), param.clone()));
                }
            }
        }
        pairs
    }
}

/// Payload of [`crate::FmClient::create_record`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewRecord {
    pub field_data: FieldData,
    /// Related rows to create, keyed by portal or table occurrence name.
    pub portal_data: Option<Map<String, JsonValue>>,
    pub scripts: Scripts,
}

impl NewRecord {
    pub fn new(field_data: FieldData) -> Self {
        Self {
            field_data,
            ..Self::default()
        }
    }
}

impl From<FieldData> for NewRecord {
    fn from(field_data: FieldData) -> Self {
        Self::new(field_data)
    }
}

/// Payload of [`crate::FmClient::edit_record`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditRecord {
    pub field_data: FieldData,
    /// Reject the edit unless the record still has this modification id.
    pub mod_id: Option<i64>,
    pub portal_data: Option<Map<String, JsonValue>>,
    pub scripts: Scripts,
}

impl EditRecord {
    pub fn new(field_data: FieldData) -> Self {
        Self {
            field_data,
            ..Self::default()
        }
    }

    pub fn with_mod_id(mut self, mod_id: i64) -> Self {
        self.mod_id = Some(mod_id);
        self
    }
}

impl From<FieldData> for EditRecord {
    fn from(field_data: FieldData) -> Self {
        Self::new(field_data)
    }
}

/// Options of [`crate::FmClient::get_record`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetRecord {
    pub portals: Vec<Portal>,
    pub scripts: Scripts,
}

/// Options of [`crate::FmClient::get_records`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetRecords {
    /// First record, 1-based.
    pub offset: u32,
    pub limit: u32,
    pub sort: Vec<SortOrder>,
    pub portals: Vec<Portal>,
    pub scripts: Scripts,
}

impl Default for GetRecords {
    fn default() -> Self {
        Self {
            offset: 1,
            limit: 100,
            sort: Vec::new(),
            portals: Vec::new(),
            scripts: Scripts::default(),
        }
    }
}

/// A find against a layout: one or more find requests plus sorting and
/// paging.
#[derive(Clone, Debug, PartialEq)]
pub struct Find {
    pub query: Vec<FindRequest>,
    pub sort: Vec<SortOrder>,
    pub offset: u32,
    pub limit: u32,
    pub portals: Vec<Portal>,
    pub scripts: Scripts,
}

impl Find {
    pub fn new(query: impl IntoIterator<Item = FindRequest>) -> Self {
        Self {
            query: query.into_iter().collect(),
            sort: Vec::new(),
            offset: 1,
            limit: 100,
            portals: Vec::new(),
            scripts: Scripts::default(),
        }
    }

    pub fn sorted_by(mut self, sort: impl IntoIterator<Item = SortOrder>) -> Self {
        self.sort = sort.into_iter().collect();
        self
    }

    pub fn with_range(mut self, offset: u32, limit: u32) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{Find, Portal, ScriptCall, Scripts, SortOrder};

    #[test]
    fn portal_defaults() {
        let portal = Portal::new("notes");
        assert_eq!((portal.offset, portal.limit), (1, 50));
        let portal = portal.with_range(5, 10);
        assert_eq!((portal.offset, portal.limit), (5, 10));
    }

    #[test]
    fn sort_order_serializes_in_data_api_shape() {
        let value = serde_json::to_value(SortOrder::descend("created")).expect("must serialize");
        assert_eq!(value, json!({"fieldName": "created", "sortOrder": "descend"}));
    }

    #[test]
    fn script_pairs_per_phase() {
        let scripts = Scripts {
            prerequest: Some(ScriptCall::new("Prepare").with_param("a")),
            presort: None,
            after: Some(ScriptCall::new("Log")),
        };

        assert_eq!(
            scripts.pairs(),
            vec![
                ("script.prerequest".to_owned(), "Prepare".to_owned()),
                ("script.prerequest.param".to_owned(), "a".to_owned()),
                ("script".to_owned(), "Log".to_owned()),
            ]
        );
        assert!(Scripts::default().is_empty());
        assert!(Scripts::default().pairs().is_empty());
    }

    #[test]
    fn find_builder() {
        let mut request = serde_json::Map::new();
        request.insert("name".to_owned(), json!("Kit"));
        let find = Find::new([request])
            .sorted_by([SortOrder::ascend("name")])
            .with_range(11, 10);

        assert_eq!(find.query.len(), 1);
        assert_eq!(find.sort.len(), 1);
        assert_eq!((find.offset, find.limit), (11, 10));
    }
}
