use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::{json, Map, Value as JsonValue};

use crate::{
    record::as_i64,
    wire::{ApiRequest, Message, RecordData},
    DataInfo, EditRecord, ErrorCode, FieldData, Find, FmError, Foundset, GetRecord, GetRecords,
    NewRecord, Portal, Record, ScriptPhase, ScriptResult, Scripts,
};

/// Database a request is addressed to.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Target<'a> {
    pub api_version: &'a str,
    pub database: &'a str,
}

impl Target<'_> {
    fn database_path(&self) -> Vec<String> {
        ["fmi", "data", self.api_version, "databases", self.database]
            .map(str::to_owned)
            .to_vec()
    }

    fn database_child(&self, tail: &[&str]) -> Vec<String> {
        let mut segments = self.database_path();
        segments.extend(tail.iter().map(|segment| (*segment).to_owned()));
        segments
    }

    fn layout_path(&self, layout: &str, tail: &[&str]) -> Vec<String> {
        let mut segments = self.database_child(&["layouts", layout]);
        segments.extend(tail.iter().map(|segment| (*segment).to_owned()));
        segments
    }

    fn record_path(&self, layout: &str, record_id: i64) -> Vec<String> {
        let record_id = record_id.to_string();
        self.layout_path(layout, &["records", record_id.as_str()])
    }
}

pub(crate) fn build_login(target: Target<'_>, user: &str, password: &str) -> ApiRequest {
    let mut request = ApiRequest::new(Method::POST, target.database_child(&["sessions"]))
        .with_body(json!({}));
    request.basic_auth = Some((user.to_owned(), password.to_owned()));
    request
}

pub(crate) fn build_logout(target: Target<'_>, token: &str) -> ApiRequest {
    ApiRequest::new(Method::DELETE, target.database_child(&["sessions", token]))
}

pub(crate) fn build_create_record(
    target: Target<'_>,
    layout: &str,
    record: NewRecord,
) -> ApiRequest {
    let mut body = Map::new();
    body.insert("fieldData".to_owned(), JsonValue::Object(record.field_data));
    if let Some(portal_data) = record.portal_data {
        body.insert("portalData".to_owned(), JsonValue::Object(portal_data));
    }
    insert_scripts(&mut body, &record.scripts);

    ApiRequest::new(Method::POST, target.layout_path(layout, &["records"]))
        .with_body(JsonValue::Object(body))
}

pub(crate) fn build_edit_record(
    target: Target<'_>,
    layout: &str,
    record_id: i64,
    edit: EditRecord,
) -> ApiRequest {
    let mut body = Map::new();
    body.insert("fieldData".to_owned(), JsonValue::Object(edit.field_data));
    if let Some(mod_id) = edit.mod_id {
        body.insert("modId".to_owned(), JsonValue::String(mod_id.to_string()));
    }
    if let Some(portal_data) = edit.portal_data {
        body.insert("portalData".to_owned(), JsonValue::Object(portal_data));
    }
    insert_scripts(&mut body, &edit.scripts);

    ApiRequest::new(Method::PATCH, target.record_path(layout, record_id))
        .with_body(JsonValue::Object(body))
}

pub(crate) fn build_delete_record(
    target: Target<'_>,
    layout: &str,
    record_id: i64,
    scripts: &Scripts,
) -> ApiRequest {
    ApiRequest::new(Method::DELETE, target.record_path(layout, record_id))
        .with_params(scripts.pairs())
}

pub(crate) fn build_get_record(
    target: Target<'_>,
    layout: &str,
    record_id: i64,
    options: &GetRecord,
) -> Result<ApiRequest, FmError> {
    let mut params = portal_query_params(&options.portals)?;
    params.extend(options.scripts.pairs());
    Ok(ApiRequest::new(Method::GET, target.record_path(layout, record_id)).with_params(params))
}

pub(crate) fn build_get_records(
    target: Target<'_>,
    layout: &str,
    options: &GetRecords,
) -> Result<ApiRequest, FmError> {
    let mut params = vec![
        ("_offset".to_owned(), options.offset.to_string()),
        ("_limit".to_owned(), options.limit.to_string()),
    ];
    if !options.sort.is_empty() {
        let sort = serde_json::to_string(&options.sort)
            .map_err(|err| FmError::Decode(format!("could not encode sort order: {err}")))?;
        params.push(("_sort".to_owned(), sort));
    }
    params.extend(portal_query_params(&options.portals)?);
    params.extend(options.scripts.pairs());

    Ok(
        ApiRequest::new(Method::GET, target.layout_path(layout, &["records"]))
            .with_params(params),
    )
}

pub(crate) fn build_find(
    target: Target<'_>,
    layout: &str,
    find: &Find,
) -> Result<ApiRequest, FmError> {
    let mut body = Map::new();
    body.insert(
        "query".to_owned(),
        JsonValue::Array(find.query.iter().cloned().map(JsonValue::Object).collect()),
    );
    if !find.sort.is_empty() {
        let sort = serde_json::to_value(&find.sort)
            .map_err(|err| FmError::Decode(format!("could not encode sort order: {err}")))?;
        body.insert("sort".to_owned(), sort);
    }
    body.insert("offset".to_owned(), JsonValue::String(find.offset.to_string()));
    body.insert("limit".to_owned(), JsonValue::String(find.limit.to_string()));

    if !find.portals.is_empty() {
        let names = find
            .portals
            .iter()
            .map(|portal| JsonValue::String(portal.name.clone()))
            .collect();
        body.insert("portal".to_owned(), JsonValue::Array(names));
        for portal in &find.portals {
            body.insert(
                format!("offset.{}", portal.name),
                JsonValue::String(portal.offset.to_string()),
            );
            body.insert(
                format!("limit.{}", portal.name),
                JsonValue::String(portal.limit.to_string()),
            );
        }
    }
    insert_scripts(&mut body, &find.scripts);

    Ok(
        ApiRequest::new(Method::POST, target.layout_path(layout, &["_find"]))
            .with_body(JsonValue::Object(body)),
    )
}

pub(crate) fn build_perform_script(
    target: Target<'_>,
    layout: &str,
    name: &str,
    param: Option<&str>,
) -> ApiRequest {
    let params = param
        .map(|param| vec![("script.param".to_owned(), param.to_owned())])
        .unwrap_or_default();
    ApiRequest::new(Method::GET, target.layout_path(layout, &["script", name]))
        .with_params(params)
}

pub(crate) fn build_set_globals(target: Target<'_>, globals: FieldData) -> ApiRequest {
    ApiRequest::new(Method::PATCH, target.database_child(&["globals"]))
        .with_body(json!({ "globalFields": globals }))
}

/// Portal selection for GET requests:
/// `portal=["A","B"]&_offset.A=1&_limit.A=50`.
fn portal_query_params(portals: &[Portal]) -> Result<Vec<(String, String)>, FmError> {
    if portals.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<&str> = portals.iter().map(|portal| portal.name.as_str()).collect();
    let selector = serde_json::to_string(&names)
        .map_err(|err| FmError::Decode(format!("could not encode portal names: {err}")))?;

    let mut params = vec![("portal".to_owned(), selector)];
    for portal in portals {
        params.push((format!("_offset.{}", portal.name), portal.offset.to_string()));
        params.push((format!("_limit.{}", portal.name), portal.limit.to_string()));
    }
    Ok(params)
}

fn insert_scripts(body: &mut Map<String, JsonValue>, scripts: &Scripts) {
    for (key, value) in scripts.pairs() {
        body.insert(key, JsonValue::String(value));
    }
}

/// Code and message of the first entry in `messages`.
///
/// A body without a usable code reports [`ErrorCode::UNKNOWN`].
pub(crate) fn response_status(data: &JsonValue) -> (ErrorCode, String) {
    let first = data
        .get("messages")
        .and_then(JsonValue::as_array)
        .and_then(|messages| messages.first())
        .and_then(|message| serde_json::from_value::<Message>(message.clone()).ok());

    let Some(message) = first else {
        return (ErrorCode::UNKNOWN, "Unknown error".to_owned());
    };

    let code = message
        .code
        .as_ref()
        .and_then(as_i64)
        .map(ErrorCode)
        .unwrap_or(ErrorCode::UNKNOWN);
    let text = message.message.unwrap_or_else(|| "Unknown error".to_owned());
    (code, text)
}

/// Script outcomes reported alongside any successful response.
pub(crate) fn decode_script_results(data: &JsonValue) -> BTreeMap<ScriptPhase, ScriptResult> {
    let mut results = BTreeMap::new();
    let Some(response) = data.get("response") else {
        return results;
    };

    for phase in ScriptPhase::ALL {
        let suffix = phase.response_suffix();
        let Some(error) = response.get(format!("scriptError{suffix}")) else {
            continue;
        };
        let result = response
            .get(format!("scriptResult{suffix}"))
            .and_then(JsonValue::as_str)
            .map(str::to_owned);
        results.insert(
            phase,
            ScriptResult {
                error: as_i64(error).map(ErrorCode).unwrap_or(ErrorCode::UNKNOWN),
                result,
            },
        );
    }
    results
}

pub(crate) fn decode_token(data: &JsonValue) -> Result<String, FmError> {
    data.pointer("/response/token")
        .and_then(JsonValue::as_str)
        .map(str::to_owned)
        .ok_or_else(|| FmError::Decode("login response carries no token".to_owned()))
}

pub(crate) fn decode_record_id(data: &JsonValue) -> Result<i64, FmError> {
    data.pointer("/response/recordId")
        .and_then(as_i64)
        .ok_or_else(|| FmError::Decode("create response carries no recordId".to_owned()))
}

pub(crate) fn decode_script_result(data: &JsonValue) -> Result<ScriptResult, FmError> {
    decode_script_results(data)
        .remove(&ScriptPhase::After)
        .ok_or_else(|| FmError::Decode("script response carries no scriptError".to_owned()))
}

pub(crate) fn decode_first_record(data: &JsonValue) -> Result<Record, FmError> {
    let first = data
        .pointer("/response/data/0")
        .ok_or_else(|| FmError::Decode("record response carries no data".to_owned()))?;
    decode_record(first)
}

pub(crate) fn decode_foundset(data: &JsonValue) -> Result<Foundset, FmError> {
    let rows = data
        .pointer("/response/data")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| FmError::Decode("foundset response carries no data array".to_owned()))?;

    let records = rows
        .iter()
        .map(decode_record)
        .collect::<Result<Vec<_>, _>>()?;

    let info = data
        .pointer("/response/dataInfo")
        .map(|info| serde_json::from_value::<DataInfo>(info.clone()))
        .transpose()
        .map_err(|err| FmError::Decode(format!("invalid dataInfo: {err}")))?;

    Ok(Foundset::new(records).with_info(info))
}

pub(crate) fn decode_record(value: &JsonValue) -> Result<Record, FmError> {
    let data = serde_json::from_value::<RecordData>(value.clone())
        .map_err(|err| FmError::Decode(format!("invalid record: {err}")))?;

    let mut keys = Vec::with_capacity(data.field_data.len() + 2);
    let mut values = Vec::with_capacity(data.field_data.len() + 2);
    for (key, value) in data.field_data {
        keys.push(key);
        values.push(value);
    }
    if let Some(record_id) = data.record_id {
        keys.push("recordId".to_owned());
        values.push(record_id);
    }
    if let Some(mod_id) = data.mod_id {
        keys.push("modId".to_owned());
        values.push(mod_id);
    }

    let mut portals = BTreeMap::new();
    for (name, rows) in data.portal_data {
        portals.insert(name.clone(), decode_portal_rows(&name, rows)?);
    }

    Ok(Record::new(keys, values)?.with_portals(portals))
}

/// Portal rows are flat objects: related fields plus `recordId`/`modId`.
fn decode_portal_rows(name: &str, rows: JsonValue) -> Result<Foundset, FmError> {
    let JsonValue::Array(rows) = rows else {
        return Err(FmError::Decode(format!("portal {name} is not an array")));
    };

    let records = rows
        .into_iter()
        .map(|row| match row {
            JsonValue::Object(fields) => {
                let (keys, values): (Vec<String>, Vec<JsonValue>) = fields.into_iter().unzip();
                Record::new(keys, values)
            }
            _ => Err(FmError::Decode(format!("portal {name} row is not an object"))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Foundset::new(records))
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::Target;
    use crate::{
        decode, EditRecord, ErrorCode, FieldData, Find, FmError, GetRecord, GetRecords, NewRecord,
        Portal, ScriptCall, ScriptPhase, Scripts, SortOrder,
    };

    const TARGET: Target<'static> = Target {
        api_version: "v1",
        database: "Contacts",
    };

    fn fields(value: serde_json::Value) -> FieldData {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn login_uses_basic_auth_and_sessions_path() {
        let request = decode::build_login(TARGET, "admin", "secret");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path(), "/fmi/data/v1/databases/Contacts/sessions");
        assert_eq!(request.body, Some(json!({})));
        assert_eq!(
            request.basic_auth,
            Some(("admin".to_owned(), "secret".to_owned()))
        );
    }

    #[test]
    fn create_body_carries_field_portal_and_script_data() {
        let record = NewRecord {
            field_data: fields(json!({"name": "Kit"})),
            portal_data: Some(fields(json!({"notes": [{"Notes::note": "hi"}]}))),
            scripts: Scripts {
                after: Some(ScriptCall::new("Log").with_param("x")),
                ..Scripts::default()
            },
        };
        let request = decode::build_create_record(TARGET, "People", record);

        assert_eq!(
            request.path(),
            "/fmi/data/v1/databases/Contacts/layouts/People/records"
        );
        assert_eq!(
            request.body,
            Some(json!({
                "fieldData": {"name": "Kit"},
                "portalData": {"notes": [{"Notes::note": "hi"}]},
                "script": "Log",
                "script.param": "x"
            }))
        );
    }

    #[test]
    fn edit_sends_mod_id_as_text() {
        let request = decode::build_edit_record(
            TARGET,
            "People",
            12,
            EditRecord::new(fields(json!({"name": "Kat"}))).with_mod_id(4),
        );
        assert_eq!(request.method, Method::PATCH);
        assert!(request.path().ends_with("/layouts/People/records/12"));
        assert_eq!(
            request.body,
            Some(json!({"fieldData": {"name": "Kat"}, "modId": "4"}))
        );
    }

    #[test]
    fn get_record_portal_params() {
        let options = GetRecord {
            portals: vec![Portal::new("Portal1"), Portal::new("Portal2").with_range(2, 51)],
            scripts: Scripts::default(),
        };
        let request = decode::build_get_record(TARGET, "People", 3, &options).expect("must build");

        assert_eq!(
            request.params,
            vec![
                ("portal".to_owned(), r#"["Portal1","Portal2"]"#.to_owned()),
                ("_offset.Portal1".to_owned(), "1".to_owned()),
                ("_limit.Portal1".to_owned(), "50".to_owned()),
                ("_offset.Portal2".to_owned(), "2".to_owned()),
                ("_limit.Portal2".to_owned(), "51".to_owned()),
            ]
        );
    }

    #[test]
    fn get_records_paging_and_sort() {
        let options = GetRecords {
            sort: vec![SortOrder::descend("created")],
            ..GetRecords::default()
        };
        let request = decode::build_get_records(TARGET, "People", &options).expect("must build");

        assert_eq!(request.params[0], ("_offset".to_owned(), "1".to_owned()));
        assert_eq!(request.params[1], ("_limit".to_owned(), "100".to_owned()));
        assert_eq!(
            request.params[2],
            (
                "_sort".to_owned(),
                r#"[{"fieldName":"created","sortOrder":"descend"}]"#.to_owned()
            )
        );
    }

    #[test]
    fn find_body_shape() {
        let find = Find {
            portals: vec![Portal::new("notes")],
            ..Find::new([fields(json!({"name": "==Kit"}))]).with_range(1, 10)
        };
        let request = decode::build_find(TARGET, "People", &find).expect("must build");

        assert!(request.path().ends_with("/layouts/People/_find"));
        assert_eq!(
            request.body,
            Some(json!({
                "query": [{"name": "==Kit"}],
                "offset": "1",
                "limit": "10",
                "portal": ["notes"],
                "offset.notes": "1",
                "limit.notes": "50"
            }))
        );
    }

    #[test]
    fn delete_and_script_use_query_params() {
        let scripts = Scripts {
            prerequest: Some(ScriptCall::new("Check")),
            ..Scripts::default()
        };
        let delete = decode::build_delete_record(TARGET, "People", 9, &scripts);
        assert_eq!(delete.method, Method::DELETE);
        assert_eq!(
            delete.params,
            vec![("script.prerequest".to_owned(), "Check".to_owned())]
        );

        let script = decode::build_perform_script(TARGET, "People", "Tally", Some("all"));
        assert!(script.path().ends_with("/layouts/People/script/Tally"));
        assert_eq!(
            script.params,
            vec![("script.param".to_owned(), "all".to_owned())]
        );
    }

    #[test]
    fn names_are_escaped_one_segment_at_a_time() {
        let request = decode::build_get_record(TARGET, "Invoices #2", 1, &GetRecord::default())
            .expect("must build");
        assert_eq!(
            request.path(),
            "/fmi/data/v1/databases/Contacts/layouts/Invoices #2/records/1"
        );

        let url = request.url("https://fms.example.com").expect("valid base");
        assert_eq!(
            url.path(),
            "/fmi/data/v1/databases/Contacts/layouts/Invoices%20%232/records/1"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let script = decode::build_perform_script(TARGET, "A/B", "Run?", None)
            .url("https://fms.example.com/")
            .expect("valid base");
        assert_eq!(
            script.path(),
            "/fmi/data/v1/databases/Contacts/layouts/A%2FB/script/Run%3F"
        );
    }

    #[test]
    fn rejects_base_url_without_scheme() {
        let request = decode::build_login(TARGET, "admin", "secret");
        let err = request.url("fms.example.com").expect_err("must fail");
        assert!(matches!(err, FmError::InvalidUrl(_)));
    }

    #[test]
    fn response_status_accepts_text_and_numeric_codes() {
        let (code, message) =
            decode::response_status(&json!({"messages": [{"code": "401", "message": "No records match the request"}]}));
        assert_eq!(code, ErrorCode::NO_RECORDS_MATCH);
        assert_eq!(message, "No records match the request");

        let (code, _) = decode::response_status(&json!({"messages": [{"code": 0, "message": "OK"}]}));
        assert_eq!(code, ErrorCode::SUCCESS);

        let (code, message) = decode::response_status(&json!({"errorMessage": "SSL required"}));
        assert_eq!(code, ErrorCode::UNKNOWN);
        assert_eq!(message, "Unknown error");
    }

    #[test]
    fn decodes_record_with_portal() {
        let record = decode::decode_record(&json!({
            "fieldData": {"name": "Kit", "drink": "Coffee"},
            "portalData": {
                "notes": [
                    {"recordId": "1", "Notes::note": "first", "modId": "0"}
                ]
            },
            "recordId": "7",
            "modId": "2"
        }))
        .expect("must decode");

        assert_eq!(record.get_text("name"), Some("Kit"));
        assert_eq!(record.record_id(), Some(7));
        assert_eq!(record.modification_id(), Some(2));

        let notes = record.portal("notes").expect("portal must exist");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].get_text("Notes::note"), Some("first"));
    }

    #[test]
    fn rejects_non_array_portal() {
        let err = decode::decode_record(&json!({
            "fieldData": {},
            "portalData": {"notes": "oops"}
        }))
        .expect_err("must fail");
        assert!(matches!(err, FmError::Decode(_)));
    }

    #[test]
    fn decodes_foundset_with_data_info() {
        let foundset = decode::decode_foundset(&json!({
            "response": {
                "dataInfo": {
                    "database": "Contacts",
                    "layout": "People",
                    "table": "People",
                    "totalRecordCount": 10,
                    "foundCount": 2,
                    "returnedCount": 2
                },
                "data": [
                    {"fieldData": {"name": "A"}, "recordId": "1", "modId": "0"},
                    {"fieldData": {"name": "B"}, "recordId": "2", "modId": "0"}
                ]
            },
            "messages": [{"code": "0", "message": "OK"}]
        }))
        .expect("must decode");

        assert_eq!(foundset.len(), 2);
        let info = foundset.info().expect("info must exist");
        assert_eq!(info.found_count, Some(2));
        assert_eq!(info.total_record_count, Some(10));
    }

    #[test]
    fn decodes_script_results_per_phase() {
        let data = json!({
            "response": {
                "scriptError.prerequest": "0",
                "scriptResult.prerequest": "ready",
                "scriptError": "3",
                "modId": "1"
            }
        });
        let results = decode::decode_script_results(&data);
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[&ScriptPhase::Prerequest].result.as_deref(),
            Some("ready")
        );

        let after = decode::decode_script_result(&data).expect("must decode");
        assert_eq!(after.error, ErrorCode(3));
        assert_eq!(after.result, None);
    }

    #[test]
    fn token_and_record_id() {
        let token = decode::decode_token(&json!({"response": {"token": "abc"}})).expect("token");
        assert_eq!(token, "abc");
        assert!(decode::decode_token(&json!({"response": {}})).is_err());

        let id = decode::decode_record_id(&json!({"response": {"recordId": "42", "modId": "0"}}))
            .expect("record id");
        assert_eq!(id, 42);
    }
}
