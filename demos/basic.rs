use fmrest_http::{FieldData, Find, FmClient, GetRecords, SortOrder};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let layout = std::env::var("FMREST_LAYOUT")?;
    let fms = FmClient::from_env().map_err(anyhow::Error::msg)?;

    fms.login().await?;

    let mut fields = FieldData::new();
    fields.insert("name".to_owned(), json!("Kit"));
    let record_id = fms.create_record(&layout, fields).await?;
    println!("created record {record_id}");

    let mut query = FieldData::new();
    query.insert("name".to_owned(), json!("Kit"));
    let found = fms
        .find(&layout, Find::new([query]).sorted_by([SortOrder::descend("name")]))
        .await?;
    for record in &found {
        println!("{:?} {:?}", record.record_id(), record.get_text("name"));
    }

    let all = fms.get_records(&layout, GetRecords::default()).await?;
    if let Some(info) = all.info() {
        println!("{:?} records in {:?}", info.total_record_count, info.table);
    }

    fms.logout().await?;
    Ok(())
}
