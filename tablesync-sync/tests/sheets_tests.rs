use pretty_assertions::assert_eq;
use serde_json::json;
use tablesync_sync::{column_letter, CellWrite, RetryPolicy, SheetStore, SheetsClient, SheetsConfig, SyncError};
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> SheetsClient {
    let config = SheetsConfig {
        api_base_url: server.uri(),
        spreadsheet_id: "sid".to_string(),
        ..Default::default()
    };
    SheetsClient::new(config, "tok".to_string(), RetryPolicy::immediate(3)).unwrap()
}

fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| (*c).to_string()).collect()
}

// ── Helpers and config ──────────────────────────────────────────

#[test]
fn column_letters() {
    assert_eq!(column_letter(1), "A");
    assert_eq!(column_letter(26), "Z");
    assert_eq!(column_letter(27), "AA");
    assert_eq!(column_letter(52), "AZ");
    assert_eq!(column_letter(703), "AAA");
}

#[test]
fn config_default() {
    let cfg = SheetsConfig::default();
    assert_eq!(cfg.api_base_url, "https://sheets.googleapis.com");
    assert!(cfg.spreadsheet_id.is_empty());
}

#[test]
fn empty_spreadsheet_id_is_rejected() {
    let err = SheetsClient::new(SheetsConfig::default(), "tok".into(), RetryPolicy::default()).unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
}

// ── Reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn list_fields_trims_header_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sid/values/%27Items%27%211%3A1$"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Items!A1:C1",
            "values": [[" ID ", "Name", "", "Qty "]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let header = client(&server).list_fields("Items").await.unwrap();
    assert_eq!(header, strings(&["ID", "Name", "", "Qty"]));
}

#[tokio::test]
async fn read_all_returns_body_rows_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sid/values/%27Items%27%21A2%3AC$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [["1", " Bolt ", 3], [], ["2"]]
        })))
        .mount(&server)
        .await;

    let rows = client(&server).read_all("Items", 3).await.unwrap();
    assert_eq!(
        rows,
        vec![strings(&["1", " Bolt ", "3"]), Vec::new(), strings(&["2"])]
    );
}

#[tokio::test]
async fn read_all_of_empty_tab_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/values/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "Items!A2:C" })))
        .mount(&server)
        .await;

    assert!(client(&server).read_all("Items", 3).await.unwrap().is_empty());
}

// ── Writes ──────────────────────────────────────────────────────

#[tokio::test]
async fn write_cells_batches_single_cell_ranges() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sid/values:batchUpdate"))
        .and(body_partial_json(json!({
            "valueInputOption": "RAW",
            "data": [
                { "range": "'Items'!C5:C5", "values": [["7"]] },
                { "range": "'Items'!A2:A2", "values": [["x"]] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let cells = vec![
        CellWrite { position: 3, column: 2, value: "7".into() },
        CellWrite { position: 0, column: 0, value: "x".into() },
    ];
    client(&server).write_cells("Items", &cells).await.unwrap();
}

#[tokio::test]
async fn empty_writes_make_no_requests() {
    let server = MockServer::start().await;
    let sheets = client(&server);
    sheets.write_cells("Items", &[]).await.unwrap();
    sheets.append_rows("Items", &[]).await.unwrap();
    sheets.delete_rows("Items", &[]).await.unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn append_rows_inserts_raw_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/values/%27Items%27%21A1:append$"))
        .and(query_param("valueInputOption", "RAW"))
        .and(query_param("insertDataOption", "INSERT_ROWS"))
        .and(body_partial_json(json!({ "values": [["1", "Bolt"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .append_rows("Items", &[strings(&["1", "Bolt"])])
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_rows_removes_highest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [
                { "properties": { "sheetId": 0, "title": "Other" } },
                { "properties": { "sheetId": 42, "title": "Items" } }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sid:batchUpdate"))
        .and(body_partial_json(json!({
            "requests": [
                { "deleteDimension": { "range": { "sheetId": 42, "dimension": "ROWS", "startIndex": 6, "endIndex": 7 } } },
                { "deleteDimension": { "range": { "sheetId": 42, "dimension": "ROWS", "startIndex": 2, "endIndex": 3 } } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_rows("Items", &[1, 5, 1]).await.unwrap();
}

#[tokio::test]
async fn ensure_table_adds_missing_tab_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [{ "properties": { "sheetId": 0, "title": "Items" } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sid:batchUpdate"))
        .and(body_partial_json(json!({
            "requests": [{ "addSheet": { "properties": { "title": "_meta" } } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let sheets = client(&server);
    sheets.ensure_table("Items").await.unwrap();
    sheets.ensure_table("_meta").await.unwrap();
}

#[tokio::test]
async fn ensure_fields_appends_missing_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"%211%3A1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [["Name", "Notes"]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/values/%27Items%27%21A1%3AD1$"))
        .and(query_param("valueInputOption", "RAW"))
        .and(body_partial_json(json!({ "values": [["Name", "Notes", "ID", "Qty"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let header = client(&server)
        .ensure_fields("Items", &strings(&["ID", "Name", "Qty"]))
        .await
        .unwrap();
    assert_eq!(header, strings(&["Name", "Notes", "ID", "Qty"]));
}

// ── Errors and retry ────────────────────────────────────────────

#[tokio::test]
async fn transient_status_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": [["ID"]] })))
        .mount(&server)
        .await;

    let header = client(&server).list_fields("Items").await.unwrap();
    assert_eq!(header, strings(&["ID"]));
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Unable to parse range"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).list_fields("Missing").await.unwrap_err();
    match err {
        SyncError::Http { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Unable to parse range"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn retries_stop_at_the_attempt_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).list_fields("Items").await.unwrap_err();
    assert!(err.is_transient());
}
