use crate::domain::model::{TableReference, TableSchema, TransactionRecord};
use crate::domain::ports::TableSink;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    pub project: String,
    pub dataset: String,
    pub table: String,
    pub api_base: String,
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
}

impl BigQueryConfig {
    /// Builds a config for `table`, which must carry a project by now.
    pub fn for_table(table: &TableReference, api_base: Option<&str>) -> Result<Self> {
        let project = table
            .project
            .clone()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "project".to_string(),
            })?;

        Ok(Self {
            project,
            dataset: table.dataset.clone(),
            table: table.table.clone(),
            api_base: api_base.unwrap_or(DEFAULT_API_BASE).trim_end_matches('/').to_string(),
            access_token: std::env::var(ACCESS_TOKEN_ENV).ok(),
            timeout_seconds: 60,
        })
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.access_token = token;
        }
        self
    }
}

/// Appends rows through the BigQuery v2 REST API (`tabledata.insertAll`).
///
/// Rows are sent without insert ids, so BigQuery performs no deduplication,
/// and a failed request is not retried.
pub struct BigQuerySink {
    config: BigQueryConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RemoteTable {
    schema: Option<RemoteSchema>,
}

#[derive(Debug, Deserialize)]
struct RemoteSchema {
    #[serde(default)]
    fields: Vec<RemoteField>,
}

#[derive(Debug, Deserialize)]
struct RemoteField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertError>,
}

#[derive(Debug, Deserialize)]
struct InsertError {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

fn canonical_type(field_type: &str) -> String {
    match field_type.to_ascii_uppercase().as_str() {
        "FLOAT64" => "FLOAT".to_string(),
        "BOOL" => "BOOLEAN".to_string(),
        other => other.to_string(),
    }
}

impl BigQuerySink {
    pub fn new(config: BigQueryConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn tables_url(&self) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables",
            self.config.api_base, self.config.project, self.config.dataset
        )
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.tables_url(), self.config.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.timeout(Duration::from_secs(self.config.timeout_seconds));
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn failure(&self, action: &str, response: reqwest::Response) -> EtlError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        EtlError::sink(
            self.destination(),
            format!("{} failed with HTTP {}: {}", action, status, body),
        )
    }

    fn check_schema(&self, remote: RemoteTable, schema: &TableSchema) -> Result<()> {
        let remote_fields: Vec<(String, String)> = remote
            .schema
            .map(|s| s.fields)
            .unwrap_or_default()
            .into_iter()
            .map(|f| (f.name, canonical_type(&f.field_type)))
            .collect();

        let expected: Vec<(String, String)> = schema
            .fields
            .iter()
            .map(|c| {
                let column_type = serde_json::to_value(c.column_type)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                (c.name.clone(), column_type)
            })
            .collect();

        if remote_fields != expected {
            return Err(EtlError::sink(
                self.destination(),
                format!(
                    "existing table schema {:?} does not match {:?}",
                    remote_fields, expected
                ),
            ));
        }
        Ok(())
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let body = json!({
            "tableReference": {
                "projectId": self.config.project,
                "datasetId": self.config.dataset,
                "tableId": self.config.table,
            },
            "schema": schema,
        });

        let response = self
            .authorized(self.client.post(self.tables_url()))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!("🆕 Created table {}", self.destination());
                Ok(())
            }
            // Someone else created it between our GET and POST.
            StatusCode::CONFLICT => {
                tracing::debug!("Table {} was created concurrently", self.destination());
                Ok(())
            }
            _ => Err(self.failure("tables.insert", response).await),
        }
    }
}

#[async_trait]
impl TableSink for BigQuerySink {
    fn destination(&self) -> String {
        format!(
            "{}:{}.{}",
            self.config.project, self.config.dataset, self.config.table
        )
    }

    async fn ensure_table(&self, schema: &TableSchema) -> Result<()> {
        tracing::debug!("Looking up table: {}", self.table_url());
        let response = self
            .authorized(self.client.get(self.table_url()))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let remote: RemoteTable = response.json().await?;
                self.check_schema(remote, schema)?;
                tracing::debug!("Table {} already exists", self.destination());
                Ok(())
            }
            StatusCode::NOT_FOUND => self.create_table(schema).await,
            _ => Err(self.failure("tables.get", response).await),
        }
    }

    async fn append(&self, rows: &[TransactionRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let body = json!({
            "kind": "bigquery#tableDataInsertAllRequest",
            "rows": rows.iter().map(|row| json!({ "json": row })).collect::<Vec<_>>(),
        });

        let response = self
            .authorized(self.client.post(format!("{}/insertAll", self.table_url())))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.failure("tabledata.insertAll", response).await);
        }

        let result: InsertAllResponse = response.json().await?;
        if let Some(first) = result.insert_errors.first() {
            let detail = first
                .errors
                .first()
                .map(|e| format!("{}: {}", e.reason, e.message))
                .unwrap_or_default();
            return Err(EtlError::sink(
                self.destination(),
                format!(
                    "{} of {} rows rejected (first at index {}: {})",
                    result.insert_errors.len(),
                    rows.len(),
                    first.index,
                    detail
                ),
            ));
        }

        tracing::debug!("Inserted {} rows into {}", rows.len(), self.destination());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_transaction;
    use httpmock::prelude::*;

    const TABLE_PATH: &str = "/projects/demo/datasets/fraud/tables/transactions";

    fn sink_for(server: &MockServer) -> BigQuerySink {
        BigQuerySink::new(BigQueryConfig {
            project: "demo".to_string(),
            dataset: "fraud".to_string(),
            table: "transactions".to_string(),
            api_base: server.base_url(),
            access_token: Some("test-token".to_string()),
            timeout_seconds: 5,
        })
    }

    fn remote_schema() -> serde_json::Value {
        json!({
            "tableReference": {"projectId": "demo", "datasetId": "fraud", "tableId": "transactions"},
            "schema": {"fields": [
                {"name": "transaction_id", "type": "STRING", "mode": "NULLABLE"},
                {"name": "card_number", "type": "STRING"},
                {"name": "transaction_date", "type": "STRING"},
                {"name": "amount", "type": "FLOAT64"},
                {"name": "merchant", "type": "STRING"},
                {"name": "is_fraud", "type": "BOOL"}
            ]}
        })
    }

    #[tokio::test]
    async fn test_existing_table_is_left_alone() {
        let server = MockServer::start();
        let get_mock = server.mock(|when, then| {
            when.method(GET)
                .path(TABLE_PATH)
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(remote_schema());
        });
        let create_mock = server.mock(|when, then| {
            when.method(POST).path("/projects/demo/datasets/fraud/tables");
            then.status(200);
        });

        let sink = sink_for(&server);
        sink.ensure_table(&TableSchema::transactions()).await.unwrap();
        sink.ensure_table(&TableSchema::transactions()).await.unwrap();

        get_mock.assert_hits(2);
        create_mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_missing_table_is_created_with_schema() {
        let server = MockServer::start();
        let get_mock = server.mock(|when, then| {
            when.method(GET).path(TABLE_PATH);
            then.status(404);
        });
        let create_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/projects/demo/datasets/fraud/tables")
                .json_body_partial(
                    r#"{"tableReference": {"tableId": "transactions"},
                        "schema": {"fields": [{"name": "transaction_id", "type": "STRING", "mode": "NULLABLE"}]}}"#,
                );
            then.status(200).json_body(remote_schema());
        });

        sink_for(&server)
            .ensure_table(&TableSchema::transactions())
            .await
            .unwrap();

        get_mock.assert();
        create_mock.assert();
    }

    #[tokio::test]
    async fn test_create_conflict_counts_as_existing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(TABLE_PATH);
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(POST).path("/projects/demo/datasets/fraud/tables");
            then.status(409);
        });

        assert!(sink_for(&server)
            .ensure_table(&TableSchema::transactions())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(TABLE_PATH);
            then.status(200).json_body(json!({
                "schema": {"fields": [{"name": "transaction_id", "type": "STRING"}]}
            }));
        });

        let err = sink_for(&server)
            .ensure_table(&TableSchema::transactions())
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::SinkError { .. }));
    }

    #[tokio::test]
    async fn test_permission_denied_is_a_sink_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(TABLE_PATH);
            then.status(403).body("Access Denied");
        });

        let err = sink_for(&server)
            .ensure_table(&TableSchema::transactions())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("Access Denied"));
    }

    #[tokio::test]
    async fn test_append_posts_rows_without_insert_ids() {
        let server = MockServer::start();
        let insert_mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("{}/insertAll", TABLE_PATH))
                .json_body(json!({
                    "kind": "bigquery#tableDataInsertAllRequest",
                    "rows": [{"json": {
                        "transaction_id": "a1",
                        "card_number": "4111-1111-1111-1111",
                        "transaction_date": "2024-01-01T10:00:00",
                        "amount": 123.45,
                        "merchant": "Amazon",
                        "is_fraud": true
                    }}]
                }));
            then.status(200)
                .json_body(json!({"kind": "bigquery#tableDataInsertAllResponse"}));
        });

        let row =
            parse_transaction("a1,4111-1111-1111-1111,2024-01-01T10:00:00,123.45,Amazon,True")
                .unwrap();
        sink_for(&server).append(&[row]).await.unwrap();

        insert_mock.assert();
    }

    #[tokio::test]
    async fn test_insert_errors_fail_the_batch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(format!("{}/insertAll", TABLE_PATH));
            then.status(200).json_body(json!({
                "insertErrors": [
                    {"index": 1, "errors": [{"reason": "invalid", "message": "no such field"}]}
                ]
            }));
        });

        let rows: Vec<TransactionRecord> = [
            "a1,1,2024-01-01,1,Amazon,false",
            "a2,2,2024-01-02,2,Ebay,false",
        ]
        .iter()
        .map(|l| parse_transaction(l).unwrap())
        .collect();

        let err = sink_for(&server).append(&rows).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1 of 2 rows rejected"));
        assert!(message.contains("no such field"));
    }

    #[tokio::test]
    async fn test_empty_append_makes_no_request() {
        let server = MockServer::start();
        let insert_mock = server.mock(|when, then| {
            when.method(POST).path(format!("{}/insertAll", TABLE_PATH));
            then.status(200);
        });

        sink_for(&server).append(&[]).await.unwrap();
        insert_mock.assert_hits(0);
    }

    #[test]
    fn test_config_requires_project() {
        let table: TableReference = "fraud.transactions".parse().unwrap();
        assert!(matches!(
            BigQueryConfig::for_table(&table, None),
            Err(EtlError::MissingConfigError { .. })
        ));

        let table = table.with_default_project(Some("demo"));
        let config = BigQueryConfig::for_table(&table, Some("http://localhost:9050/")).unwrap();
        assert_eq!(config.api_base, "http://localhost:9050");
        assert_eq!(config.project, "demo");
    }
}
