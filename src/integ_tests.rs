//! End to end tests of the HTTP service
//!
//! These tests drive the full router with `oneshot` requests against an
//! in-memory warehouse, covering both tenancy modes and both payload kinds.

#[cfg(test)]
mod tests {
    use crate::{
        api::{self, AppState, Tenancy},
        formats::parquet::tests::create_test_parquet_file,
        loader::Loader,
        warehouse::memory::InMemoryWarehouse,
    };
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    const BOUNDARY: &str = "integ-test-boundary";

    // ============ Test Helpers ============

    fn single_tenant() -> Tenancy {
        Tenancy::Single {
            project_id: "acme".to_string(),
            dataset_id: "raw".to_string(),
        }
    }

    fn app(tenancy: Tenancy, warehouse: Arc<InMemoryWarehouse>) -> Router {
        api::router(
            AppState {
                loader: Loader::new(warehouse),
                tenancy,
                service_name: "bigquery-loader-test".to_string(),
            },
            16 * 1024 * 1024,
        )
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(body: Value) -> Request<Body> {
        post_raw_json(body.to_string())
    }

    fn post_raw_json(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/bigquery/load/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    /// Build a multipart form from text fields and an optional file part
    fn post_multipart(fields: &[(&str, &str)], file: Option<&[u8]>) -> Request<Body> {
        post_multipart_named(fields, file, Some("upload.parquet"))
    }

    fn post_multipart_named(
        fields: &[(&str, &str)],
        file: Option<&[u8]>,
        file_name: Option<&str>,
    ) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(bytes) = file {
            let filename = file_name
                .map(|name| format!("; filename=\"{name}\""))
                .unwrap_or_default();
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"{filename}\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/bigquery/load/parquet")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn parquet_bytes(num_rows: usize) -> Vec<u8> {
        let file = create_test_parquet_file(num_rows, 100);
        std::fs::read(file.path()).unwrap()
    }

    // ============ Health ============

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app(single_tenant(), Arc::new(InMemoryWarehouse::new())), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "service": "bigquery-loader-test"}));
    }

    // ============ JSON Endpoint ============

    #[tokio::test]
    async fn test_json_load_success() {
        let warehouse = Arc::new(InMemoryWarehouse::new());

        let (status, body) = send(
            app(single_tenant(), warehouse.clone()),
            post_json(json!({"table_name": "t1", "data": [{"a": 1}, {"a": 2}]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert!(body["message"].as_str().unwrap().contains("t1 (2 records"));
        assert_eq!(body["rows"], 2);
        assert_eq!(warehouse.table("acme.raw.t1").unwrap().num_rows(), 2);
    }

    #[tokio::test]
    async fn test_json_empty_data_is_warning() {
        let warehouse = Arc::new(InMemoryWarehouse::new());

        let (status, body) = send(
            app(single_tenant(), warehouse.clone()),
            post_json(json!({"table_name": "t1", "data": []})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "warning", "message": "no data to load for t1"})
        );
        assert_eq!(warehouse.calls(), 0);
    }

    #[tokio::test]
    async fn test_json_missing_table_name() {
        let (status, body) = send(
            app(single_tenant(), Arc::new(InMemoryWarehouse::new())),
            post_json(json!({"data": [{"a": 1}]})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"status": "error", "error": "missing required fields: table_name"})
        );
    }

    #[tokio::test]
    async fn test_json_blank_table_name_and_missing_data() {
        let (status, body) = send(
            app(single_tenant(), Arc::new(InMemoryWarehouse::new())),
            post_json(json!({"table_name": "   "})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing required fields: table_name, data");
    }

    #[tokio::test]
    async fn test_json_malformed_body() {
        let (status, body) = send(
            app(single_tenant(), Arc::new(InMemoryWarehouse::new())),
            post_raw_json("{not json".to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn test_json_data_must_be_objects() {
        let (status, _) = send(
            app(single_tenant(), Arc::new(InMemoryWarehouse::new())),
            post_json(json!({"table_name": "t1", "data": [1, 2, 3]})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_single_tenancy_ignores_request_identifiers() {
        let warehouse = Arc::new(InMemoryWarehouse::new());

        let (status, _) = send(
            app(single_tenant(), warehouse.clone()),
            post_json(json!({
                "project_id": "elsewhere",
                "dataset_id": "other",
                "table_name": "t1",
                "data": [{"a": 1}]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(warehouse.table("acme.raw.t1").is_some());
        assert!(warehouse.table("elsewhere.other.t1").is_none());
    }

    #[tokio::test]
    async fn test_multi_tenancy_requires_identifiers() {
        let warehouse = Arc::new(InMemoryWarehouse::new());

        let (status, body) = send(
            app(Tenancy::Multi, warehouse.clone()),
            post_json(json!({"table_name": "t1", "data": [{"a": 1}]})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "missing required fields: project_id, dataset_id"
        );
        assert_eq!(warehouse.calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_tenancy_routes_to_request_destination() {
        let warehouse = Arc::new(InMemoryWarehouse::new());

        let (status, body) = send(
            app(Tenancy::Multi, warehouse.clone()),
            post_json(json!({
                "project_id": "tenant-a",
                "dataset_id": "landing",
                "table_name": "orders",
                "data": [{"id": 1, "total": 9.5}]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("load complete: tenant-a.landing.orders (1 records")
        );
        assert!(warehouse.table("tenant-a.landing.orders").is_some());
    }

    #[tokio::test]
    async fn test_warehouse_failure_is_server_error() {
        let warehouse = Arc::new(InMemoryWarehouse::failing("Access Denied: dataset acme:raw"));

        let (status, body) = send(
            app(single_tenant(), warehouse),
            post_json(json!({"table_name": "t1", "data": [{"a": 1}]})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("acme.raw.t1"));
        assert!(error.contains("Access Denied: dataset acme:raw"));
    }

    // ============ Parquet Endpoint ============

    #[tokio::test]
    async fn test_parquet_load_success() {
        let warehouse = Arc::new(InMemoryWarehouse::new());
        let bytes = parquet_bytes(300);

        let (status, body) = send(
            app(single_tenant(), warehouse.clone()),
            post_multipart(&[("table_name", "events")], Some(&bytes)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert!(body["message"].as_str().unwrap().contains("acme.raw.events (300 records"));
        assert_eq!(warehouse.table("acme.raw.events").unwrap().num_rows(), 300);
    }

    #[tokio::test]
    async fn test_parquet_empty_file_warning_names_the_upload() {
        let warehouse = Arc::new(InMemoryWarehouse::new());
        let bytes = parquet_bytes(0);

        let (status, body) = send(
            app(single_tenant(), warehouse.clone()),
            post_multipart(&[("table_name", "events")], Some(&bytes)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "warning");
        assert_eq!(body["message"], "empty file: upload.parquet");
        assert_eq!(warehouse.calls(), 0);
    }

    #[tokio::test]
    async fn test_parquet_empty_file_is_warning_and_upload_is_removed() {
        let warehouse = Arc::new(InMemoryWarehouse::new());
        let bytes = parquet_bytes(0);

        // Without a client file name the message carries the staged path
        let (status, body) = send(
            app(single_tenant(), warehouse.clone()),
            post_multipart_named(&[("table_name", "events")], Some(&bytes), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "warning");
        let message = body["message"].as_str().unwrap();
        let staged = PathBuf::from(message.strip_prefix("empty file: ").unwrap());
        assert!(!staged.exists());
        assert_eq!(warehouse.calls(), 0);
    }

    #[tokio::test]
    async fn test_parquet_corrupt_file_is_bad_request() {
        let mut corrupt = NamedTempFile::new().unwrap();
        corrupt.write_all(b"this is not a parquet file").unwrap();
        let bytes = std::fs::read(corrupt.path()).unwrap();

        let (status, body) = send(
            app(single_tenant(), Arc::new(InMemoryWarehouse::new())),
            post_multipart(&[("table_name", "events")], Some(&bytes)),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().starts_with("failed to read"));
    }

    #[tokio::test]
    async fn test_parquet_missing_fields() {
        let (status, body) = send(
            app(Tenancy::Multi, Arc::new(InMemoryWarehouse::new())),
            post_multipart(&[("project_id", "tenant-a")], None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "missing required fields: dataset_id, table_name, file"
        );
    }

    #[tokio::test]
    async fn test_parquet_requires_multipart() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/bigquery/load/parquet")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = send(app(single_tenant(), Arc::new(InMemoryWarehouse::new())), request).await;

        assert!(status.is_client_error());
        assert_eq!(body["status"], "error");
    }
}
