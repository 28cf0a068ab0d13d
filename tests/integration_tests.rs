use axum::http::StatusCode;
use axum_test::{
    multipart::{MultipartForm, Part},
    TestServer,
};
use pricelist_service::{
    app::pricelist::{AppState, PageRequest, Product, UploadReport},
    build_router, init_state,
    infrastructure::config::{Config, DatabaseConfig},
};
use std::{future::IntoFuture, time::Duration};
use tokio::io::AsyncWriteExt;

fn test_config(atomic: bool) -> Config {
    let mut config = Config::default();
    // 内存库只存在于单个连接中，所以连接池固定为一个且永不过期
    config.database = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        acquire_timeout_secs: 30,
        idle_timeout_secs: None,
        max_lifetime_secs: None,
        create_schema: true,
    };
    config.upload.atomic = atomic;
    config
}

async fn create_state(atomic: bool) -> AppState {
    init_state(&test_config(atomic))
        .await
        .expect("Failed to initialize test database")
}

async fn create_test_server(atomic: bool) -> TestServer {
    TestServer::new(build_router(create_state(atomic).await)).unwrap()
}

/// 插入 art = 13 的行时让数据库报错
async fn reject_art_13(state: &AppState) {
    sqlx::query(
        r#"
        CREATE TRIGGER reject_art_13 BEFORE INSERT ON pricelist
        WHEN NEW.art = 13
        BEGIN
            SELECT RAISE(ABORT, 'art 13 rejected');
        END
        "#,
    )
    .execute(state.pricelist_service.repository().pool())
    .await
    .unwrap();
}

fn price_file(content: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "scv",
        Part::bytes(content.as_bytes().to_vec()).file_name("prices.csv"),
    )
}

fn product(art: i64, count: i64, price: i64) -> Product {
    Product { art, count, price }
}

async fn upload(server: &TestServer, distributor_id: i64, content: &str) -> StatusCode {
    server
        .post(&format!("/price/{}/upload", distributor_id))
        .multipart(price_file(content))
        .await
        .status_code()
}

async fn fetch(server: &TestServer, distributor_id: i64) -> Vec<Product> {
    let response = server.get(&format!("/price/{}", distributor_id)).await;
    response.assert_status_ok();
    response.json::<Vec<Product>>()
}

#[tokio::test]
async fn test_unknown_distributor_returns_empty_array() {
    let server = create_test_server(false).await;

    let response = server.get("/price/7").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "[]");
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn test_upload_then_read_round_trip() {
    let server = create_test_server(false).await;

    let response = server
        .post("/price/42/upload")
        .multipart(price_file("2\t3\t50\n1\t5\t100\n"))
        .await;
    response.assert_status_ok();
    assert!(response.text().is_empty());

    let response = server.get("/price/42").await;
    response.assert_status_ok();
    assert_eq!(
        response.text(),
        r#"[{"Art":1,"Count":5,"Price":100},{"Art":2,"Count":3,"Price":50}]"#
    );

    // 末尾斜杠也是读取
    assert_eq!(fetch(&server, 42).await.len(), 2);
    let response = server.get("/price/42/").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_second_upload_replaces_previous_rows() {
    let server = create_test_server(false).await;

    assert_eq!(upload(&server, 42, "1\t5\t100\n2\t3\t50").await, StatusCode::OK);
    assert_eq!(upload(&server, 42, "9\t1\t1").await, StatusCode::OK);

    assert_eq!(fetch(&server, 42).await, vec![product(9, 1, 1)]);
}

#[tokio::test]
async fn test_crlf_and_missing_final_newline() {
    let server = create_test_server(false).await;

    assert_eq!(upload(&server, 5, "1\t1\t10\r\n2\t2\t20").await, StatusCode::OK);
    assert_eq!(
        fetch(&server, 5).await,
        vec![product(1, 1, 10), product(2, 2, 20)]
    );
}

#[tokio::test]
async fn test_empty_file_clears_price_list() {
    let server = create_test_server(false).await;

    assert_eq!(upload(&server, 3, "1\t1\t1").await, StatusCode::OK);
    assert_eq!(upload(&server, 3, "").await, StatusCode::OK);
    assert!(fetch(&server, 3).await.is_empty());
}

#[tokio::test]
async fn test_pagination() {
    let server = create_test_server(false).await;
    let content = "5\t1\t50\n3\t1\t30\n1\t1\t10\n4\t1\t40\n2\t1\t20\n";
    assert_eq!(upload(&server, 8, content).await, StatusCode::OK);

    let page: Vec<Product> = server
        .get("/price/8")
        .add_query_param("skip", 2)
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(page, vec![product(3, 1, 30), product(4, 1, 40)]);

    let tail: Vec<Product> = server
        .get("/price/8")
        .add_query_param("skip", 3)
        .await
        .json();
    assert_eq!(tail, vec![product(4, 1, 40), product(5, 1, 50)]);

    let head: Vec<Product> = server
        .get("/price/8")
        .add_query_param("limit", 1)
        .await
        .json();
    assert_eq!(head, vec![product(1, 1, 10)]);

    let none = server.get("/price/8").add_query_param("limit", 0).await;
    none.assert_status_ok();
    assert_eq!(none.text(), "[]");

    let past_end = server.get("/price/8").add_query_param("skip", 10).await;
    assert_eq!(past_end.text(), "[]");
}

#[tokio::test]
async fn test_invalid_pagination_falls_back_to_defaults() {
    let server = create_test_server(false).await;
    assert_eq!(upload(&server, 8, "1\t1\t1\n2\t2\t2\n3\t3\t3").await, StatusCode::OK);

    let all: Vec<Product> = server
        .get("/price/8")
        .add_query_param("skip", "abc")
        .add_query_param("limit", "-1")
        .await
        .json();
    assert_eq!(all.len(), 3);

    let negative_skip: Vec<Product> = server
        .get("/price/8")
        .add_query_param("skip", -2)
        .add_query_param("limit", "x")
        .await
        .json();
    assert_eq!(negative_skip.len(), 3);
}

#[tokio::test]
async fn test_malformed_line_aborts_remaining_scan() {
    let server = create_test_server(false).await;
    assert_eq!(upload(&server, 42, "9\t9\t9").await, StatusCode::OK);

    let status = upload(&server, 42, "1\t1\t1\n2\t2\t2\n3\t2\n4\t4\t4\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 旧行已被删除，坏行之前的行保留，之后的行没有插入
    assert_eq!(
        fetch(&server, 42).await,
        vec![product(1, 1, 1), product(2, 2, 2)]
    );
}

#[tokio::test]
async fn test_non_integer_field_aborts_remaining_scan() {
    let server = create_test_server(false).await;

    let status = upload(&server, 11, "1\t1\t1\n2\tmany\t2\n3\t3\t3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fetch(&server, 11).await, vec![product(1, 1, 1)]);
}

#[tokio::test]
async fn test_atomic_upload_rolls_back_on_malformed_line() {
    let server = create_test_server(true).await;
    assert_eq!(upload(&server, 42, "9\t9\t9").await, StatusCode::OK);

    let status = upload(&server, 42, "1\t1\t1\n2\t2\t2\n3\t2\n4\t4\t4\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(fetch(&server, 42).await, vec![product(9, 9, 9)]);

    assert_eq!(upload(&server, 42, "1\t1\t1\n2\t2\t2").await, StatusCode::OK);
    assert_eq!(
        fetch(&server, 42).await,
        vec![product(1, 1, 1), product(2, 2, 2)]
    );
}

#[tokio::test]
async fn test_insert_failure_is_skipped_in_direct_mode() {
    let state = create_state(false).await;
    reject_art_13(&state).await;
    let server = TestServer::new(build_router(state)).unwrap();

    let status = upload(&server, 6, "1\t1\t1\n13\t1\t1\n2\t2\t2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        fetch(&server, 6).await,
        vec![product(1, 1, 1), product(2, 2, 2)]
    );
}

#[tokio::test]
async fn test_insert_failure_rolls_back_in_atomic_mode() {
    let state = create_state(true).await;
    reject_art_13(&state).await;
    let server = TestServer::new(build_router(state)).unwrap();

    assert_eq!(upload(&server, 6, "7\t7\t7").await, StatusCode::OK);

    let status = upload(&server, 6, "1\t1\t1\n13\t1\t1\n2\t2\t2").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fetch(&server, 6).await, vec![product(7, 7, 7)]);
}

#[tokio::test]
async fn test_malformed_paths_are_rejected_without_mutation() {
    let server = create_test_server(false).await;
    assert_eq!(upload(&server, 42, "1\t1\t1").await, StatusCode::OK);

    let response = server
        .post("/price/abc/upload")
        .multipart(price_file("5\t5\t5"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().is_empty());

    for path in ["/price", "/price/", "/price/abc", "/price/42/download"] {
        server.get(path).await.assert_status(StatusCode::BAD_REQUEST);
    }

    let response = server
        .post("/price/42/upload/extra")
        .multipart(price_file("5\t5\t5"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(fetch(&server, 42).await, vec![product(1, 1, 1)]);
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let server = create_test_server(false).await;

    server
        .post("/price/42")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    server
        .get("/price/42/upload")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    server
        .put("/price/42")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_missing_file_field_does_not_delete() {
    let server = create_test_server(false).await;
    assert_eq!(upload(&server, 42, "1\t1\t1").await, StatusCode::OK);

    // 字段名必须是 `scv`
    let form = MultipartForm::new().add_part(
        "csv",
        Part::bytes(b"2\t2\t2".to_vec()).file_name("prices.csv"),
    );
    let response = server.post("/price/42/upload").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // 同名但不是文件的文本字段
    let form = MultipartForm::new().add_text("scv", "2\t2\t2");
    let response = server.post("/price/42/upload").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // 不是 multipart 的请求体
    let response = server.post("/price/42/upload").text("2\t2\t2").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(fetch(&server, 42).await, vec![product(1, 1, 1)]);
}

#[tokio::test]
async fn test_other_form_fields_are_ignored() {
    let server = create_test_server(false).await;

    let form = MultipartForm::new()
        .add_text("comment", "weekly update")
        .add_part(
            "scv",
            Part::bytes(b"4\t4\t4".to_vec()).file_name("prices.csv"),
        );
    server
        .post("/price/12/upload")
        .multipart(form)
        .await
        .assert_status_ok();

    assert_eq!(fetch(&server, 12).await, vec![product(4, 4, 4)]);
}

#[tokio::test]
async fn test_concurrent_uploads_to_different_distributors() {
    let server = create_test_server(false).await;
    assert_eq!(upload(&server, 1, "100\t1\t1").await, StatusCode::OK);
    assert_eq!(upload(&server, 2, "200\t2\t2").await, StatusCode::OK);

    let first = server
        .post("/price/1/upload")
        .multipart(price_file("1\t1\t1\n2\t1\t1\n3\t1\t1"));
    let second = server
        .post("/price/2/upload")
        .multipart(price_file("7\t2\t2\n8\t2\t2"));
    let (first, second) = tokio::join!(first.into_future(), second.into_future());
    first.assert_status_ok();
    second.assert_status_ok();

    assert_eq!(
        fetch(&server, 1).await,
        vec![product(1, 1, 1), product(2, 1, 1), product(3, 1, 1)]
    );
    assert_eq!(
        fetch(&server, 2).await,
        vec![product(7, 2, 2), product(8, 2, 2)]
    );
}

#[tokio::test]
async fn test_concurrent_uploads_to_same_distributor_do_not_interleave() {
    let server = create_test_server(false).await;

    let first = server
        .post("/price/9/upload")
        .multipart(price_file("1\t1\t1\n2\t1\t1\n3\t1\t1"));
    let second = server
        .post("/price/9/upload")
        .multipart(price_file("7\t2\t2\n8\t2\t2"));
    let (first, second) = tokio::join!(first.into_future(), second.into_future());
    first.assert_status_ok();
    second.assert_status_ok();

    // 只能是其中一次上传的完整结果，不会是两者的混合
    let rows = fetch(&server, 9).await;
    let a = vec![product(1, 1, 1), product(2, 1, 1), product(3, 1, 1)];
    let b = vec![product(7, 2, 2), product(8, 2, 2)];
    assert!(rows == a || rows == b, "interleaved rows: {:?}", rows);
}

#[tokio::test]
async fn test_percent_encoded_path() {
    let server = create_test_server(false).await;

    server
        .post("/price/%34%32/upload")
        .multipart(price_file("1\t5\t100"))
        .await
        .assert_status_ok();
    assert_eq!(fetch(&server, 42).await, vec![product(1, 5, 100)]);

    let response = server.get("/price/%34%32").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Vec<Product>>(), vec![product(1, 5, 100)]);
}

#[tokio::test]
async fn test_stalled_upload_does_not_hold_a_connection() {
    // 连接池只有一个连接：上传等待数据时如果占着它，读取就拿不到连接
    let state = create_state(false).await;
    let service = state.pricelist_service.clone();

    let (mut writer, reader) = tokio::io::duplex(64);
    let pending = tokio::spawn(async move {
        service
            .replace_price_list(3, tokio::io::BufReader::new(reader))
            .await
    });

    writer.write_all(b"1\t1\t10\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!pending.is_finished());

    let rows = tokio::time::timeout(
        Duration::from_secs(2),
        state
            .pricelist_service
            .list(3, PageRequest::default()),
    )
    .await
    .expect("read blocked by a stalled upload")
    .unwrap();
    assert_eq!(rows, vec![product(1, 1, 10)]);

    writer.write_all(b"2\t2\t20\n").await.unwrap();
    drop(writer);
    let report = pending.await.unwrap().unwrap();
    assert_eq!(report.inserted, 2);
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(false).await;

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_upload_report_counts_rows() {
    let state = create_state(false).await;
    reject_art_13(&state).await;
    let service = &state.pricelist_service;

    let report = service
        .replace_price_list(4, &b"1\t1\t1\n2\t2\t2\n"[..])
        .await
        .unwrap();
    assert_eq!(
        report,
        UploadReport {
            deleted: 0,
            inserted: 2,
            failed: 0
        }
    );

    let report = service
        .replace_price_list(4, &b"13\t1\t1\n3\t3\t3"[..])
        .await
        .unwrap();
    assert_eq!(
        report,
        UploadReport {
            deleted: 2,
            inserted: 1,
            failed: 1
        }
    );

    let rows = service.list(4, PageRequest::default()).await.unwrap();
    assert_eq!(rows, vec![product(3, 3, 3)]);
}
