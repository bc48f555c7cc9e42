//! End-to-end client tests against the mock server.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mysql_client::{Client, ClientConfig, Error, MysqlConfig};
use mysql_testing::{MockColumn, MockMysqlServer, MockPrepare, MockResponse};

fn config_for(server: &MockMysqlServer) -> MysqlConfig {
    MysqlConfig::create(server.host(), server.port(), "root", "")
}

async fn connect(server: &MockMysqlServer) -> Client {
    Client::connect(&config_for(server), ClientConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fresh_connect_and_select_one() {
    let server = MockMysqlServer::builder().start().await.unwrap();
    let mut client = connect(&server).await;

    let result = client.query("SELECT 1").await.unwrap();
    assert_eq!(result.field_count(), 1);
    assert_eq!(result.fields()[0].name(), "1");
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows()[0].get_string(0), "1");
    assert_eq!(result.rows()[0].get_i64(0), 1);
    assert_eq!(result.affected_rows(), 0);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_insert_reports_affected_rows_and_insert_id() {
    let server = MockMysqlServer::builder()
        .with_response("INSERT INTO t(v) VALUES (42)", MockResponse::inserted(1, 1))
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    let result = client.query("INSERT INTO t(v) VALUES (42)").await.unwrap();
    assert!(!result.has_result_set());
    assert_eq!(result.affected_rows(), 1);
    assert_eq!(result.last_insert_id(), 1);
}

#[tokio::test]
async fn test_prepared_execute_with_null_parameter() {
    let server = MockMysqlServer::builder()
        .with_prepare(
            "INSERT INTO t(name, age) VALUES (?, ?)",
            MockPrepare {
                num_params: 2,
                num_columns: 0,
                execute: MockResponse::affected(1),
            },
        )
        .with_response(
            "SELECT age FROM t WHERE name='Charlie'",
            MockResponse::rows(vec![MockColumn::new("age")], vec![vec![None]]),
        )
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    let stmt = client
        .prepare("INSERT INTO t(name, age) VALUES (?, ?)")
        .await
        .unwrap();
    assert_eq!(stmt.num_params(), 2);
    assert_eq!(stmt.num_columns(), 0);

    let result = client
        .stmt_execute(stmt.statement_id(), &[Some("Charlie"), None])
        .await
        .unwrap();
    assert_eq!(result.affected_rows(), 1);

    let result = client
        .query("SELECT age FROM t WHERE name='Charlie'")
        .await
        .unwrap();
    assert_eq!(result.row_count(), 1);
    assert!(result.rows()[0].is_null(0));
}

#[tokio::test]
async fn test_transaction_rollback_restores_value() {
    // Shared state: (committed value, pending uncommitted value).
    let state = Arc::new(Mutex::new((5i64, None::<i64>)));

    let update_state = Arc::clone(&state);
    let rollback_state = Arc::clone(&state);
    let select_state = Arc::clone(&state);

    let server = MockMysqlServer::builder()
        .with_response(
            "UPDATE t SET v=0 WHERE id=1",
            MockResponse::custom(move |_| {
                update_state.lock().unwrap().1 = Some(0);
                MockResponse::affected(1)
            }),
        )
        .with_response(
            "ROLLBACK",
            MockResponse::custom(move |_| {
                rollback_state.lock().unwrap().1 = None;
                MockResponse::empty()
            }),
        )
        .with_response(
            "SELECT v FROM t WHERE id=1",
            MockResponse::custom(move |_| {
                let state = select_state.lock().unwrap();
                let value = state.1.unwrap_or(state.0);
                MockResponse::scalar("v", &value.to_string())
            }),
        )
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    client.begin_transaction().await.unwrap();
    let updated = client.query("UPDATE t SET v=0 WHERE id=1").await.unwrap();
    assert_eq!(updated.affected_rows(), 1);
    client.rollback().await.unwrap();

    let result = client.query("SELECT v FROM t WHERE id=1").await.unwrap();
    assert_eq!(result.rows()[0].get_i64(0), 5);
}

#[tokio::test]
async fn test_server_error_carries_errno() {
    let server = MockMysqlServer::builder()
        .with_response(
            "SELECT * FROM missing",
            MockResponse::error(1146, "Table 'missing' doesn't exist"),
        )
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    match client.query("SELECT * FROM missing").await {
        Err(Error::Server { errno, message }) => {
            assert_eq!(errno, 1146);
            assert!(message.contains("missing"));
        }
        other => panic!("expected server error, got {other:?}"),
    }

    // A SERVER error leaves the session usable.
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_native_password_auth() {
    let server = MockMysqlServer::builder()
        .with_password("secret")
        .start()
        .await
        .unwrap();

    let config = MysqlConfig::create(server.host(), server.port(), "root", "secret");
    let mut client = Client::connect(&config, ClientConfig::default())
        .await
        .unwrap();
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_caching_sha2_fast_auth() {
    let server = MockMysqlServer::builder()
        .with_auth_plugin("caching_sha2_password")
        .with_password("secret")
        .start()
        .await
        .unwrap();

    let config = MysqlConfig::create(server.host(), server.port(), "root", "secret");
    let mut client = Client::connect(&config, ClientConfig::default())
        .await
        .unwrap();
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_wrong_password_is_auth_error() {
    let server = MockMysqlServer::builder()
        .with_password("secret")
        .start()
        .await
        .unwrap();

    let config = MysqlConfig::create(server.host(), server.port(), "root", "wrong");
    match Client::connect(&config, ClientConfig::default()).await {
        Err(Error::Auth { errno, .. }) => assert_eq!(errno, 1045),
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_interop_with_deprecate_eof_server() {
    // The server advertises CLIENT_DEPRECATE_EOF; the client's fixed
    // request set does not include it, so negotiation drops the bit and
    // the legacy result-set framing is used on both sides.
    let server = MockMysqlServer::builder()
        .with_deprecate_eof()
        .with_response(
            "SELECT v FROM t",
            MockResponse::rows(
                vec![MockColumn::new("v")],
                vec![vec![Some("a".into())], vec![Some("b".into())]],
            ),
        )
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;
    assert!(!client
        .capabilities()
        .contains(mysql_client::CapabilityFlags::DEPRECATE_EOF));

    let result = client.query("SELECT v FROM t").await.unwrap();
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.rows()[0].get_string(0), "a");
    assert_eq!(result.rows()[1].get_string(0), "b");
}

#[tokio::test]
async fn test_zero_row_select_keeps_fields() {
    let server = MockMysqlServer::builder()
        .with_response(
            "SELECT v FROM t WHERE 0",
            MockResponse::rows(vec![MockColumn::new("v")], vec![]),
        )
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    let result = client.query("SELECT v FROM t WHERE 0").await.unwrap();
    assert_eq!(result.field_count(), 1);
    assert_eq!(result.row_count(), 0);
    assert!(result.has_result_set());
}

#[tokio::test]
async fn test_stmt_execute_rejects_result_sets() {
    let server = MockMysqlServer::builder()
        .with_prepare(
            "SELECT v FROM t WHERE id=?",
            MockPrepare {
                num_params: 1,
                num_columns: 1,
                execute: MockResponse::scalar("v", "5"),
            },
        )
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    let stmt = client.prepare("SELECT v FROM t WHERE id=?").await.unwrap();
    assert_eq!(stmt.num_params(), 1);
    assert_eq!(stmt.num_columns(), 1);

    match client.stmt_execute(stmt.statement_id(), &[Some("1")]).await {
        Err(Error::PreparedStmt { errno: 0, message }) => {
            assert!(message.contains("binary result sets"));
        }
        other => panic!("expected prepared statement error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_prepare_without_params_or_columns() {
    let server = MockMysqlServer::builder()
        .with_prepare(
            "CREATE TABLE t(id INT)",
            MockPrepare {
                num_params: 0,
                num_columns: 0,
                execute: MockResponse::empty(),
            },
        )
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    // Both definition sections are skipped entirely.
    let stmt = client.prepare("CREATE TABLE t(id INT)").await.unwrap();
    assert_eq!(stmt.num_params(), 0);
    assert_eq!(stmt.num_columns(), 0);

    // The stream stays aligned for the next command.
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_prepare_failure_is_prepared_stmt_error() {
    let server = MockMysqlServer::builder().start().await.unwrap();
    let mut client = connect(&server).await;

    // Unscripted statements fail to prepare on the mock.
    match client.prepare("SELECT broken").await {
        Err(Error::PreparedStmt { errno, .. }) => assert_eq!(errno, 1064),
        other => panic!("expected prepared statement error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stmt_close_has_no_response() {
    let server = MockMysqlServer::builder()
        .with_prepare(
            "INSERT INTO t(v) VALUES (?)",
            MockPrepare {
                num_params: 1,
                num_columns: 0,
                execute: MockResponse::affected(1),
            },
        )
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    let stmt = client.prepare("INSERT INTO t(v) VALUES (?)").await.unwrap();
    client.stmt_close(stmt.statement_id()).await.unwrap();

    // The connection stream stays aligned after the response-less command.
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_use_database_quotes_identifier() {
    let server = MockMysqlServer::builder()
        .with_response("USE `orders`", MockResponse::empty())
        .start()
        .await
        .unwrap();
    let mut client = connect(&server).await;

    client.use_database("orders").await.unwrap();

    match client.use_database("bad\0name").await {
        Err(Error::InvalidParam(_)) => {}
        other => panic!("expected invalid parameter, got {other:?}"),
    }
}

#[tokio::test]
async fn test_commands_after_close_fail() {
    let server = MockMysqlServer::builder().start().await.unwrap();
    let mut client = connect(&server).await;

    client.close().await.unwrap();
    assert!(client.is_closed());
    match client.query("SELECT 1").await {
        Err(Error::ConnectionClosed) => {}
        other => panic!("expected ConnectionClosed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_recv_timeout_on_silent_server() {
    // A listener that accepts and never sends a greeting.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let config = MysqlConfig::create(addr.ip().to_string(), addr.port(), "root", "");
    let options = ClientConfig::new().recv_timeout(Some(Duration::from_millis(100)));

    match Client::connect(&config, options).await {
        Err(Error::Timeout) => {}
        other => panic!("expected timeout, got {other:?}"),
    }
    hold.abort();
}

#[tokio::test]
async fn test_connect_refused_is_connection_error() {
    // Bind then drop to get a port with no listener.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = MysqlConfig::create("127.0.0.1", addr.port(), "root", "");
    match Client::connect(&config, ClientConfig::default()).await {
        Err(Error::Connection(_)) => {}
        other => panic!("expected connection error, got {other:?}"),
    }
}
