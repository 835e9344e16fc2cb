use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_postgres::{Config, NoTls, SimpleQueryMessage, SimpleQueryRow};

use roombook::engine::Engine;
use roombook::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<Engine>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let engine = Arc::new(Engine::new());

    let engine2 = engine.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let engine = engine2.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, engine).await;
            });
        }
    });

    (addr, engine)
}

async fn connect(addr: SocketAddr) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("roombook")
        .user("roombook");

    let (client, connection) = config.connect(NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

fn rows(messages: Vec<SimpleQueryMessage>) -> Vec<SimpleQueryRow> {
    messages
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

fn insert_sql(room: &str, start: &str, end: &str) -> String {
    format!(
        "INSERT INTO reservations (room_id, start_time, end_time) VALUES ('{room}', '{start}', '{end}')"
    )
}

async fn sqlstate(client: &tokio_postgres::Client, sql: &str) -> String {
    let err = client.simple_query(sql).await.unwrap_err();
    err.code().expect("expected a SQLSTATE").code().to_string()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn insert_returns_the_reservation() {
    let (addr, engine) = start_test_server().await;
    let client = connect(addr).await;

    let inserted = rows(
        client
            .simple_query(&insert_sql(
                "A",
                "2999-01-01T09:00:00Z",
                "2999-01-01T10:00:00Z",
            ))
            .await
            .unwrap(),
    );
    assert_eq!(inserted.len(), 1);
    let row = &inserted[0];
    assert_eq!(row.get("room_id"), Some("A"));
    assert_eq!(row.get("start_time"), Some("2999-01-01T09:00:00.000Z"));
    assert_eq!(row.get("end_time"), Some("2999-01-01T10:00:00.000Z"));
    assert!(ulid::Ulid::from_string(row.get("id").unwrap()).is_ok());
    assert_eq!(engine.reservation_count(), 1);
}

#[tokio::test]
async fn select_lists_room_in_start_order() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    client
        .batch_execute(&insert_sql("A", "2999-01-01T12:00:00Z", "2999-01-01T13:00:00Z"))
        .await
        .unwrap();
    client
        .batch_execute(&insert_sql("A", "2999-01-01T09:00:00Z", "2999-01-01T10:00:00Z"))
        .await
        .unwrap();
    client
        .batch_execute(&insert_sql("B", "2999-01-01T09:00:00Z", "2999-01-01T10:00:00Z"))
        .await
        .unwrap();

    let listed = rows(
        client
            .simple_query("SELECT * FROM reservations WHERE room_id = 'A'")
            .await
            .unwrap(),
    );
    let starts: Vec<_> = listed.iter().map(|r| r.get("start_time")).collect();
    assert_eq!(
        starts,
        vec![
            Some("2999-01-01T09:00:00.000Z"),
            Some("2999-01-01T12:00:00.000Z")
        ]
    );

    let empty = rows(
        client
            .simple_query("SELECT * FROM reservations WHERE room_id = 'nowhere'")
            .await
            .unwrap(),
    );
    assert!(empty.is_empty());
}

#[tokio::test]
async fn delete_cancels_once() {
    let (addr, engine) = start_test_server().await;
    let client = connect(addr).await;

    let inserted = rows(
        client
            .simple_query(&insert_sql("A", "2999-01-01T09:00:00Z", "2999-01-01T10:00:00Z"))
            .await
            .unwrap(),
    );
    let id = inserted[0].get("id").unwrap().to_string();

    let deleted = client
        .simple_query(&format!("DELETE FROM reservations WHERE id = '{id}'"))
        .await
        .unwrap();
    assert!(deleted
        .iter()
        .any(|m| matches!(m, SimpleQueryMessage::CommandComplete(1))));
    assert_eq!(engine.reservation_count(), 0);

    let second = format!("DELETE FROM reservations WHERE id = '{id}'");
    assert_eq!(sqlstate(&client, &second).await, "P0002");
}

#[tokio::test]
async fn delete_malformed_id_is_not_found() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let sql = "DELETE FROM reservations WHERE id = 'not-a-ulid'";
    assert_eq!(sqlstate(&client, sql).await, "P0002");
}

#[tokio::test]
async fn rejections_map_to_sqlstates() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    client
        .batch_execute(&insert_sql("A", "2999-01-01T09:00:00Z", "2999-01-01T10:00:00Z"))
        .await
        .unwrap();

    let overlap = insert_sql("A", "2999-01-01T09:30:00Z", "2999-01-01T10:30:00Z");
    assert_eq!(sqlstate(&client, &overlap).await, "23P01");

    let backwards = insert_sql("A", "2999-01-01T10:00:00Z", "2999-01-01T09:00:00Z");
    assert_eq!(sqlstate(&client, &backwards).await, "22000");

    let past = insert_sql("A", "2000-01-01T09:00:00Z", "2000-01-01T10:00:00Z");
    assert_eq!(sqlstate(&client, &past).await, "22000");

    let invalid = insert_sql("A", "tomorrow", "2999-01-01T10:00:00Z");
    assert_eq!(sqlstate(&client, &invalid).await, "22023");

    assert_eq!(sqlstate(&client, "DROP TABLE reservations").await, "42601");
}

#[tokio::test]
async fn error_message_carries_field_errors() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let err = client
        .simple_query("INSERT INTO reservations VALUES (NULL, 'x', NULL)")
        .await
        .unwrap_err();
    let db = err.as_db_error().expect("expected a server error");
    assert_eq!(
        db.message(),
        "roomId is required; startTime must be a valid ISO date string; endTime is required"
    );
}

#[tokio::test]
async fn extended_protocol_binds_parameters() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let inserted = client
        .query(
            "INSERT INTO reservations (room_id, start_time, end_time) VALUES ($1, $2, $3)",
            &[&"O'Hare", &"2999-01-01T09:00:00Z", &"2999-01-01T10:00:00Z"],
        )
        .await
        .unwrap();
    assert_eq!(inserted.len(), 1);
    let room: String = inserted[0].get("room_id");
    assert_eq!(room, "O'Hare");

    let listed = client
        .query(
            "SELECT * FROM reservations WHERE room_id = $1",
            &[&"O'Hare"],
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    let id: String = listed[0].get("id");
    let inserted_id: String = inserted[0].get("id");
    assert_eq!(id, inserted_id);
}

#[tokio::test]
async fn multiple_statements_rejected_as_a_whole() {
    let (addr, engine) = start_test_server().await;
    let client = connect(addr).await;

    let sql = format!(
        "{}; {}",
        insert_sql("A", "2999-01-01T09:00:00Z", "2999-01-01T10:00:00Z"),
        insert_sql("B", "2999-01-01T09:00:00Z", "2999-01-01T10:00:00Z"),
    );
    assert_eq!(sqlstate(&client, &sql).await, "42601");
    assert_eq!(engine.reservation_count(), 0);
    assert!(engine.list_by_room("A").await.is_empty());
    assert!(engine.list_by_room("B").await.is_empty());
}

#[tokio::test]
async fn bound_value_containing_placeholder_text() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let inserted = client
        .query(
            "INSERT INTO reservations (start_time, end_time, room_id) VALUES ($3, $1, $2)",
            &[&"2999-01-01T10:00:00Z", &"Room $1", &"2999-01-01T09:00:00Z"],
        )
        .await
        .unwrap();
    assert_eq!(inserted.len(), 1);
    let room: String = inserted[0].get("room_id");
    assert_eq!(room, "Room $1");
}
