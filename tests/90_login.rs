//! End-to-end flows against a provisioned Postgres. Ignored by default: run
//! with `cargo test -- --ignored --test-threads=1` and `DB_URL` pointing at
//! a database the tests may freely reset (they rebuild the shared schema).

mod common;

use anyhow::Result;
use chrono::Duration;
use reqwest::{header, StatusCode};

use lattice_api::auth::password;
use lattice_api::models::{tenant, user};

async fn reset_shared_schema(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query("DROP SCHEMA IF EXISTS shared CASCADE")
        .execute(pool)
        .await?;
    sqlx::query("CREATE SCHEMA shared").execute(pool).await?;

    sqlx::query(
        "CREATE TABLE shared.tenant ( \
            id BIGINT GENERATED ALWAYS AS IDENTITY (START WITH 1000) PRIMARY KEY, \
            created_at TIMESTAMPTZ DEFAULT timezone('UTC', now()), \
            deleted_at TIMESTAMPTZ, \
            name TEXT NOT NULL, \
            schema TEXT NOT NULL UNIQUE, \
            default_tenant BOOLEAN NOT NULL DEFAULT false, \
            active BOOLEAN NOT NULL DEFAULT false \
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE shared.\"user\" ( \
            id BIGINT GENERATED ALWAYS AS IDENTITY (START WITH 1000) PRIMARY KEY, \
            created_at TIMESTAMPTZ DEFAULT timezone('UTC', now()), \
            deleted_at TIMESTAMPTZ, \
            tenant_id BIGINT NOT NULL REFERENCES shared.tenant(id), \
            name TEXT NOT NULL, \
            password TEXT NOT NULL, \
            email TEXT NOT NULL, \
            active BOOLEAN NOT NULL DEFAULT false \
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[tokio::test]
#[ignore = "requires a provisioned postgres reachable via DB_URL"]
async fn login_refresh_and_identity_flow() -> Result<()> {
    let server = common::spawn_server().await?;
    let admin = sqlx::PgPool::connect(&common::test_config(0).database.url).await?;

    reset_shared_schema(&admin).await?;
    sqlx::query("DROP SCHEMA IF EXISTS tenant_apex CASCADE")
        .execute(&admin)
        .await?;
    sqlx::query("CREATE SCHEMA tenant_apex").execute(&admin).await?;

    // Provision through the same repositories the CLI uses.
    let hash = password::hash("pw1").await?;
    server
        .state
        .sessions
        .with_shared(move |conn| {
            Box::pin(async move {
                let apex = tenant::insert(conn, "apex", "tenant_apex", true, true).await?;
                user::insert(conn, apex.record.id, "admin", &hash, "admin@apex.test", true)
                    .await?;
                Ok::<_, anyhow::Error>(())
            })
        })
        .await?;

    let client = reqwest::Client::builder().cookie_store(true).build()?;

    // Valid login: access token in the body, refresh token only as a cookie.
    let res = client
        .post(format!("{}/api/v1/authentication/token", server.base_url))
        .form(&[("username", "admin"), ("password", "pw1")])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let set_cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .expect("refresh cookie")
        .to_str()?
        .to_string();
    assert!(set_cookie.starts_with("refresh_token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["token_type"], "bearer");
    let access_token = body["access_token"].as_str().unwrap().to_string();
    assert!(!body.to_string().contains("refresh_token"));

    // The bearer resolves to its tenant's schema.
    let res = client
        .get(format!("{}/api/v1/authentication/users/me", server.base_url))
        .bearer_auth(&access_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let me = res.json::<serde_json::Value>().await?;
    assert_eq!(me["username"], "admin");
    assert_eq!(me["tenant_schema"], "tenant_apex");

    // Past the access TTL the ping fails with the distinguishable message.
    let user_id = server.state.tokens.validate(&access_token)?;
    let expired = server.state.tokens.issue(user_id, Duration::minutes(-5))?;
    let res = client
        .get(format!("{}/api/v1/authentication/ping", server.base_url))
        .bearer_auth(&expired)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<serde_json::Value>().await?["message"], "Token expired");

    // The still-valid refresh cookie mints a working access token.
    let res = client
        .post(format!("{}/api/v1/authentication/refresh", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let refreshed = res.json::<serde_json::Value>().await?;
    let new_access = refreshed["access_token"].as_str().unwrap();
    assert_eq!(server.state.tokens.validate(new_access)?, user_id);

    // Wrong password: uniform 401 with the challenge header, no hint about
    // which factor failed.
    let res = client
        .post(format!("{}/api/v1/authentication/token", server.base_url))
        .form(&[("username", "admin"), ("password", "wrongpw")])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["message"], "Incorrect username or password");

    // Unknown user reads identically.
    let res = client
        .post(format!("{}/api/v1/authentication/token", server.base_url))
        .form(&[("username", "nobody"), ("password", "pw1")])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.json::<serde_json::Value>().await?["message"],
        "Incorrect username or password"
    );

    Ok(())
}

#[tokio::test]
#[ignore = "requires a provisioned postgres reachable via DB_URL"]
async fn soft_deleted_user_cannot_authenticate_or_resolve() -> Result<()> {
    let server = common::spawn_server().await?;
    let admin = sqlx::PgPool::connect(&common::test_config(0).database.url).await?;

    reset_shared_schema(&admin).await?;

    let hash = password::hash("pw1").await?;
    let doomed_id = server
        .state
        .sessions
        .with_shared(move |conn| {
            Box::pin(async move {
                let t = tenant::insert(conn, "apex", "tenant_apex", true, false).await?;
                let mut doomed =
                    user::insert(conn, t.record.id, "doomed", &hash, "doomed@apex.test", true)
                        .await?;

                user::soft_delete(conn, &mut doomed).await?;
                let first_stamp = doomed.record.deleted_at;

                // Re-deleting keeps the original tombstone.
                user::soft_delete(conn, &mut doomed).await?;
                assert_eq!(doomed.record.deleted_at, first_stamp);

                Ok::<_, anyhow::Error>(doomed.record.id)
            })
        })
        .await?;

    // Invisible to the default read paths.
    let gone = server
        .state
        .sessions
        .with_shared(move |conn| {
            Box::pin(async move {
                user::find_by_id(conn, doomed_id)
                    .await
                    .map_err(anyhow::Error::from)
            })
        })
        .await?;
    assert!(gone.is_none());

    // A token minted before the deletion now behaves like an invalid token.
    let stale = server.state.tokens.issue_access(doomed_id)?;
    let res = reqwest::Client::new()
        .get(format!("{}/api/v1/authentication/users/me", server.base_url))
        .bearer_auth(&stale)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.json::<serde_json::Value>().await?["message"],
        "Could not validate credentials"
    );

    Ok(())
}

#[tokio::test]
#[ignore = "requires a provisioned postgres reachable via DB_URL"]
async fn sessions_for_different_schemas_stay_disjoint() -> Result<()> {
    let server = common::spawn_server().await?;
    let admin = sqlx::PgPool::connect(&common::test_config(0).database.url).await?;

    for (schema, body) in [("iso_apex", "apex note"), ("iso_zephyr", "zephyr note")] {
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
            .execute(&admin)
            .await?;
        sqlx::query(&format!("CREATE SCHEMA {schema}")).execute(&admin).await?;
        sqlx::query(&format!("CREATE TABLE {schema}.note (body TEXT NOT NULL)"))
            .execute(&admin)
            .await?;
        sqlx::query(&format!("INSERT INTO {schema}.note (body) VALUES ($1)"))
            .bind(body)
            .execute(&admin)
            .await?;
    }

    // Same pool, same unqualified query, two concurrent sessions: each sees
    // only the rows of the schema it was opened for.
    let sessions = &server.state.sessions;
    let (mut apex, mut zephyr) = tokio::try_join!(
        sessions.open_session("iso_apex"),
        sessions.open_session("iso_zephyr"),
    )?;

    let apex_rows: Vec<(String,)> = sqlx::query_as("SELECT body FROM note")
        .fetch_all(&mut *apex)
        .await?;
    let zephyr_rows: Vec<(String,)> = sqlx::query_as("SELECT body FROM note")
        .fetch_all(&mut *zephyr)
        .await?;

    assert_eq!(apex_rows, vec![("apex note".to_string(),)]);
    assert_eq!(zephyr_rows, vec![("zephyr note".to_string(),)]);

    apex.rollback().await?;
    zephyr.rollback().await?;
    Ok(())
}
