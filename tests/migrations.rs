use diesel_async::{AsyncConnection, RunQueryDsl};
use threadmail::db;

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_migrations_run() {
    let mut conn = db::DbConnection::establish(":memory:").await.unwrap();
    db::run_migrations(&mut conn).await.unwrap();
    for table in [
        "users",
        "courses",
        "enrolments",
        "group_members",
        "forums",
        "discussions",
        "posts",
        "forum_subscriptions",
        "discussion_subscriptions",
        "forum_digests",
        "digest_queue",
    ] {
        diesel::sql_query(format!("SELECT * FROM {table}"))
            .execute(&mut conn)
            .await
            .unwrap();
    }
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let mut conn = db::DbConnection::establish(":memory:").await.unwrap();
    db::run_migrations(&mut conn).await.unwrap();
    db::run_migrations(&mut conn).await.unwrap();
}
