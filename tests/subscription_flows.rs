//! End-to-end subscription flows through the public API.

use diesel_async::AsyncConnection;
use threadmail::{
    capability::{Actor, Context, GrantAll, VisibleOnly},
    db::{self, DbConnection},
    digest::{DIGEST_USE_DEFAULT, DigestMode, effective_digest, set_digest_option},
    events::{Event, RecordingEventSink},
    models::{NewCourse, NewDiscussion, NewForum, NewUser},
    observers,
    subscriptions::{
        self,
        SubscribeOutcome,
        SubscriptionCache,
        SubscriptionMode,
    },
};

async fn migrated_conn() -> DbConnection {
    let mut conn = DbConnection::establish(":memory:").await.unwrap();
    db::apply_migrations(&mut conn, "").await.unwrap();
    conn
}

async fn seed_forum(conn: &mut DbConnection, mode: SubscriptionMode) -> (i32, i32) {
    let course = db::create_course(conn, &NewCourse { fullname: "Course" })
        .await
        .unwrap();
    let forum = db::create_forum(
        conn,
        &NewForum {
            course_id: course,
            name: "General",
            subscription_mode: mode.raw(),
            visible: true,
        },
    )
    .await
    .unwrap();
    (course, forum)
}

async fn seed_user(conn: &mut DbConnection, name: &str) -> i32 {
    db::create_user(
        conn,
        &NewUser {
            username: name,
            email: "u@example.com",
            guest: false,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn subscribe_toggle_emits_paired_events() {
    let mut conn = migrated_conn().await;
    let (_, forum_id) = seed_forum(&mut conn, SubscriptionMode::Optional).await;
    let forum = db::get_forum(&mut conn, forum_id).await.unwrap().unwrap();
    let user = seed_user(&mut conn, "alice").await;
    let mut cache = SubscriptionCache::new();
    let mut sink = RecordingEventSink::default();
    let ctx = Context::new(forum_id);

    let outcome = subscriptions::subscribe_user(
        &mut conn, &mut cache, &GrantAll, &mut sink, user, &forum, &ctx, true,
    )
    .await
    .unwrap();
    let SubscribeOutcome::Subscribed(subscription_id) = outcome else {
        panic!("expected a new subscription row");
    };

    subscriptions::unsubscribe_user(&mut conn, &mut cache, &mut sink, user, &forum, &ctx, true)
        .await
        .unwrap();

    match sink.events.as_slice() {
        [Event::SubscriptionCreated(created), Event::SubscriptionDeleted(deleted)] => {
            assert_eq!(created.subscription_id, subscription_id);
            assert_eq!(deleted.subscription_id, subscription_id);
            assert_eq!(created.forum_id, forum_id);
        }
        other => panic!("unexpected event stream {other:?}"),
    }
    assert!(
        !subscriptions::is_subscribed(&mut conn, &mut cache, &GrantAll, user, &forum, None, &ctx)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn discussion_override_lifecycle_survives_forum_state() {
    let mut conn = migrated_conn().await;
    let (_, forum_id) = seed_forum(&mut conn, SubscriptionMode::Optional).await;
    let forum = db::get_forum(&mut conn, forum_id).await.unwrap().unwrap();
    let discussion_id = db::create_discussion(
        &mut conn,
        &NewDiscussion {
            forum_id,
            name: "Topic",
            timestart: None,
            timeend: None,
        },
    )
    .await
    .unwrap();
    let discussion = db::get_discussion(&mut conn, discussion_id)
        .await
        .unwrap()
        .unwrap();
    let user = seed_user(&mut conn, "alice").await;
    let mut cache = SubscriptionCache::new();
    let mut sink = RecordingEventSink::default();
    let ctx = Context::new(forum_id);

    // Forum-subscribed, then opted out of one discussion.
    subscriptions::subscribe_user(
        &mut conn, &mut cache, &GrantAll, &mut sink, user, &forum, &ctx, true,
    )
    .await
    .unwrap();
    assert!(subscriptions::unsubscribe_user_from_discussion(
        &mut conn, &mut cache, &mut sink, user, &discussion, &ctx,
    )
    .await
    .unwrap());

    assert!(
        subscriptions::is_subscribed(&mut conn, &mut cache, &GrantAll, user, &forum, None, &ctx)
            .await
            .unwrap()
    );
    assert!(!subscriptions::is_subscribed(
        &mut conn,
        &mut cache,
        &GrantAll,
        user,
        &forum,
        Some(discussion_id),
        &ctx,
    )
    .await
    .unwrap());

    // The opt-out does not appear in the recipient list either.
    let recipients = subscriptions::fetch_subscribed_users(
        &mut conn,
        &GrantAll,
        &VisibleOnly,
        &forum,
        None,
        true,
        &ctx,
    )
    .await
    .unwrap();
    assert_eq!(recipients.len(), 1);
}

#[tokio::test]
async fn unenrol_then_list_shows_nothing() {
    let mut conn = migrated_conn().await;
    let (course, forum_id) = seed_forum(&mut conn, SubscriptionMode::Optional).await;
    let user = seed_user(&mut conn, "alice").await;
    db::enrol_user(&mut conn, user, course).await.unwrap();
    db::insert_subscription(&mut conn, user, forum_id).await.unwrap();
    let actor = Actor {
        id: user,
        authenticated: true,
        guest: false,
    };

    let before = subscriptions::unsubscribable_forums(&mut conn, &actor, &VisibleOnly)
        .await
        .unwrap();
    assert_eq!(before.len(), 1);

    let mut cache = SubscriptionCache::new();
    observers::user_unenrolled(&mut conn, &mut cache, user, course)
        .await
        .unwrap();
    db::unenrol_user(&mut conn, user, course).await.unwrap();

    let after = subscriptions::unsubscribable_forums(&mut conn, &actor, &VisibleOnly)
        .await
        .unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn digest_preferences_resolve_through_defaults() {
    let mut conn = migrated_conn().await;
    let (_, forum_id) = seed_forum(&mut conn, SubscriptionMode::Optional).await;
    let user = seed_user(&mut conn, "alice").await;

    assert_eq!(
        effective_digest(&mut conn, user, forum_id, DigestMode::SubjectsOnly)
            .await
            .unwrap(),
        DigestMode::SubjectsOnly
    );

    set_digest_option(&mut conn, user, forum_id, DigestMode::Full.raw())
        .await
        .unwrap();
    assert_eq!(
        effective_digest(&mut conn, user, forum_id, DigestMode::SubjectsOnly)
            .await
            .unwrap(),
        DigestMode::Full
    );

    set_digest_option(&mut conn, user, forum_id, DIGEST_USE_DEFAULT)
        .await
        .unwrap();
    assert_eq!(
        effective_digest(&mut conn, user, forum_id, DigestMode::Off)
            .await
            .unwrap(),
        DigestMode::Off
    );
}
