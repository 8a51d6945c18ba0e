//! End-to-end dispatch runs: post to send unit to digest flush.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use diesel_async::AsyncConnection;
use threadmail::{
    capability::{GrantAll, VisibleOnly},
    db::{self, DbConnection, MailedStatus},
    digest::DigestMode,
    dispatch::{
        DeliveryError,
        Dispatcher,
        DispatchWindow,
        MailTransport,
        SendUnit,
    },
    models::{NewCourse, NewDiscussion, NewForum, NewPost, NewUser},
};

#[derive(Default)]
struct RecordingTransport {
    units: Vec<SendUnit>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn deliver(&mut self, unit: SendUnit) -> Result<(), DeliveryError> {
        self.units.push(unit);
        Ok(())
    }
}

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 8, 21)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn window() -> DispatchWindow {
    DispatchWindow {
        edit_grace: Duration::minutes(30),
        max_mailing_age: Duration::hours(48),
    }
}

async fn migrated_conn() -> DbConnection {
    let mut conn = DbConnection::establish(":memory:").await.unwrap();
    db::apply_migrations(&mut conn, "").await.unwrap();
    conn
}

struct Scenario {
    forum_id: i32,
    discussion_id: i32,
    subscriber: i32,
}

async fn seed(conn: &mut DbConnection) -> Scenario {
    let course = db::create_course(conn, &NewCourse { fullname: "Course" })
        .await
        .unwrap();
    let forum_id = db::create_forum(
        conn,
        &NewForum {
            course_id: course,
            name: "General",
            subscription_mode: 0,
            visible: true,
        },
    )
    .await
    .unwrap();
    let discussion_id = db::create_discussion(
        conn,
        &NewDiscussion {
            forum_id,
            name: "Topic",
            timestart: None,
            timeend: None,
        },
    )
    .await
    .unwrap();
    let author = db::create_user(
        conn,
        &NewUser {
            username: "author",
            email: "author@example.com",
            guest: false,
        },
    )
    .await
    .unwrap();
    let subscriber = db::create_user(
        conn,
        &NewUser {
            username: "reader",
            email: "reader@example.com",
            guest: false,
        },
    )
    .await
    .unwrap();
    db::insert_subscription(conn, subscriber, forum_id)
        .await
        .unwrap();
    db::create_post(
        conn,
        &NewPost {
            discussion_id,
            user_id: author,
            subject: "Weekly update",
            message: "All the details",
            created: at(9),
            modified: at(9),
            mailed: MailedStatus::Pending.raw(),
        },
    )
    .await
    .unwrap();
    Scenario {
        forum_id,
        discussion_id,
        subscriber,
    }
}

#[tokio::test]
async fn post_becomes_exactly_one_send() {
    let mut conn = migrated_conn().await;
    let scenario = seed(&mut conn).await;
    let dispatcher = Dispatcher::new(&GrantAll, &VisibleOnly, window(), DigestMode::Off);
    let mut transport = RecordingTransport::default();

    let first = dispatcher
        .run_pending(&mut conn, &mut transport, at(12))
        .await
        .unwrap();
    assert_eq!((first.posts, first.sent, first.queued), (1, 1, 0));

    let rerun = dispatcher
        .run_pending(&mut conn, &mut transport, at(13))
        .await
        .unwrap();
    assert_eq!(rerun.posts, 0);

    assert_eq!(transport.units.len(), 1);
    match transport.units.first() {
        Some(SendUnit::Immediate(send)) => {
            assert_eq!(send.user.id, scenario.subscriber);
            assert_eq!(send.discussion.id, scenario.discussion_id);
            assert_eq!(send.rendering.subject, "Weekly update");
        }
        other => panic!("expected an immediate send, got {other:?}"),
    }
}

#[tokio::test]
async fn digest_mode_routes_through_the_queue() {
    let mut conn = migrated_conn().await;
    let scenario = seed(&mut conn).await;
    db::upsert_digest(
        &mut conn,
        scenario.subscriber,
        scenario.forum_id,
        DigestMode::SubjectsOnly.raw(),
    )
    .await
    .unwrap();
    let dispatcher = Dispatcher::new(&GrantAll, &VisibleOnly, window(), DigestMode::Off);
    let mut transport = RecordingTransport::default();

    let pending = dispatcher
        .run_pending(&mut conn, &mut transport, at(12))
        .await
        .unwrap();
    assert_eq!((pending.sent, pending.queued), (0, 1));
    assert!(transport.units.is_empty());

    let digests = dispatcher
        .run_digests(&mut conn, &mut transport, at(13))
        .await
        .unwrap();
    assert_eq!((digests.users, digests.items), (1, 1));
    match transport.units.first() {
        Some(SendUnit::Digest(send)) => {
            assert_eq!(send.user.id, scenario.subscriber);
            let item = send.items.first().unwrap();
            assert_eq!(item.rendering.subject, "Weekly update");
            assert!(item.rendering.body.is_none());
        }
        other => panic!("expected a digest, got {other:?}"),
    }

    // Nothing left for the next flush.
    let rerun = dispatcher
        .run_digests(&mut conn, &mut transport, at(14))
        .await
        .unwrap();
    assert_eq!(rerun.users, 0);
}
