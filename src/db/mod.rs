//! Manage database connections and domain queries.
//!
//! This module tree exposes helpers for creating pooled Diesel connections,
//! running embedded migrations, and executing application queries grouped by
//! domain concerns. Business rules live in [`crate::subscriptions`] and
//! [`crate::dispatch`]; these helpers only move rows.

mod connection;
mod digests;
mod discussions;
mod enrolments;
mod forums;
mod insert;
mod migrations;
mod posts;
mod queue;
mod subscriptions;
mod users;


pub use self::{
    connection::{Backend, DbConnection, DbPool, establish_pool},
    digests::{delete_digest, get_digest_row, upsert_digest},
    discussions::{create_discussion, delete_discussion, get_discussion},
    enrolments::{
        add_group_member,
        create_course,
        enrol_user,
        enrolled_course_ids,
        enrolled_user_ids,
        group_member_ids,
        unenrol_user,
    },
    forums::{create_forum, forums_in_course, get_forum, set_subscription_mode},
    migrations::{MIGRATIONS, apply_migrations, run_migrations},
    posts::{MailedStatus, create_post, get_post, mark_mailed, unmailed_posts},
    queue::{delete_for_user, due_entries, enqueue},
    subscriptions::{
        course_subscription_flags,
        delete_discussion_override,
        delete_subscription,
        explicit_subscriptions_in_enrolled_courses,
        forum_overrides,
        forum_subscribed_users,
        get_discussion_override,
        get_subscription,
        insert_subscription,
        override_subscribed_users,
        purge_subscribed_overrides,
        purge_user_forums,
        subscriber_ids,
        subscription_exists,
        upsert_discussion_override,
        user_forum_overrides,
    },
    users::{create_user, get_user, get_users_by_ids},
};
