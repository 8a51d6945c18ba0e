//! Row types for the subscription and dispatch tables.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Queryable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub guest: bool,
}

#[derive(Insertable, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub guest: bool,
}

#[derive(Queryable, Serialize, Deserialize, Debug, Clone)]
pub struct Course {
    pub id: i32,
    pub fullname: String,
}

#[derive(Insertable, Deserialize)]
#[diesel(table_name = crate::schema::courses)]
pub struct NewCourse<'a> {
    pub fullname: &'a str,
}

#[derive(Queryable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Forum {
    pub id: i32,
    pub course_id: i32,
    pub name: String,
    /// Raw subscription mode value; see [`crate::subscriptions::SubscriptionMode`].
    pub subscription_mode: i32,
    pub visible: bool,
}

#[derive(Insertable, Deserialize)]
#[diesel(table_name = crate::schema::forums)]
pub struct NewForum<'a> {
    pub course_id: i32,
    pub name: &'a str,
    pub subscription_mode: i32,
    pub visible: bool,
}

#[derive(Queryable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Discussion {
    pub id: i32,
    pub forum_id: i32,
    pub name: String,
    pub timestart: Option<NaiveDateTime>,
    pub timeend: Option<NaiveDateTime>,
}

#[derive(Insertable, Deserialize)]
#[diesel(table_name = crate::schema::discussions)]
pub struct NewDiscussion<'a> {
    pub forum_id: i32,
    pub name: &'a str,
    pub timestart: Option<NaiveDateTime>,
    pub timeend: Option<NaiveDateTime>,
}

#[derive(Queryable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i32,
    pub discussion_id: i32,
    pub user_id: i32,
    pub subject: String,
    pub message: String,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    /// Mailing state; see [`crate::db::MailedStatus`].
    pub mailed: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::posts)]
pub struct NewPost<'a> {
    pub discussion_id: i32,
    pub user_id: i32,
    pub subject: &'a str,
    pub message: &'a str,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub mailed: i32,
}

#[derive(Queryable, Serialize, Deserialize, Debug, Clone)]
pub struct ForumSubscription {
    pub id: i32,
    pub user_id: i32,
    pub forum_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::forum_subscriptions)]
pub struct NewForumSubscription {
    pub user_id: i32,
    pub forum_id: i32,
}

/// Discussion-level delta record. `preference` is an epoch timestamp for an
/// explicit subscription, or [`crate::subscriptions::DISCUSSION_UNSUBSCRIBED`].
#[derive(Queryable, Serialize, Deserialize, Debug, Clone)]
pub struct DiscussionSubscription {
    pub id: i32,
    pub user_id: i32,
    pub discussion_id: i32,
    pub forum_id: i32,
    pub preference: i64,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::discussion_subscriptions)]
pub struct NewDiscussionSubscription {
    pub user_id: i32,
    pub discussion_id: i32,
    pub forum_id: i32,
    pub preference: i64,
}

#[derive(Queryable, Serialize, Deserialize, Debug, Clone)]
pub struct ForumDigest {
    pub id: i32,
    pub user_id: i32,
    pub forum_id: i32,
    pub maildigest: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::forum_digests)]
pub struct NewForumDigest {
    pub user_id: i32,
    pub forum_id: i32,
    pub maildigest: i32,
}

#[derive(Queryable, Serialize, Deserialize, Debug, Clone)]
pub struct DigestQueueEntry {
    pub id: i32,
    pub user_id: i32,
    pub discussion_id: i32,
    pub post_id: i32,
    pub queued_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::digest_queue)]
pub struct NewDigestQueueEntry {
    pub user_id: i32,
    pub discussion_id: i32,
    pub post_id: i32,
    pub queued_at: NaiveDateTime,
}
