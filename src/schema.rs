//! Diesel table definitions for the subscription and dispatch tables.

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        guest -> Bool,
    }
}

diesel::table! {
    courses (id) {
        id -> Integer,
        fullname -> Text,
    }
}

diesel::table! {
    enrolments (user_id, course_id) {
        user_id -> Integer,
        course_id -> Integer,
    }
}

diesel::table! {
    group_members (group_id, user_id) {
        group_id -> Integer,
        user_id -> Integer,
    }
}

diesel::table! {
    forums (id) {
        id -> Integer,
        course_id -> Integer,
        name -> Text,
        subscription_mode -> Integer,
        visible -> Bool,
    }
}

diesel::table! {
    discussions (id) {
        id -> Integer,
        forum_id -> Integer,
        name -> Text,
        timestart -> Nullable<Timestamp>,
        timeend -> Nullable<Timestamp>,
    }
}

diesel::table! {
    posts (id) {
        id -> Integer,
        discussion_id -> Integer,
        user_id -> Integer,
        subject -> Text,
        message -> Text,
        created -> Timestamp,
        modified -> Timestamp,
        mailed -> Integer,
    }
}

diesel::table! {
    forum_subscriptions (id) {
        id -> Integer,
        user_id -> Integer,
        forum_id -> Integer,
    }
}

diesel::table! {
    discussion_subscriptions (id) {
        id -> Integer,
        user_id -> Integer,
        discussion_id -> Integer,
        forum_id -> Integer,
        preference -> BigInt,
    }
}

diesel::table! {
    forum_digests (id) {
        id -> Integer,
        user_id -> Integer,
        forum_id -> Integer,
        maildigest -> Integer,
    }
}

diesel::table! {
    digest_queue (id) {
        id -> Integer,
        user_id -> Integer,
        discussion_id -> Integer,
        post_id -> Integer,
        queued_at -> Timestamp,
    }
}

diesel::joinable!(forums -> courses (course_id));
diesel::joinable!(discussions -> forums (forum_id));
diesel::joinable!(posts -> discussions (discussion_id));
diesel::joinable!(forum_subscriptions -> forums (forum_id));
diesel::joinable!(discussion_subscriptions -> forums (forum_id));
diesel::joinable!(forum_digests -> forums (forum_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    courses,
    enrolments,
    group_members,
    forums,
    discussions,
    posts,
    forum_subscriptions,
    discussion_subscriptions,
    forum_digests,
    digest_queue,
);
