//! Process-local memoization of subscription state.
//!
//! Two independent regions memoize forum-level subscription flags and
//! discussion-level overrides, each with a "whole forum fully fetched"
//! marker. Computing a recipient list or a digest run touches every
//! subscriber of a forum; the whole-forum fill turns O(users) existence
//! queries into one bulk query.
//!
//! The cache is intentionally per-process and carries no locking: create one
//! per logical unit of work (request, batch run, test), pass it by `&mut`
//! into policy operations, and invalidate it at unit boundaries. Cross-process
//! consistency comes solely from each unit re-filling from the store.

use std::collections::{HashMap, HashSet};

use diesel::result::QueryResult;

use super::SubscriptionMode;
use crate::db::{self, DbConnection};

/// Memoized subscription state for one unit of work.
#[derive(Debug, Default)]
pub struct SubscriptionCache {
    /// user id -> forum id -> forum-level subscribed flag.
    forum: HashMap<i32, HashMap<i32, bool>>,
    /// Forums whose entire subscriber set has been loaded; absence of a
    /// cached entry then means "not subscribed" without another query.
    filled_forums: HashSet<i32>,
    /// user id -> forum id -> discussion id -> override preference.
    discussion: HashMap<i32, HashMap<i32, HashMap<i32, i64>>>,
    /// Forums whose entire override set has been loaded for all users.
    filled_discussion_forums: HashSet<i32>,
    /// (user, forum) pairs whose override set has been loaded. Only the
    /// fill paths set this; a mutation hook writing a single entry does not
    /// make the pair look fetched.
    filled_user_forums: HashSet<(i32, i32)>,
}

impl SubscriptionCache {
    /// Fresh, empty cache.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Forum-level subscription flag for (user, forum), filling the cache
    /// from the store on a miss and defaulting to `false`.
    ///
    /// # Errors
    /// Returns any error produced while filling from the store.
    pub async fn fetch_forum(
        &mut self,
        conn: &mut DbConnection,
        forum_id: i32,
        user_id: i32,
    ) -> QueryResult<bool> {
        if let Some(cached) = self.forum.get(&user_id).and_then(|m| m.get(&forum_id)) {
            return Ok(*cached);
        }
        if self.filled_forums.contains(&forum_id) {
            return Ok(false);
        }
        self.fill_forum(conn, forum_id, Some(user_id)).await?;
        Ok(self
            .forum
            .get(&user_id)
            .and_then(|m| m.get(&forum_id))
            .copied()
            .unwrap_or(false))
    }

    /// Fill the forum-level region from the store.
    ///
    /// With a user id, one existence lookup caches a single entry. Without,
    /// one bulk query loads every subscriber of the forum and marks it fully
    /// fetched, making subsequent per-user lookups cache-only.
    ///
    /// # Errors
    /// Returns any error produced by the store queries.
    pub async fn fill_forum(
        &mut self,
        conn: &mut DbConnection,
        forum_id: i32,
        user_id: Option<i32>,
    ) -> QueryResult<()> {
        match user_id {
            Some(user) => {
                let subscribed = db::subscription_exists(conn, user, forum_id).await?;
                self.set_forum(user, forum_id, subscribed);
            }
            None => {
                for user in db::subscriber_ids(conn, forum_id).await? {
                    self.set_forum(user, forum_id, true);
                }
                self.filled_forums.insert(forum_id);
            }
        }
        Ok(())
    }

    /// Cache, in one query, the user's subscription flag for every forum in
    /// a course that is not in forced mode.
    ///
    /// # Errors
    /// Returns any error produced by the store query.
    pub async fn fill_forums_for_course(
        &mut self,
        conn: &mut DbConnection,
        course_id: i32,
        user_id: i32,
    ) -> QueryResult<()> {
        let flags = db::course_subscription_flags(
            conn,
            course_id,
            user_id,
            SubscriptionMode::Forced.raw(),
        )
        .await?;
        for (forum_id, subscribed) in flags {
            self.set_forum(user_id, forum_id, subscribed);
        }
        Ok(())
    }

    /// Discussion override map for (user, forum), filling on a miss. Keys
    /// are discussion ids; values are raw preference values.
    ///
    /// # Errors
    /// Returns any error produced while filling from the store.
    pub async fn fetch_discussion_overrides(
        &mut self,
        conn: &mut DbConnection,
        forum_id: i32,
        user_id: i32,
    ) -> QueryResult<&HashMap<i32, i64>> {
        let cached = self.filled_discussion_forums.contains(&forum_id)
            || self.filled_user_forums.contains(&(user_id, forum_id));
        if !cached {
            self.fill_discussion_overrides(conn, forum_id, Some(user_id))
                .await?;
        }
        Ok(self
            .discussion
            .entry(user_id)
            .or_default()
            .entry(forum_id)
            .or_default())
    }

    /// Fill the discussion override region, either for one user or for the
    /// whole forum (marking it fully fetched).
    ///
    /// # Errors
    /// Returns any error produced by the store queries.
    pub async fn fill_discussion_overrides(
        &mut self,
        conn: &mut DbConnection,
        forum_id: i32,
        user_id: Option<i32>,
    ) -> QueryResult<()> {
        match user_id {
            Some(user) => {
                let rows = db::user_forum_overrides(conn, user, forum_id).await?;
                let map = self
                    .discussion
                    .entry(user)
                    .or_default()
                    .entry(forum_id)
                    .or_default();
                map.clear();
                for row in rows {
                    map.insert(row.discussion_id, row.preference);
                }
                self.filled_user_forums.insert((user, forum_id));
            }
            None => {
                for row in db::forum_overrides(conn, forum_id).await? {
                    self.set_discussion(row.user_id, forum_id, row.discussion_id, row.preference);
                }
                self.filled_discussion_forums.insert(forum_id);
            }
        }
        Ok(())
    }

    /// Record a forum-level flag after a mutation.
    pub fn set_forum(&mut self, user_id: i32, forum_id: i32, subscribed: bool) {
        self.forum
            .entry(user_id)
            .or_default()
            .insert(forum_id, subscribed);
    }

    /// Record an override preference after a mutation.
    pub fn set_discussion(&mut self, user_id: i32, forum_id: i32, discussion_id: i32, preference: i64) {
        self.discussion
            .entry(user_id)
            .or_default()
            .entry(forum_id)
            .or_default()
            .insert(discussion_id, preference);
    }

    /// Drop a cached override after its row was deleted.
    pub fn clear_discussion(&mut self, user_id: i32, forum_id: i32, discussion_id: i32) {
        if let Some(map) = self
            .discussion
            .get_mut(&user_id)
            .and_then(|m| m.get_mut(&forum_id))
        {
            map.remove(&discussion_id);
        }
    }

    /// Full reset of the forum-level region.
    pub fn invalidate_forum_cache(&mut self) {
        self.forum.clear();
        self.filled_forums.clear();
    }

    /// Full reset of the discussion override region.
    pub fn invalidate_discussion_cache(&mut self) {
        self.discussion.clear();
        self.filled_discussion_forums.clear();
        self.filled_user_forums.clear();
    }
}

#[cfg(test)]
mod tests {
    use diesel_async::AsyncConnection;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        db::{apply_migrations, create_course, create_forum, create_user},
        models::{NewForum, NewUser},
    };

    #[fixture]
    async fn migrated_conn() -> DbConnection {
        let mut conn = DbConnection::establish(":memory:")
            .await
            .expect("failed to create in-memory connection");
        apply_migrations(&mut conn, "")
            .await
            .expect("failed to apply migrations");
        conn
    }

    async fn seed_forum(conn: &mut DbConnection, mode: SubscriptionMode) -> i32 {
        let course = create_course(conn, &crate::models::NewCourse { fullname: "C1" })
            .await
            .expect("create course");
        create_forum(
            conn,
            &NewForum {
                course_id: course,
                name: "General",
                subscription_mode: mode.raw(),
                visible: true,
            },
        )
        .await
        .expect("create forum")
    }

    async fn seed_user(conn: &mut DbConnection, name: &str) -> i32 {
        create_user(
            conn,
            &NewUser {
                username: name,
                email: "u@example.com",
                guest: false,
            },
        )
        .await
        .expect("create user")
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_forum_defaults_to_false(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let forum = seed_forum(&mut conn, SubscriptionMode::Optional).await;
        let user = seed_user(&mut conn, "alice").await;
        let mut cache = SubscriptionCache::new();
        assert!(!cache.fetch_forum(&mut conn, forum, user).await.expect("fetch"));
    }

    #[rstest]
    #[tokio::test]
    async fn whole_forum_fill_is_authoritative(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let forum = seed_forum(&mut conn, SubscriptionMode::Optional).await;
        let alice = seed_user(&mut conn, "alice").await;
        let bob = seed_user(&mut conn, "bob").await;
        db::insert_subscription(&mut conn, alice, forum)
            .await
            .expect("subscribe alice");

        let mut cache = SubscriptionCache::new();
        cache
            .fill_forum(&mut conn, forum, None)
            .await
            .expect("bulk fill");

        // A row added behind the cache's back stays invisible: the filled
        // marker means per-user lookups no longer consult storage.
        db::insert_subscription(&mut conn, bob, forum)
            .await
            .expect("subscribe bob");
        assert!(cache.fetch_forum(&mut conn, forum, alice).await.expect("fetch"));
        assert!(!cache.fetch_forum(&mut conn, forum, bob).await.expect("fetch"));

        cache.invalidate_forum_cache();
        assert!(cache.fetch_forum(&mut conn, forum, bob).await.expect("fetch"));
    }

    #[rstest]
    #[tokio::test]
    async fn single_user_override_fill_marks_user_fetched(
        #[future] migrated_conn: DbConnection,
    ) {
        let mut conn = migrated_conn.await;
        let forum = seed_forum(&mut conn, SubscriptionMode::Optional).await;
        let user = seed_user(&mut conn, "alice").await;
        let discussion = db::create_discussion(
            &mut conn,
            &crate::models::NewDiscussion {
                forum_id: forum,
                name: "Topic",
                timestart: None,
                timeend: None,
            },
        )
        .await
        .expect("create discussion");
        db::upsert_discussion_override(
            &mut conn,
            &crate::models::NewDiscussionSubscription {
                user_id: user,
                discussion_id: discussion,
                forum_id: forum,
                preference: 1_700_000_000,
            },
        )
        .await
        .expect("upsert override");

        let mut cache = SubscriptionCache::new();
        let overrides = cache
            .fetch_discussion_overrides(&mut conn, forum, user)
            .await
            .expect("fetch overrides");
        assert_eq!(overrides.get(&discussion), Some(&1_700_000_000));

        // Second fetch is served from memory; a row deleted underneath is
        // still reported until the region is invalidated.
        db::delete_discussion_override(&mut conn, user, discussion)
            .await
            .expect("delete override");
        let stale = cache
            .fetch_discussion_overrides(&mut conn, forum, user)
            .await
            .expect("fetch overrides");
        assert_eq!(stale.get(&discussion), Some(&1_700_000_000));

        cache.invalidate_discussion_cache();
        let fresh = cache
            .fetch_discussion_overrides(&mut conn, forum, user)
            .await
            .expect("fetch overrides");
        assert!(fresh.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn mutation_hook_does_not_mark_the_pair_fetched(
        #[future] migrated_conn: DbConnection,
    ) {
        let mut conn = migrated_conn.await;
        let forum = seed_forum(&mut conn, SubscriptionMode::Optional).await;
        let user = seed_user(&mut conn, "alice").await;
        let stored = db::create_discussion(
            &mut conn,
            &crate::models::NewDiscussion {
                forum_id: forum,
                name: "Stored",
                timestart: None,
                timeend: None,
            },
        )
        .await
        .expect("create discussion");
        let mutated = db::create_discussion(
            &mut conn,
            &crate::models::NewDiscussion {
                forum_id: forum,
                name: "Mutated",
                timestart: None,
                timeend: None,
            },
        )
        .await
        .expect("create discussion");
        db::upsert_discussion_override(
            &mut conn,
            &crate::models::NewDiscussionSubscription {
                user_id: user,
                discussion_id: stored,
                forum_id: forum,
                preference: -1,
            },
        )
        .await
        .expect("upsert override");

        let mut cache = SubscriptionCache::new();
        // A write-through for one discussion must not hide the other
        // discussion's pre-existing store row from the next fetch.
        cache.set_discussion(user, forum, mutated, 1_700_000_000);

        let overrides = cache
            .fetch_discussion_overrides(&mut conn, forum, user)
            .await
            .expect("fetch overrides");
        assert_eq!(overrides.get(&stored), Some(&-1));
    }

    #[rstest]
    #[tokio::test]
    async fn course_fill_covers_non_forced_forums(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let course = create_course(&mut conn, &crate::models::NewCourse { fullname: "C1" })
            .await
            .expect("create course");
        let optional = create_forum(
            &mut conn,
            &NewForum {
                course_id: course,
                name: "Optional",
                subscription_mode: SubscriptionMode::Optional.raw(),
                visible: true,
            },
        )
        .await
        .expect("create forum");
        let forced = create_forum(
            &mut conn,
            &NewForum {
                course_id: course,
                name: "Announcements",
                subscription_mode: SubscriptionMode::Forced.raw(),
                visible: true,
            },
        )
        .await
        .expect("create forum");
        let user = seed_user(&mut conn, "alice").await;
        db::insert_subscription(&mut conn, user, optional)
            .await
            .expect("subscribe");

        let mut cache = SubscriptionCache::new();
        cache
            .fill_forums_for_course(&mut conn, course, user)
            .await
            .expect("course fill");

        assert!(cache.fetch_forum(&mut conn, optional, user).await.expect("fetch"));
        // The forced forum is skipped by the course fill; fetching it falls
        // back to a per-user store lookup.
        assert!(!cache.fetch_forum(&mut conn, forced, user).await.expect("fetch"));
    }
}
