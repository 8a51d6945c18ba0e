//! Course, enrolment, and group membership helpers.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;

/// Insert a new course record, returning its id.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_course(
    conn: &mut DbConnection,
    course: &crate::models::NewCourse<'_>,
) -> QueryResult<i32> {
    use crate::schema::courses::dsl::courses;

    #[cfg(any(feature = "postgres", feature = "returning_clauses_for_sqlite_3_35"))]
    let inserted_id: i32 = {
        use crate::schema::courses::dsl::id;
        diesel::insert_into(courses)
            .values(course)
            .returning(id)
            .get_result(conn)
            .await?
    };

    #[cfg(all(feature = "sqlite", not(feature = "returning_clauses_for_sqlite_3_35")))]
    let inserted_id: i32 = {
        diesel::insert_into(courses)
            .values(course)
            .execute(conn)
            .await?;
        super::insert::fetch_last_insert_rowid(conn).await?
    };

    Ok(inserted_id)
}

/// Enrol a user on a course. Idempotent.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn enrol_user(conn: &mut DbConnection, user: i32, course: i32) -> QueryResult<()> {
    use crate::schema::enrolments::dsl as e;
    diesel::insert_into(e::enrolments)
        .values((e::user_id.eq(user), e::course_id.eq(course)))
        .on_conflict((e::user_id, e::course_id))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

/// Remove a user's enrolment row for a course.
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn unenrol_user(conn: &mut DbConnection, user: i32, course: i32) -> QueryResult<usize> {
    use crate::schema::enrolments::dsl as e;
    diesel::delete(
        e::enrolments
            .filter(e::user_id.eq(user))
            .filter(e::course_id.eq(course)),
    )
    .execute(conn)
    .await
}

/// List the ids of all users enrolled on a course, ordered by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn enrolled_user_ids(conn: &mut DbConnection, course: i32) -> QueryResult<Vec<i32>> {
    use crate::schema::enrolments::dsl as e;
    e::enrolments
        .filter(e::course_id.eq(course))
        .order(e::user_id.asc())
        .select(e::user_id)
        .load::<i32>(conn)
        .await
}

/// List the course ids a user is enrolled on.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn enrolled_course_ids(conn: &mut DbConnection, user: i32) -> QueryResult<Vec<i32>> {
    use crate::schema::enrolments::dsl as e;
    e::enrolments
        .filter(e::user_id.eq(user))
        .select(e::course_id)
        .load::<i32>(conn)
        .await
}

/// Add a user to a group. Idempotent.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn add_group_member(conn: &mut DbConnection, group: i32, user: i32) -> QueryResult<()> {
    use crate::schema::group_members::dsl as g;
    diesel::insert_into(g::group_members)
        .values((g::group_id.eq(group), g::user_id.eq(user)))
        .on_conflict((g::group_id, g::user_id))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

/// List the ids of all members of a group.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn group_member_ids(conn: &mut DbConnection, group: i32) -> QueryResult<Vec<i32>> {
    use crate::schema::group_members::dsl as g;
    g::group_members
        .filter(g::group_id.eq(group))
        .select(g::user_id)
        .load::<i32>(conn)
        .await
}
