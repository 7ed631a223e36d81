//! PostgreSQL store
//!
//! Multi-row flows run inside one transaction; single-row counter and
//! membership changes are single `UPDATE` statements so concurrent writers
//! cannot lose each other's updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{FromRow, PgPool, types::Json};
use tracing::info;
use uuid::Uuid;

use super::{ConnectionStore, GroupStore, ProfileStore};
use crate::{
    error::{SocialError, SocialResult},
    models::{
        Connection, ConnectionRequest, Group, ImageSlot, NewProfile, Participant, ProfileRecord,
        ProfileUpdate, UserProfile, UsernameReservation,
    },
    pair::PairKey,
};

const PROFILE_COLUMNS: &str = "uid, email, display_name, username, photo_url, cover_photo_url, \
     bio, branch, semester, social_links, interests, societies, posts, connections_count, \
     is_profile_complete, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, from_user_id, from_user_name, from_user_photo, to_user_id, \
     to_user_name, to_user_photo, status, created_at, updated_at";

const CONNECTION_COLUMNS: &str =
    "id, user1_id, user1_name, user1_photo, user2_id, user2_name, user2_photo, connected_at";

const GROUP_COLUMNS: &str = "id, name, description, category, interests, members, admins, \
     member_count, created_by, image_url, created_at, updated_at";

/// Apply the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> DatabaseResult<()> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))
}

#[derive(FromRow)]
struct RequestRecord {
    id: String,
    from_user_id: String,
    from_user_name: String,
    from_user_photo: Option<String>,
    to_user_id: String,
    to_user_name: String,
    to_user_photo: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRecord> for ConnectionRequest {
    type Error = DatabaseError;

    fn try_from(row: RequestRecord) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e: SocialError| DatabaseError::Corrupt {
            table: "connection_requests",
            reason: e.to_string(),
        })?;
        Ok(ConnectionRequest {
            id: PairKey::from_raw(row.id),
            from: Participant {
                user_id: row.from_user_id,
                name: row.from_user_name,
                photo_url: row.from_user_photo,
            },
            to: Participant {
                user_id: row.to_user_id,
                name: row.to_user_name,
                photo_url: row.to_user_photo,
            },
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ConnectionRecord {
    id: String,
    user1_id: String,
    user1_name: String,
    user1_photo: Option<String>,
    user2_id: String,
    user2_name: String,
    user2_photo: Option<String>,
    connected_at: DateTime<Utc>,
}

impl From<ConnectionRecord> for Connection {
    fn from(row: ConnectionRecord) -> Self {
        Connection {
            id: PairKey::from_raw(row.id),
            user1: Participant {
                user_id: row.user1_id,
                name: row.user1_name,
                photo_url: row.user1_photo,
            },
            user2: Participant {
                user_id: row.user2_id,
                name: row.user2_name,
                photo_url: row.user2_photo,
            },
            connected_at: row.connected_at,
        }
    }
}

#[derive(FromRow)]
struct GroupRecord {
    id: Uuid,
    name: String,
    description: String,
    category: String,
    interests: Vec<String>,
    members: Vec<String>,
    admins: Vec<String>,
    member_count: i32,
    created_by: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GroupRecord> for Group {
    fn from(row: GroupRecord) -> Self {
        Group {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            interests: row.interests,
            members: row.members,
            admins: row.admins,
            member_count: u32::try_from(row.member_count).unwrap_or(0),
            created_by: row.created_by,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> DatabaseResult<()> {
        run_migrations(&self.pool).await
    }
}

fn image_column(slot: ImageSlot) -> &'static str {
    match slot {
        ImageSlot::Avatar => "photo_url",
        ImageSlot::Cover => "cover_photo_url",
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn create_profile(&self, profile: &NewProfile) -> SocialResult<UserProfile> {
        info!("Creating profile for user: {}", profile.uid);
        let username = profile.username.to_lowercase();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO profiles (uid, email, display_name, username, photo_url,
                                  connections_count, is_profile_complete)
            VALUES ($1, $2, $3, $4, $5, 0, FALSE)
            ON CONFLICT (uid) DO NOTHING
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(&profile.uid)
            .bind(&profile.email)
            .bind(&profile.display_name)
            .bind(&username)
            .bind(profile.photo_url.as_deref())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(record) = record else {
            return Err(SocialError::Conflict(format!(
                "Profile already exists for user {}",
                profile.uid
            )));
        };

        let reserved = sqlx::query(
            r#"
            INSERT INTO username_reservations (username, uid)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&username)
        .bind(&profile.uid)
        .execute(&mut *tx)
        .await?;

        if reserved.rows_affected() == 0 {
            return Err(SocialError::UsernameTaken(username));
        }

        tx.commit().await?;
        Ok(record.into())
    }

    async fn get_profile(&self, uid: &str) -> SocialResult<Option<UserProfile>> {
        let sql = format!("SELECT {} FROM profiles WHERE uid = $1", PROFILE_COLUMNS);
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(UserProfile::from))
    }

    async fn list_profiles(&self) -> SocialResult<Vec<UserProfile>> {
        let sql = format!(
            "SELECT {} FROM profiles ORDER BY created_at, uid",
            PROFILE_COLUMNS
        );
        let records = sqlx::query_as::<_, ProfileRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(UserProfile::from).collect())
    }

    async fn update_profile(&self, uid: &str, update: &ProfileUpdate) -> SocialResult<UserProfile> {
        info!("Updating profile for user: {}", uid);
        let sql = format!(
            r#"
            UPDATE profiles SET
                display_name = COALESCE($2, display_name),
                bio = COALESCE($3, bio),
                branch = COALESCE($4, branch),
                semester = COALESCE($5, semester),
                social_links = COALESCE($6, social_links),
                interests = COALESCE($7, interests),
                societies = COALESCE($8, societies),
                is_profile_complete = COALESCE($9, is_profile_complete),
                updated_at = NOW()
            WHERE uid = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(uid)
            .bind(update.display_name.as_deref())
            .bind(update.bio.as_deref())
            .bind(update.branch.as_deref())
            .bind(update.semester.map(i16::from))
            .bind(update.social_links.clone().map(Json))
            .bind(update.interests.clone())
            .bind(update.societies.clone())
            .bind(update.is_profile_complete)
            .fetch_optional(&self.pool)
            .await?;

        record
            .map(UserProfile::from)
            .ok_or_else(|| SocialError::not_found("profile", uid))
    }

    async fn swap_image(
        &self,
        uid: &str,
        slot: ImageSlot,
        url: &str,
    ) -> SocialResult<Option<String>> {
        let column = image_column(slot);
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT {} FROM profiles WHERE uid = $1 FOR UPDATE", column);
        let previous = sqlx::query_scalar::<_, Option<String>>(&select)
            .bind(uid)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(previous) = previous else {
            return Err(SocialError::not_found("profile", uid));
        };

        let update = format!(
            "UPDATE profiles SET {} = $2, updated_at = NOW() WHERE uid = $1",
            column
        );
        sqlx::query(&update)
            .bind(uid)
            .bind(url)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn append_post(&self, uid: &str, url: &str) -> SocialResult<UserProfile> {
        let sql = format!(
            r#"
            UPDATE profiles
            SET posts = array_append(COALESCE(posts, '{{}}'::TEXT[]), $2), updated_at = NOW()
            WHERE uid = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(uid)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        record
            .map(UserProfile::from)
            .ok_or_else(|| SocialError::not_found("profile", uid))
    }

    async fn remove_post(&self, uid: &str, url: &str) -> SocialResult<bool> {
        let mut tx = self.pool.begin().await?;

        let posts = sqlx::query_scalar::<_, Option<Vec<String>>>(
            "SELECT posts FROM profiles WHERE uid = $1 FOR UPDATE",
        )
        .bind(uid)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(posts) = posts else {
            return Err(SocialError::not_found("profile", uid));
        };
        if !posts.unwrap_or_default().iter().any(|p| p == url) {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE profiles SET posts = array_remove(posts, $2), updated_at = NOW() WHERE uid = $1",
        )
        .bind(uid)
        .bind(url)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find_reservation(&self, username: &str) -> SocialResult<Option<UsernameReservation>> {
        let reservation = sqlx::query_as::<_, UsernameReservation>(
            "SELECT username, uid, created_at FROM username_reservations WHERE username = $1",
        )
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(reservation)
    }

    async fn rename_username(
        &self,
        uid: &str,
        new_username: &str,
    ) -> SocialResult<(String, UserProfile)> {
        info!("Renaming user {} to {}", uid, new_username);
        let new_username = new_username.to_lowercase();
        let mut tx = self.pool.begin().await?;

        let old_username =
            sqlx::query_scalar::<_, String>("SELECT username FROM profiles WHERE uid = $1 FOR UPDATE")
                .bind(uid)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(old_username) = old_username else {
            return Err(SocialError::not_found("profile", uid));
        };

        if old_username != new_username {
            sqlx::query("DELETE FROM username_reservations WHERE uid = $1")
                .bind(uid)
                .execute(&mut *tx)
                .await?;

            let reserved = sqlx::query(
                "INSERT INTO username_reservations (username, uid) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(&new_username)
            .bind(uid)
            .execute(&mut *tx)
            .await?;
            if reserved.rows_affected() == 0 {
                return Err(SocialError::UsernameTaken(new_username));
            }
        }

        let sql = format!(
            "UPDATE profiles SET username = $2, updated_at = NOW() WHERE uid = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(uid)
            .bind(&new_username)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((old_username, record.into()))
    }
}

#[async_trait]
impl ConnectionStore for PgStore {
    async fn get_request(&self, id: &PairKey) -> SocialResult<Option<ConnectionRequest>> {
        let sql = format!(
            "SELECT {} FROM connection_requests WHERE id = $1",
            REQUEST_COLUMNS
        );
        let record = sqlx::query_as::<_, RequestRecord>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(ConnectionRequest::try_from).transpose()?)
    }

    async fn insert_request(&self, request: &ConnectionRequest) -> SocialResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO connection_requests
                (id, from_user_id, from_user_name, from_user_photo,
                 to_user_id, to_user_name, to_user_photo, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(request.id.as_str())
        .bind(&request.from.user_id)
        .bind(&request.from.name)
        .bind(request.from.photo_url.as_deref())
        .bind(&request.to.user_id)
        .bind(&request.to.name)
        .bind(request.to.photo_url.as_deref())
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_request(&self, id: &PairKey) -> SocialResult<bool> {
        let result = sqlx::query("DELETE FROM connection_requests WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn requests_to(&self, user_id: &str) -> SocialResult<Vec<ConnectionRequest>> {
        let sql = format!(
            r#"
            SELECT {} FROM connection_requests
            WHERE to_user_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            "#,
            REQUEST_COLUMNS
        );
        let records = sqlx::query_as::<_, RequestRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records
            .into_iter()
            .map(ConnectionRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn requests_from(&self, user_id: &str) -> SocialResult<Vec<ConnectionRequest>> {
        let sql = format!(
            r#"
            SELECT {} FROM connection_requests
            WHERE from_user_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            "#,
            REQUEST_COLUMNS
        );
        let records = sqlx::query_as::<_, RequestRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records
            .into_iter()
            .map(ConnectionRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_connection(&self, id: &PairKey) -> SocialResult<Option<Connection>> {
        let sql = format!(
            "SELECT {} FROM connections WHERE id = $1",
            CONNECTION_COLUMNS
        );
        let record = sqlx::query_as::<_, ConnectionRecord>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Connection::from))
    }

    async fn connections_of(&self, user_id: &str) -> SocialResult<Vec<Connection>> {
        let sql = format!(
            r#"
            SELECT {} FROM connections
            WHERE user1_id = $1 OR user2_id = $1
            ORDER BY connected_at DESC
            "#,
            CONNECTION_COLUMNS
        );
        let records = sqlx::query_as::<_, ConnectionRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Connection::from).collect())
    }

    async fn commit_acceptance(&self, connection: &Connection) -> SocialResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM connection_requests
            WHERE id = $1 AND status = 'pending' AND from_user_id = $2 AND to_user_id = $3
            "#,
        )
        .bind(connection.id.as_str())
        .bind(&connection.user1.user_id)
        .bind(&connection.user2.user_id)
        .execute(&mut *tx)
        .await?;
        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO connections
                (id, user1_id, user1_name, user1_photo, user2_id, user2_name, user2_photo, connected_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(connection.id.as_str())
        .bind(&connection.user1.user_id)
        .bind(&connection.user1.name)
        .bind(connection.user1.photo_url.as_deref())
        .bind(&connection.user2.user_id)
        .bind(&connection.user2.name)
        .bind(connection.user2.photo_url.as_deref())
        .bind(connection.connected_at)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(SocialError::AlreadyConnected);
        }

        sqlx::query(
            r#"
            UPDATE profiles
            SET connections_count = GREATEST(COALESCE(connections_count, 0), 0) + 1,
                updated_at = NOW()
            WHERE uid = ANY($1)
            "#,
        )
        .bind(vec![
            connection.user1.user_id.clone(),
            connection.user2.user_id.clone(),
        ])
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn commit_removal(&self, id: &PairKey) -> SocialResult<bool> {
        let mut tx = self.pool.begin().await?;

        let members = sqlx::query_as::<_, (String, String)>(
            "DELETE FROM connections WHERE id = $1 RETURNING user1_id, user2_id",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((user1, user2)) = members else {
            return Ok(false);
        };

        sqlx::query(
            r#"
            UPDATE profiles
            SET connections_count = GREATEST(COALESCE(connections_count, 0) - 1, 0),
                updated_at = NOW()
            WHERE uid = ANY($1)
            "#,
        )
        .bind(vec![user1, user2])
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM connection_requests WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl GroupStore for PgStore {
    async fn insert_group(&self, group: &Group) -> SocialResult<()> {
        info!("Creating group {} ({})", group.name, group.id);
        sqlx::query(
            r#"
            INSERT INTO groups
                (id, name, description, category, interests, members, admins,
                 member_count, created_by, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.category)
        .bind(&group.interests)
        .bind(&group.members)
        .bind(&group.admins)
        .bind(i32::try_from(group.member_count).unwrap_or(i32::MAX))
        .bind(&group.created_by)
        .bind(group.image_url.as_deref())
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::query)
        .map_err(|e| {
            if e.is_unique_violation() {
                SocialError::Conflict(format!("Group already exists: {}", group.id))
            } else {
                SocialError::Store(e)
            }
        })?;
        Ok(())
    }

    async fn get_group(&self, id: Uuid) -> SocialResult<Option<Group>> {
        let sql = format!("SELECT {} FROM groups WHERE id = $1", GROUP_COLUMNS);
        let record = sqlx::query_as::<_, GroupRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Group::from))
    }

    async fn list_groups(&self) -> SocialResult<Vec<Group>> {
        let sql = format!(
            "SELECT {} FROM groups ORDER BY created_at DESC, id DESC",
            GROUP_COLUMNS
        );
        let records = sqlx::query_as::<_, GroupRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Group::from).collect())
    }

    async fn groups_with_member(&self, user_id: &str) -> SocialResult<Vec<Group>> {
        let sql = format!(
            "SELECT {} FROM groups WHERE $1 = ANY(members) ORDER BY created_at DESC, id DESC",
            GROUP_COLUMNS
        );
        let records = sqlx::query_as::<_, GroupRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Group::from).collect())
    }

    async fn add_member(&self, id: Uuid, user_id: &str) -> SocialResult<Option<Group>> {
        let sql = format!(
            r#"
            UPDATE groups SET
                members = CASE WHEN $2 = ANY(members) THEN members
                               ELSE array_append(members, $2) END,
                member_count = cardinality(CASE WHEN $2 = ANY(members) THEN members
                                                ELSE array_append(members, $2) END),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            GROUP_COLUMNS
        );
        let record = sqlx::query_as::<_, GroupRecord>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Group::from))
    }

    async fn remove_member(&self, id: Uuid, user_id: &str) -> SocialResult<Option<Group>> {
        let sql = format!(
            r#"
            UPDATE groups SET
                members = array_remove(members, $2),
                admins = array_remove(admins, $2),
                member_count = cardinality(array_remove(members, $2)),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            GROUP_COLUMNS
        );
        let record = sqlx::query_as::<_, GroupRecord>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Group::from))
    }

    async fn reconcile_member_count(&self, id: Uuid) -> SocialResult<Option<(u32, u32)>> {
        let mut tx = self.pool.begin().await?;

        let before = sqlx::query_scalar::<_, i32>(
            "SELECT member_count FROM groups WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(before) = before else {
            return Ok(None);
        };

        let after = sqlx::query_scalar::<_, i32>(
            "UPDATE groups SET member_count = cardinality(members) WHERE id = $1 RETURNING member_count",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((
            u32::try_from(before).unwrap_or(0),
            u32::try_from(after).unwrap_or(0),
        )))
    }
}
