use crate::{
    error::{AppError, AppResult},
    models::{
        channel, server, server_member, Category, Channel, ChannelModel, Server, ServerMember,
        ServerModel, UserModel,
    },
    services::server_query::ServerCriteria,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;

/// A server as returned by the listing, with its channels and the optional
/// member count.
#[derive(Debug, Clone)]
pub struct ServerListing {
    pub server: ServerModel,
    pub channels: Vec<ChannelModel>,
    pub num_members: Option<i64>,
}

#[derive(Debug, FromQueryResult)]
struct MemberCount {
    server_id: i32,
    num_members: i64,
}

pub struct ServerService {
    db: DatabaseConnection,
}

impl ServerService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Run a composed listing query.
    pub async fn list(&self, criteria: &ServerCriteria) -> AppResult<Vec<ServerListing>> {
        let servers = criteria.select().all(&self.db).await?;

        let ids: Vec<i32> = servers.iter().map(|s| s.id).collect();
        let mut channels = self.channels_for(&ids).await?;
        let counts = if criteria.with_member_count {
            Some(self.member_counts(&ids).await?)
        } else {
            None
        };

        tracing::debug!(
            count = servers.len(),
            with_member_count = criteria.with_member_count,
            "Listed servers"
        );

        Ok(servers
            .into_iter()
            .map(|server| ServerListing {
                channels: channels.remove(&server.id).unwrap_or_default(),
                num_members: counts
                    .as_ref()
                    .map(|c| c.get(&server.id).copied().unwrap_or(0)),
                server,
            })
            .collect())
    }

    async fn channels_for(&self, server_ids: &[i32]) -> AppResult<HashMap<i32, Vec<ChannelModel>>> {
        if server_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let channels = Channel::find()
            .filter(channel::Column::ServerId.is_in(server_ids.iter().copied()))
            .order_by_asc(channel::Column::Id)
            .all(&self.db)
            .await?;

        let mut map: HashMap<i32, Vec<ChannelModel>> = HashMap::new();
        for ch in channels {
            map.entry(ch.server_id).or_default().push(ch);
        }
        Ok(map)
    }

    async fn member_counts(&self, server_ids: &[i32]) -> AppResult<HashMap<i32, i64>> {
        if server_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = ServerMember::find()
            .select_only()
            .column(server_member::Column::ServerId)
            .column_as(
                Expr::col(server_member::Column::UserId).count_distinct(),
                "num_members",
            )
            .filter(server_member::Column::ServerId.is_in(server_ids.iter().copied()))
            .group_by(server_member::Column::ServerId)
            .into_model::<MemberCount>()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.server_id, r.num_members))
            .collect())
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<ServerModel> {
        Server::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn create(
        &self,
        owner_id: i32,
        category_id: i32,
        name: &str,
        description: Option<String>,
    ) -> AppResult<ServerModel> {
        Category::find_by_id(category_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::Validation("Category not found".to_string()))?;

        let new_server = server::ActiveModel {
            name: Set(name.to_string()),
            owner_id: Set(owner_id),
            category_id: Set(category_id),
            description: Set(description),
            ..Default::default()
        };

        let server = new_server.insert(&self.db).await?;
        tracing::info!(server_id = server.id, owner_id, "Server created");
        Ok(server)
    }

    /// Delete a server. Only its owner or an admin may do so.
    pub async fn delete(&self, id: i32, actor: &UserModel) -> AppResult<()> {
        let server = self.get_by_id(id).await?;
        if server.owner_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        Server::delete_by_id(server.id).exec(&self.db).await?;
        tracing::info!(server_id = id, actor_id = actor.id, "Server deleted");
        Ok(())
    }

    /// Add `user_id` to the server's members. Joining twice is a no-op.
    pub async fn join(&self, server_id: i32, user_id: i32) -> AppResult<()> {
        self.get_by_id(server_id).await?;

        let existing = ServerMember::find_by_id((server_id, user_id))
            .one(&self.db)
            .await?;
        if existing.is_none() {
            server_member::ActiveModel {
                server_id: Set(server_id),
                user_id: Set(user_id),
            }
            .insert(&self.db)
            .await?;
            tracing::info!(server_id, user_id, "Member joined server");
        }
        Ok(())
    }

    /// Remove `user_id` from the server's members. Leaving twice is a no-op.
    pub async fn leave(&self, server_id: i32, user_id: i32) -> AppResult<()> {
        self.get_by_id(server_id).await?;

        let result = ServerMember::delete_many()
            .filter(server_member::Column::ServerId.eq(server_id))
            .filter(server_member::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            tracing::info!(server_id, user_id, "Member left server");
        }
        Ok(())
    }
}
