use crate::{
    error::{AppError, AppResult},
    models::{channel, Channel, ChannelModel, ChannelName, Server, UserModel},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

pub struct ChannelService {
    db: DatabaseConnection,
}

impl ChannelService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<ChannelModel> {
        Channel::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Create a channel in `server_id`. The actor must own the server or be an
    /// admin, and becomes the channel's owner.
    pub async fn create(
        &self,
        server_id: i32,
        actor: &UserModel,
        name: ChannelName,
        topic: &str,
    ) -> AppResult<ChannelModel> {
        let server = Server::find_by_id(server_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        if server.owner_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let new_channel = channel::ActiveModel {
            name: Set(name.into_inner()),
            owner_id: Set(actor.id),
            topic: Set(topic.to_string()),
            server_id: Set(server.id),
            ..Default::default()
        };

        let channel = new_channel.insert(&self.db).await?;
        tracing::info!(channel_id = channel.id, server_id, "Channel created");
        Ok(channel)
    }

    pub async fn update(
        &self,
        id: i32,
        actor: &UserModel,
        name: Option<ChannelName>,
        topic: Option<String>,
    ) -> AppResult<ChannelModel> {
        let existing = self.get_by_id(id).await?;
        self.ensure_can_manage(&existing, actor).await?;

        let mut active: channel::ActiveModel = existing.into();
        if let Some(name) = name {
            active.name = Set(name.into_inner());
        }
        if let Some(topic) = topic {
            active.topic = Set(topic);
        }

        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, id: i32, actor: &UserModel) -> AppResult<()> {
        let existing = self.get_by_id(id).await?;
        self.ensure_can_manage(&existing, actor).await?;

        Channel::delete_by_id(existing.id).exec(&self.db).await?;
        tracing::info!(channel_id = id, actor_id = actor.id, "Channel deleted");
        Ok(())
    }

    /// Channel owner, owner of the parent server, or an admin.
    async fn ensure_can_manage(&self, channel: &ChannelModel, actor: &UserModel) -> AppResult<()> {
        if channel.owner_id == actor.id || actor.is_admin() {
            return Ok(());
        }

        let server_owner = Server::find_by_id(channel.server_id)
            .one(&self.db)
            .await?
            .map(|s| s.owner_id);
        if server_owner == Some(actor.id) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}
