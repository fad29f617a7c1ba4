use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Always stored lower-cased, see [`ChannelName`].
    pub name: String,
    pub owner_id: i32,
    pub topic: String,
    pub server_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::server::Entity",
        from = "Column::ServerId",
        to = "super::server::Column::Id",
        on_delete = "Cascade"
    )]
    Server,
}

impl Related<super::server::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// A channel name in its stored form.
///
/// Every write path builds the `name` column from this type, so a channel is
/// never persisted with upper-case characters regardless of what the client
/// sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(raw: &str) -> Self {
        Self(raw.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_case_is_lowered() {
        assert_eq!(ChannelName::new("General-Chat").as_str(), "general-chat");
    }

    #[test]
    fn already_lower_is_unchanged() {
        assert_eq!(ChannelName::new("announcements").into_inner(), "announcements");
    }

    #[test]
    fn non_ascii_is_lowered() {
        assert_eq!(ChannelName::new("ÜBER Café").as_str(), "über café");
    }
}
