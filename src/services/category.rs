use crate::{
    error::{AppError, AppResult},
    models::{category, Category, CategoryModel},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

pub struct CategoryService {
    db: DatabaseConnection,
}

impl CategoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<CategoryModel>> {
        let categories = Category::find()
            .order_by_asc(category::Column::Id)
            .all(&self.db)
            .await?;
        Ok(categories)
    }

    pub async fn create(&self, name: &str, description: Option<String>) -> AppResult<CategoryModel> {
        let new_category = category::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description),
            ..Default::default()
        };
        let category = new_category.insert(&self.db).await?;
        tracing::info!(category_id = category.id, "Category created");
        Ok(category)
    }

    /// Delete a category together with its servers and their channels.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = Category::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }
}
