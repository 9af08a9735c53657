use chrono::Utc;
use sea_orm::{ActiveValue, PaginatorTrait, QueryFilter, QueryOrder, prelude::*};

use crate::{
    AdminProductUpdateCmd, EngineError, Folder, Product, ResultEngine, products,
    products::normalize_sku,
};

use super::{Engine, Page, check_page_size, normalize_optional_text, normalize_required_text};

impl Engine {
    pub async fn product(&self, product_id: i64) -> ResultEngine<Product> {
        products::Entity::find_by_id(product_id)
            .one(&self.database)
            .await?
            .map(Product::from)
            .ok_or_else(|| EngineError::KeyNotFound("product not exists".to_string()))
    }

    /// Product `sku` if it belongs to `account_id`.
    pub async fn owned_product(&self, account_id: i64, sku: &str) -> ResultEngine<Product> {
        let sku = normalize_sku(sku)?;
        products::Entity::find()
            .filter(products::Column::Sku.eq(sku.as_str()))
            .filter(products::Column::AccountId.eq(account_id))
            .one(&self.database)
            .await?
            .map(Product::from)
            .ok_or(EngineError::KeyNotFound(sku))
    }

    /// Products of an account, most recently changed first.
    pub async fn products_page(
        &self,
        account_id: i64,
        page_index: u64,
        page_size: u64,
    ) -> ResultEngine<Page<Product>> {
        check_page_size(page_size)?;
        let paginator = products::Entity::find()
            .filter(products::Column::AccountId.eq(account_id))
            .order_by_desc(products::Column::UpdatedAt)
            .order_by_desc(products::Column::Id)
            .paginate(&self.database, page_size);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page_index)
            .await?
            .into_iter()
            .map(Product::from)
            .collect();
        Ok(Page { items, total })
    }

    /// Client-side edit of the catalogue text of an owned product.
    pub async fn update_product_details(
        &self,
        account_id: i64,
        sku: &str,
        title: &str,
        description: Option<&str>,
    ) -> ResultEngine<Product> {
        let product = self.owned_product(account_id, sku).await?;
        let title = normalize_required_text(title, "title")?;

        let model = products::ActiveModel {
            id: ActiveValue::Set(product.id),
            title: ActiveValue::Set(title),
            description: ActiveValue::Set(normalize_optional_text(description)),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.database)
        .await?;
        Ok(Product::from(model))
    }

    /// Admin edit of the warehouse fields.
    pub async fn admin_update_product(
        &self,
        product_id: i64,
        cmd: &AdminProductUpdateCmd,
    ) -> ResultEngine<Product> {
        let product = self.product(product_id).await?;
        if matches!(cmd.weight_grams, Some(weight) if weight <= 0) {
            return Err(EngineError::InvalidInput(
                "weight must be positive".to_string(),
            ));
        }
        if matches!(cmd.quantity, Some(quantity) if quantity < 0) {
            return Err(EngineError::InvalidInput(
                "quantity must not be negative".to_string(),
            ));
        }

        let mut active = products::ActiveModel {
            id: ActiveValue::Set(product.id),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };
        if let Some(packaging) = &cmd.packaging {
            active.packaging = ActiveValue::Set(normalize_optional_text(Some(packaging)));
        }
        if let Some(location) = &cmd.location {
            active.location = ActiveValue::Set(normalize_optional_text(Some(location)));
        }
        if let Some(weight) = cmd.weight_grams {
            active.weight_grams = ActiveValue::Set(weight);
        }
        if let Some(quantity) = cmd.quantity {
            active.quantity = ActiveValue::Set(quantity);
        }

        let model = active.update(&self.database).await?;
        tracing::info!(product_id, sku = %model.sku, "product updated by admin");
        Ok(Product::from(model))
    }

    /// Replace the picture of a product. Clients may only change their own
    /// products.
    pub async fn set_product_image(
        &self,
        account_id: i64,
        product_id: i64,
        bytes: &[u8],
        extension: &str,
    ) -> ResultEngine<Product> {
        let product = self.product(product_id).await?;
        let account = self.account(account_id).await?;
        if !account.is_admin() && product.account_id != account_id {
            return Err(EngineError::Forbidden(
                "product belongs to another account".to_string(),
            ));
        }

        let name = self
            .attachments
            .save(Folder::Products, bytes, extension)
            .await?;
        let updated = products::ActiveModel {
            id: ActiveValue::Set(product.id),
            image: ActiveValue::Set(Some(name.clone())),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.database)
        .await;
        let model = match updated {
            Ok(model) => model,
            Err(err) => {
                self.attachments.discard(Folder::Products, &name).await;
                return Err(err.into());
            }
        };

        if let Some(previous) = product.image {
            self.attachments.discard(Folder::Products, &previous).await;
        }
        Ok(Product::from(model))
    }
}
