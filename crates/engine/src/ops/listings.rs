use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Folder, Listing, ListingItem, ListingRow, ListingStatus, ListingWithOwner,
    Notification, Outcome, ResultEngine, Role, accounts,
    csv_rows::{parse_rows, write_rows},
    listings, products,
};

use super::{Engine, normalize_optional_text, with_tx};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for ListingStatus {
    fn from(value: ReviewDecision) -> Self {
        match value {
            ReviewDecision::Approved => ListingStatus::Approved,
            ReviewDecision::Rejected => ListingStatus::Rejected,
        }
    }
}

impl Engine {
    /// Upload a product listing CSV for admin approval.
    ///
    /// The whole file is validated before it is stored.
    pub async fn submit_listing(&self, account_id: i64, csv: &[u8]) -> ResultEngine<Listing> {
        let account = self.account(account_id).await?;
        if account.role != Role::Client {
            return Err(EngineError::Forbidden(
                "only clients can submit listings".to_string(),
            ));
        }
        let items = parse_rows::<ListingRow>(csv)?;
        ensure_unique_skus(&items)?;

        let file = self.attachments.save(Folder::Listings, csv, "csv").await?;
        let inserted = with_tx!(self, |db_tx| {
            listings::ActiveModel {
                id: ActiveValue::NotSet,
                account_id: ActiveValue::Set(account_id),
                csv_file: ActiveValue::Set(file.clone()),
                status: ActiveValue::Set(ListingStatus::Pending.as_str().to_string()),
                remarks: ActiveValue::Set(None),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await
            .map_err(EngineError::from)
        });
        let model = match inserted {
            Ok(model) => model,
            Err(err) => {
                self.attachments.discard(Folder::Listings, &file).await;
                return Err(err);
            }
        };

        tracing::info!(
            account_id,
            listing_id = model.id,
            rows = items.len(),
            "listing submitted"
        );
        Listing::try_from(model)
    }

    /// Submit a single new product as a one-row listing.
    pub async fn propose_product(
        &self,
        account_id: i64,
        item: &ListingItem,
    ) -> ResultEngine<Listing> {
        let taken = products::Entity::find()
            .filter(products::Column::Sku.eq(item.sku.trim()))
            .one(&self.database)
            .await?
            .is_some();
        if taken {
            return Err(EngineError::ExistingKey(item.sku.trim().to_string()));
        }
        self.submit_single_row(account_id, item).await
    }

    /// Ask for more stock of an owned product. Goes through approval like any
    /// other listing.
    pub async fn request_restock(
        &self,
        account_id: i64,
        sku: &str,
        quantity: i64,
    ) -> ResultEngine<Listing> {
        let product = self.owned_product(account_id, sku).await?;
        let item = ListingItem {
            name: product.title,
            sku: product.sku,
            description: product.description,
            quantity,
            price_minor: product.price_minor,
            weight_grams: product.weight_grams,
        };
        self.submit_single_row(account_id, &item).await
    }

    /// Listings of one account, newest first.
    pub async fn listings_for_account(&self, account_id: i64) -> ResultEngine<Vec<Listing>> {
        let models = listings::Entity::find()
            .filter(listings::Column::AccountId.eq(account_id))
            .order_by_desc(listings::Column::CreatedAt)
            .order_by_desc(listings::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(Listing::try_from).collect()
    }

    /// Every listing with its owner, optionally restricted to one status.
    pub async fn all_listings(
        &self,
        status: Option<ListingStatus>,
    ) -> ResultEngine<Vec<ListingWithOwner>> {
        let mut query = listings::Entity::find().find_also_related(accounts::Entity);
        if let Some(status) = status {
            query = query.filter(listings::Column::Status.eq(status.as_str()));
        }
        let rows = query
            .order_by_desc(listings::Column::CreatedAt)
            .order_by_desc(listings::Column::Id)
            .all(&self.database)
            .await?;

        rows.into_iter()
            .map(|(listing, owner)| {
                let owner = owner
                    .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))?;
                Ok(ListingWithOwner {
                    listing: Listing::try_from(listing)?,
                    owner_name: format!("{} {}", owner.first_name, owner.last_name),
                    owner_email: owner.email,
                })
            })
            .collect()
    }

    /// Raw CSV of a listing. Clients may only read their own.
    pub async fn listing_file(&self, listing_id: i64, viewer_id: i64) -> ResultEngine<Vec<u8>> {
        let listing = self.require_listing(listing_id).await?;
        let viewer = self.account(viewer_id).await?;
        if !viewer.is_admin() && listing.account_id != viewer_id {
            return Err(EngineError::Forbidden(
                "listing belongs to another account".to_string(),
            ));
        }
        self.attachments
            .read(Folder::Listings, &listing.csv_file)
            .await
    }

    /// Approve or reject a pending listing.
    ///
    /// Approval creates or restocks every product of the file in the same
    /// transaction that flips the status.
    pub async fn review_listing(
        &self,
        listing_id: i64,
        decision: ReviewDecision,
        remarks: Option<&str>,
    ) -> ResultEngine<Outcome<Listing>> {
        let listing = self.require_listing(listing_id).await?;
        let items = match decision {
            ReviewDecision::Approved => {
                let csv = self
                    .attachments
                    .read(Folder::Listings, &listing.csv_file)
                    .await?;
                parse_rows::<ListingRow>(&csv)?
            }
            ReviewDecision::Rejected => Vec::new(),
        };
        let status = ListingStatus::from(decision);
        let remarks = normalize_optional_text(remarks);

        let model = with_tx!(self, |db_tx| {
            let current = listings::Entity::find_by_id(listing_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("listing not exists".to_string()))?;
            if current.status != ListingStatus::Pending.as_str() {
                return Err(EngineError::InvalidInput(format!(
                    "listing {listing_id} was already reviewed"
                )));
            }

            for item in &items {
                upsert_product(&db_tx, current.account_id, item).await?;
            }

            let model = listings::ActiveModel {
                id: ActiveValue::Set(listing_id),
                status: ActiveValue::Set(status.as_str().to_string()),
                remarks: ActiveValue::Set(remarks.clone()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok::<_, EngineError>(model)
        })?;
        tracing::info!(listing_id, status = status.as_str(), products = items.len(), "listing reviewed");

        let owner = self.account(model.account_id).await?;
        let body = match &model.remarks {
            Some(remarks) => format!(
                "Your listing {listing_id} has been {}. Remarks: {remarks}",
                status.as_str()
            ),
            None => format!("Your listing {listing_id} has been {}.", status.as_str()),
        };
        let warning = self
            .notify(Notification::new(owner.email, "Listing review", body))
            .await;

        Ok(Outcome {
            value: Listing::try_from(model)?,
            warning,
        })
    }

    async fn submit_single_row(&self, account_id: i64, item: &ListingItem) -> ResultEngine<Listing> {
        let csv = write_rows(&[ListingRow::from(item)])?;
        self.submit_listing(account_id, &csv).await
    }

    async fn require_listing(&self, listing_id: i64) -> ResultEngine<Listing> {
        let model = listings::Entity::find_by_id(listing_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("listing not exists".to_string()))?;
        Listing::try_from(model)
    }
}

async fn upsert_product(
    db_tx: &DatabaseTransaction,
    account_id: i64,
    item: &ListingItem,
) -> ResultEngine<()> {
    let existing = products::Entity::find()
        .filter(products::Column::Sku.eq(item.sku.as_str()))
        .one(db_tx)
        .await?;

    match existing {
        Some(product) if product.account_id != account_id => {
            Err(EngineError::ExistingKey(item.sku.clone()))
        }
        Some(product) => {
            let quantity = product.quantity.checked_add(item.quantity).ok_or_else(|| {
                EngineError::InvalidInput(format!("stock of {} is out of range", item.sku))
            })?;
            products::ActiveModel {
                id: ActiveValue::Set(product.id),
                title: ActiveValue::Set(item.name.clone()),
                description: ActiveValue::Set(item.description.clone().or(product.description)),
                quantity: ActiveValue::Set(quantity),
                price_minor: ActiveValue::Set(item.price_minor.or(product.price_minor)),
                weight_grams: ActiveValue::Set(item.weight_grams),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .update(db_tx)
            .await?;
            Ok(())
        }
        None => {
            products::ActiveModel {
                id: ActiveValue::NotSet,
                sku: ActiveValue::Set(item.sku.clone()),
                title: ActiveValue::Set(item.name.clone()),
                description: ActiveValue::Set(item.description.clone()),
                quantity: ActiveValue::Set(item.quantity),
                price_minor: ActiveValue::Set(item.price_minor),
                weight_grams: ActiveValue::Set(item.weight_grams),
                location: ActiveValue::Set(None),
                packaging: ActiveValue::Set(None),
                image: ActiveValue::Set(None),
                account_id: ActiveValue::Set(account_id),
                updated_at: ActiveValue::Set(Utc::now()),
            }
            .insert(db_tx)
            .await?;
            Ok(())
        }
    }
}

fn ensure_unique_skus(items: &[ListingItem]) -> ResultEngine<()> {
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item.sku.as_str()) {
            return Err(EngineError::InvalidCsv(format!(
                "duplicate SKU {}",
                item.sku
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str) -> ListingItem {
        ListingItem {
            name: "Mug".to_string(),
            sku: sku.to_string(),
            description: None,
            quantity: 1,
            price_minor: None,
            weight_grams: 100,
        }
    }

    #[test]
    fn duplicate_skus_are_rejected() {
        assert!(ensure_unique_skus(&[item("A"), item("B")]).is_ok());
        assert_eq!(
            ensure_unique_skus(&[item("A"), item("B"), item("A")]),
            Err(EngineError::InvalidCsv("duplicate SKU A".to_string()))
        );
    }
}
