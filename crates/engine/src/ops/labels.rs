use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    BandKind, EngineError, Folder, LabelOrder, Notification, Outcome, ResultEngine, Role,
    label_orders,
};

use super::{Engine, with_tx};

impl Engine {
    /// Place a print label order for one of the label price bands.
    ///
    /// `weight_from`, `weight_to` and `price_minor` must match a configured
    /// label band. Every admin is told about the new order.
    pub async fn create_label_order(
        &self,
        account_id: i64,
        weight_from: i64,
        weight_to: i64,
        price_minor: i64,
        quantity: i64,
        bytes: &[u8],
        extension: &str,
    ) -> ResultEngine<Outcome<LabelOrder>> {
        let account = self.account(account_id).await?;
        if account.role != Role::Client {
            return Err(EngineError::Forbidden(
                "only clients can order labels".to_string(),
            ));
        }
        if quantity <= 0 {
            return Err(EngineError::InvalidInput(
                "quantity must be positive".to_string(),
            ));
        }
        let band = self
            .price_bands(BandKind::Label)
            .await?
            .into_iter()
            .find(|b| b.weight_from == weight_from && b.weight_to == weight_to)
            .ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "no label price for {weight_from}-{weight_to} g"
                ))
            })?;
        if band.price_minor != price_minor {
            return Err(EngineError::InvalidAmount(
                "price does not match the current label price".to_string(),
            ));
        }

        let input_file = self
            .attachments
            .save(Folder::Labels, bytes, extension)
            .await?;
        let inserted = with_tx!(self, |db_tx| {
            label_orders::ActiveModel {
                id: ActiveValue::NotSet,
                account_id: ActiveValue::Set(account_id),
                weight_from: ActiveValue::Set(weight_from),
                weight_to: ActiveValue::Set(weight_to),
                price_minor: ActiveValue::Set(price_minor),
                quantity: ActiveValue::Set(quantity),
                input_file: ActiveValue::Set(input_file.clone()),
                output_file: ActiveValue::Set(None),
                delivered: ActiveValue::Set(false),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await
            .map_err(EngineError::from)
        });
        let model = match inserted {
            Ok(model) => model,
            Err(err) => {
                self.attachments.discard(Folder::Labels, &input_file).await;
                return Err(err);
            }
        };
        tracing::info!(account_id, label_order_id = model.id, quantity, "label order placed");

        let notifications = self
            .admin_emails()
            .await?
            .into_iter()
            .map(|admin| {
                Notification::new(
                    admin,
                    "Print label order",
                    format!(
                        "A print label order ({}) has been placed by {}.",
                        model.id, account.email
                    ),
                )
            })
            .collect();
        let warning = self.notify_all(notifications).await;

        Ok(Outcome {
            value: LabelOrder::from(model),
            warning,
        })
    }

    pub async fn label_orders_for_account(&self, account_id: i64) -> ResultEngine<Vec<LabelOrder>> {
        let models = label_orders::Entity::find()
            .filter(label_orders::Column::AccountId.eq(account_id))
            .order_by_desc(label_orders::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(LabelOrder::from).collect())
    }

    /// Label orders of every account; delivered ones only when asked.
    pub async fn all_label_orders(&self, include_delivered: bool) -> ResultEngine<Vec<LabelOrder>> {
        let mut query = label_orders::Entity::find();
        if !include_delivered {
            query = query.filter(label_orders::Column::Delivered.eq(false));
        }
        let models = query
            .order_by_desc(label_orders::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(LabelOrder::from).collect())
    }

    /// Attach the printed labels and mark the order delivered.
    pub async fn deliver_label_order(
        &self,
        label_order_id: i64,
        bytes: &[u8],
        extension: &str,
    ) -> ResultEngine<Outcome<LabelOrder>> {
        let order = self.require_label_order(label_order_id).await?;
        if order.delivered {
            return Err(EngineError::InvalidInput(format!(
                "label order {label_order_id} was already delivered"
            )));
        }

        let output_file = self
            .attachments
            .save(Folder::Labels, bytes, extension)
            .await?;
        let updated = label_orders::ActiveModel {
            id: ActiveValue::Set(order.id),
            output_file: ActiveValue::Set(Some(output_file.clone())),
            delivered: ActiveValue::Set(true),
            ..Default::default()
        }
        .update(&self.database)
        .await;
        let model = match updated {
            Ok(model) => model,
            Err(err) => {
                self.attachments.discard(Folder::Labels, &output_file).await;
                return Err(err.into());
            }
        };
        tracing::info!(label_order_id, "label order delivered");

        let owner = self.account(model.account_id).await?;
        let warning = self
            .notify(Notification::new(
                owner.email,
                "Print label order",
                format!("Your print label order {label_order_id} is ready to download."),
            ))
            .await;
        Ok(Outcome {
            value: LabelOrder::from(model),
            warning,
        })
    }

    /// Input (`output == false`) or printed file of a label order. Clients
    /// may only read their own.
    pub async fn label_order_file(
        &self,
        label_order_id: i64,
        viewer_id: i64,
        output: bool,
    ) -> ResultEngine<Vec<u8>> {
        let order = self.require_label_order(label_order_id).await?;
        let viewer = self.account(viewer_id).await?;
        if !viewer.is_admin() && order.account_id != viewer_id {
            return Err(EngineError::Forbidden(
                "label order belongs to another account".to_string(),
            ));
        }
        let name = if output {
            order
                .output_file
                .ok_or_else(|| EngineError::KeyNotFound("label output".to_string()))?
        } else {
            order.input_file
        };
        self.attachments.read(Folder::Labels, &name).await
    }

    async fn require_label_order(&self, label_order_id: i64) -> ResultEngine<LabelOrder> {
        label_orders::Entity::find_by_id(label_order_id)
            .one(&self.database)
            .await?
            .map(LabelOrder::from)
            .ok_or_else(|| EngineError::KeyNotFound("label order not exists".to_string()))
    }
}
