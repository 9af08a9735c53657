use sea_orm::{ActiveValue, QueryFilter, QueryOrder, prelude::*};
use serde::Serialize;

use crate::{
    Account, EngineError, Folder, ListingRemovalCmd, Notification, Outcome, ResultEngine, Role,
    accounts,
};

use super::{Engine, normalize_required_text};

/// Account data shown on the profile page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountProfile {
    pub account: Account,
    /// Current ledger balance; admins have no ledger.
    pub balance_minor: Option<i64>,
}

impl Engine {
    pub async fn account(&self, account_id: i64) -> ResultEngine<Account> {
        let model = accounts::Entity::find_by_id(account_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))?;
        Account::try_from(model)
    }

    pub async fn account_by_email(&self, email: &str) -> ResultEngine<Account> {
        Account::try_from(self.account_model_by_email(email).await?)
    }

    pub async fn profile(&self, email: &str) -> ResultEngine<AccountProfile> {
        let account = self.account_by_email(email).await?;
        let balance_minor = if account.is_admin() {
            None
        } else {
            Some(self.balance(account.id).await?.cents())
        };
        Ok(AccountProfile {
            account,
            balance_minor,
        })
    }

    /// Clients and customers, oldest first.
    pub async fn list_accounts(&self) -> ResultEngine<Vec<Account>> {
        let models = accounts::Entity::find()
            .filter(
                accounts::Column::Role.is_in([Role::Client.as_str(), Role::Customer.as_str()]),
            )
            .order_by_asc(accounts::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(Account::try_from).collect()
    }

    pub async fn update_account_flags(
        &self,
        account_id: i64,
        is_vat: bool,
        can_upload_order: bool,
    ) -> ResultEngine<Account> {
        let account = self.account(account_id).await?;
        if account.is_admin() {
            return Err(EngineError::InvalidInput(
                "admin accounts have no client flags".to_string(),
            ));
        }
        let model = accounts::ActiveModel {
            id: ActiveValue::Set(account_id),
            is_vat: ActiveValue::Set(is_vat),
            can_upload_order: ActiveValue::Set(can_upload_order),
            ..Default::default()
        }
        .update(&self.database)
        .await?;
        tracing::info!(account_id, is_vat, can_upload_order, "account flags updated");
        Account::try_from(model)
    }

    /// Store a new avatar image and drop the previous one.
    pub async fn set_avatar(
        &self,
        account_id: i64,
        bytes: &[u8],
        extension: &str,
    ) -> ResultEngine<Account> {
        let previous = self.account(account_id).await?.avatar;
        let name = self
            .attachments
            .save(Folder::Avatars, bytes, extension)
            .await?;

        let updated = accounts::ActiveModel {
            id: ActiveValue::Set(account_id),
            avatar: ActiveValue::Set(Some(name.clone())),
            ..Default::default()
        }
        .update(&self.database)
        .await;
        let model = match updated {
            Ok(model) => model,
            Err(err) => {
                self.attachments.discard(Folder::Avatars, &name).await;
                return Err(err.into());
            }
        };

        if let Some(previous) = previous {
            self.attachments.discard(Folder::Avatars, &previous).await;
        }
        Account::try_from(model)
    }

    /// Forward a listing removal request to every admin and confirm it to the
    /// requester.
    pub async fn request_listing_removal(
        &self,
        cmd: &ListingRemovalCmd,
    ) -> ResultEngine<Outcome<()>> {
        let name = normalize_required_text(&cmd.name, "name")?;
        let email = crate::credentials::normalize_email(&cmd.email)?;
        let marketplace = normalize_required_text(&cmd.marketplace, "marketplace")?;
        let product_name = normalize_required_text(&cmd.product_name, "product name")?;
        let product_url = normalize_required_text(&cmd.product_url, "product url")?;

        let details = format!(
            "Email: {email}\nMarketplace: {marketplace}\nProduct name: {product_name}\n\
             Product url: {product_url}\nMeeting date: {}\nAdditional comment: {}",
            cmd.meeting.trim(),
            cmd.comment.trim()
        );

        let mut notifications: Vec<Notification> = self
            .admin_emails()
            .await?
            .into_iter()
            .map(|admin| {
                Notification::new(
                    admin,
                    "Listing removal request.",
                    format!("{name} has requested for listing removal.\n{details}"),
                )
            })
            .collect();
        notifications.push(Notification::new(
            email,
            "Listing removal request.",
            format!("Your request has been received for listing removal.\n{details}"),
        ));

        let warning = self.notify_all(notifications).await;
        Ok(Outcome { value: (), warning })
    }
}
