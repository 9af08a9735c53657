use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    Account, EngineError, Notification, Outcome, RegisterCmd, ResultEngine, Role, accounts,
    credentials::{
        generate_otp, hash_password, normalize_email, validate_password, verify_password,
    },
};

use super::{Engine, normalize_required_text, with_tx};

impl Engine {
    /// Register a client or customer account.
    ///
    /// The account starts unverified; a one-time code is sent to its email.
    pub async fn register(&self, cmd: RegisterCmd) -> ResultEngine<Outcome<Account>> {
        if cmd.role == Role::Admin {
            return Err(EngineError::Forbidden(
                "admin accounts cannot self-register".to_string(),
            ));
        }
        let email = normalize_email(&cmd.email)?;
        validate_password(&cmd.password)?;
        let first_name = normalize_required_text(&cmd.first_name, "first name")?;
        let last_name = normalize_required_text(&cmd.last_name, "last name")?;
        let otp = generate_otp();

        let account = with_tx!(self, |db_tx| {
            self.insert_account(
                &db_tx,
                NewAccount {
                    email,
                    password: &cmd.password,
                    first_name,
                    last_name,
                    role: cmd.role,
                    is_vat: cmd.is_vat,
                    email_verified: false,
                    otp: Some(otp.clone()),
                },
            )
            .await
        })?;
        tracing::info!(account_id = account.id, role = account.role.as_str(), "account registered");

        let warning = self.notify(verification_mail(&account, &otp)).await;
        Ok(Outcome {
            value: account,
            warning,
        })
    }

    /// Create a verified admin account. Only reachable from the admin CLI.
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> ResultEngine<Account> {
        let email = normalize_email(email)?;
        validate_password(password)?;
        let first_name = normalize_required_text(first_name, "first name")?;
        let last_name = normalize_required_text(last_name, "last name")?;

        let account = with_tx!(self, |db_tx| {
            self.insert_account(
                &db_tx,
                NewAccount {
                    email,
                    password,
                    first_name,
                    last_name,
                    role: Role::Admin,
                    is_vat: false,
                    email_verified: true,
                    otp: None,
                },
            )
            .await
        })?;
        tracing::info!(account_id = account.id, "admin account created");
        Ok(account)
    }

    /// Check credentials and return the profile.
    ///
    /// An unverified account gets a fresh code by email and the login fails
    /// with [`EngineError::EmailNotVerified`].
    pub async fn login(&self, email: &str, password: &str) -> ResultEngine<Account> {
        let model = self.check_credentials(email, password).await?;
        if !model.email_verified {
            let otp = generate_otp();
            let model = self.set_otp(model, Some(otp.clone())).await?;
            let account = Account::try_from(model)?;
            self.notify(verification_mail(&account, &otp)).await;
            return Err(EngineError::EmailNotVerified);
        }
        Account::try_from(model)
    }

    /// Credential check for every authenticated request.
    pub async fn authenticate(&self, email: &str, password: &str) -> ResultEngine<Account> {
        let model = self.check_credentials(email, password).await?;
        if !model.email_verified {
            return Err(EngineError::EmailNotVerified);
        }
        Account::try_from(model)
    }

    pub async fn verify_email(&self, email: &str, otp: &str) -> ResultEngine<Account> {
        let model = self.account_model_by_email(email).await?;
        if !otp_matches(model.otp.as_deref(), otp) {
            return Err(EngineError::Forbidden("OTP is incorrect".to_string()));
        }

        let active = accounts::ActiveModel {
            id: ActiveValue::Set(model.id),
            otp: ActiveValue::Set(None),
            email_verified: ActiveValue::Set(true),
            ..Default::default()
        };
        let model = active.update(&self.database).await?;
        tracing::info!(account_id = model.id, "email verified");
        Account::try_from(model)
    }

    /// Send a password reset link carrying a fresh one-time code.
    pub async fn forgot_password(&self, email: &str) -> ResultEngine<Outcome<()>> {
        let model = self.account_model_by_email(email).await?;
        let otp = generate_otp();
        let model = self.set_otp(model, Some(otp.clone())).await?;

        let link = format!(
            "{}/reset-password/{otp}/{}",
            self.frontend_url, model.email
        );
        let warning = self
            .notify(Notification::new(
                model.email.clone(),
                "Reset password",
                format!(
                    "Dear {}, you can reset your password at {link}. \
                     If you didn't request changing your password ignore this email.",
                    model.first_name
                ),
            ))
            .await;
        Ok(Outcome { value: (), warning })
    }

    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> ResultEngine<()> {
        validate_password(new_password)?;
        let model = self.account_model_by_email(email).await?;
        if !otp_matches(model.otp.as_deref(), otp) {
            return Err(EngineError::Forbidden(
                "Generate a new link to continue".to_string(),
            ));
        }

        let active = accounts::ActiveModel {
            id: ActiveValue::Set(model.id),
            otp: ActiveValue::Set(None),
            password_hash: ActiveValue::Set(hash_password(new_password)?),
            ..Default::default()
        };
        active.update(&self.database).await?;
        tracing::info!(account_id = model.id, "password reset");
        Ok(())
    }

    pub async fn change_password(
        &self,
        account_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> ResultEngine<()> {
        validate_password(new_password)?;
        let model = accounts::Entity::find_by_id(account_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))?;
        if !verify_password(current_password, &model.password_hash) {
            return Err(EngineError::Unauthorized);
        }

        let active = accounts::ActiveModel {
            id: ActiveValue::Set(model.id),
            password_hash: ActiveValue::Set(hash_password(new_password)?),
            ..Default::default()
        };
        active.update(&self.database).await?;
        Ok(())
    }

    pub(super) async fn account_model_by_email(&self, email: &str) -> ResultEngine<accounts::Model> {
        let email = email.trim().to_lowercase();
        accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email.as_str()))
            .one(&self.database)
            .await?
            .ok_or(EngineError::KeyNotFound(email))
    }

    async fn check_credentials(&self, email: &str, password: &str) -> ResultEngine<accounts::Model> {
        let email = email.trim().to_lowercase();
        let model = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email))
            .one(&self.database)
            .await?
            .ok_or(EngineError::Unauthorized)?;
        if !verify_password(password, &model.password_hash) {
            return Err(EngineError::Unauthorized);
        }
        Ok(model)
    }

    async fn set_otp(
        &self,
        model: accounts::Model,
        otp: Option<String>,
    ) -> ResultEngine<accounts::Model> {
        let active = accounts::ActiveModel {
            id: ActiveValue::Set(model.id),
            otp: ActiveValue::Set(otp),
            ..Default::default()
        };
        Ok(active.update(&self.database).await?)
    }

    async fn insert_account(
        &self,
        db_tx: &DatabaseTransaction,
        new: NewAccount<'_>,
    ) -> ResultEngine<Account> {
        let exists = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(new.email.as_str()))
            .one(db_tx)
            .await?
            .is_some();
        if exists {
            return Err(EngineError::ExistingKey(new.email));
        }

        let model = accounts::ActiveModel {
            id: ActiveValue::NotSet,
            email: ActiveValue::Set(new.email),
            password_hash: ActiveValue::Set(hash_password(new.password)?),
            first_name: ActiveValue::Set(new.first_name),
            last_name: ActiveValue::Set(new.last_name),
            role: ActiveValue::Set(new.role.as_str().to_string()),
            is_vat: ActiveValue::Set(new.is_vat),
            can_upload_order: ActiveValue::Set(false),
            email_verified: ActiveValue::Set(new.email_verified),
            otp: ActiveValue::Set(new.otp),
            avatar: ActiveValue::Set(None),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db_tx)
        .await?;
        Account::try_from(model)
    }
}

struct NewAccount<'a> {
    email: String,
    password: &'a str,
    first_name: String,
    last_name: String,
    role: Role,
    is_vat: bool,
    email_verified: bool,
    otp: Option<String>,
}

fn otp_matches(stored: Option<&str>, given: &str) -> bool {
    matches!(stored, Some(stored) if stored == given.trim())
}

fn verification_mail(account: &Account, otp: &str) -> Notification {
    Notification::new(
        account.email.clone(),
        "Email Verification",
        format!(
            "Dear {}, thank you for joining the marketplace. \
             Enter the code {otp} to verify your email.",
            account.first_name
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_must_be_pending() {
        assert!(otp_matches(Some("123456"), "123456"));
        assert!(otp_matches(Some("123456"), " 123456 "));
        assert!(!otp_matches(Some("123456"), "654321"));
        assert!(!otp_matches(None, "123456"));
    }
}
