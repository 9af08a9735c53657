mod common;

use common::{PASSWORD, admin, client, harness, stored_otp, stored_password_hash};
use engine::{EngineError, ListingRemovalCmd, RegisterCmd, Role};

#[tokio::test]
async fn registration_sends_code_and_requires_verification() {
    let h = harness().await;

    let outcome = h
        .engine
        .register(RegisterCmd::new(" Shop@Market.test ", PASSWORD, "Ada", "Lovelace", Role::Client).vat(true))
        .await
        .unwrap();
    let account = outcome.value;
    assert!(outcome.warning.is_none());
    assert_eq!(account.email, "shop@market.test");
    assert!(account.is_vat);
    assert!(!account.email_verified);
    assert!(!account.can_upload_order);

    let otp = stored_otp(&h.db, "shop@market.test").await.unwrap();
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Email Verification");
    assert!(sent[0].body.contains(&otp));

    assert_eq!(
        h.engine.authenticate("shop@market.test", PASSWORD).await,
        Err(EngineError::EmailNotVerified)
    );
    let verified = h.engine.verify_email("shop@market.test", &otp).await.unwrap();
    assert!(verified.email_verified);
    assert_eq!(stored_otp(&h.db, "shop@market.test").await, None);
    assert_eq!(
        h.engine
            .authenticate("shop@market.test", PASSWORD)
            .await
            .unwrap()
            .id,
        account.id
    );
}

#[tokio::test]
async fn registration_rejects_duplicates_and_admins() {
    let h = harness().await;
    client(&h, "shop@market.test").await;

    assert_eq!(
        h.engine
            .register(RegisterCmd::new("SHOP@market.test", PASSWORD, "A", "B", Role::Customer))
            .await
            .map(|o| o.value.id),
        Err(EngineError::ExistingKey("shop@market.test".to_string()))
    );
    assert!(matches!(
        h.engine
            .register(RegisterCmd::new("root@market.test", PASSWORD, "A", "B", Role::Admin))
            .await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn registration_validates_password_and_email() {
    let h = harness().await;

    for password in ["short#1", "nospecialchars1", "waytoolongpassword#12345"] {
        assert!(matches!(
            h.engine
                .register(RegisterCmd::new("a@market.test", password, "A", "B", Role::Client))
                .await,
            Err(EngineError::InvalidInput(_))
        ));
    }
    assert!(matches!(
        h.engine
            .register(RegisterCmd::new("not-an-email", PASSWORD, "A", "B", Role::Client))
            .await,
        Err(EngineError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn wrong_code_is_refused() {
    let h = harness().await;
    h.engine
        .register(RegisterCmd::new("shop@market.test", PASSWORD, "Ada", "Lovelace", Role::Client))
        .await
        .unwrap();

    assert_eq!(
        h.engine.verify_email("shop@market.test", "000000x").await,
        Err(EngineError::Forbidden("OTP is incorrect".to_string()))
    );
}

#[tokio::test]
async fn login_of_unverified_account_rotates_code() {
    let h = harness().await;
    h.engine
        .register(RegisterCmd::new("shop@market.test", PASSWORD, "Ada", "Lovelace", Role::Client))
        .await
        .unwrap();
    h.notifier.clear();

    assert_eq!(
        h.engine.login("shop@market.test", PASSWORD).await,
        Err(EngineError::EmailNotVerified)
    );
    let otp = stored_otp(&h.db, "shop@market.test").await.unwrap();
    assert_eq!(h.notifier.subjects(), vec!["Email Verification".to_string()]);
    assert!(h.notifier.sent()[0].body.contains(&otp));

    h.engine.verify_email("shop@market.test", &otp).await.unwrap();
    assert!(h.engine.login("shop@market.test", PASSWORD).await.is_ok());
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let h = harness().await;
    client(&h, "shop@market.test").await;

    assert_eq!(
        h.engine.login("shop@market.test", "Wrong#pass1").await,
        Err(EngineError::Unauthorized)
    );
    assert_eq!(
        h.engine.login("nobody@market.test", PASSWORD).await,
        Err(EngineError::Unauthorized)
    );
}

#[tokio::test]
async fn password_reset_flow() {
    let h = harness().await;
    client(&h, "shop@market.test").await;
    h.notifier.clear();

    h.engine.forgot_password("shop@market.test").await.unwrap();
    let otp = stored_otp(&h.db, "shop@market.test").await.unwrap();
    let sent = h.notifier.sent();
    assert_eq!(sent[0].subject, "Reset password");
    assert!(
        sent[0]
            .body
            .contains(&format!("https://market.test/reset-password/{otp}/shop@market.test"))
    );

    assert_eq!(
        h.engine
            .reset_password("shop@market.test", "999999x", "Other#pass1")
            .await,
        Err(EngineError::Forbidden(
            "Generate a new link to continue".to_string()
        ))
    );
    h.engine
        .reset_password("shop@market.test", &otp, "Other#pass1")
        .await
        .unwrap();
    assert!(h.engine.login("shop@market.test", "Other#pass1").await.is_ok());
    assert_eq!(
        h.engine.login("shop@market.test", PASSWORD).await,
        Err(EngineError::Unauthorized)
    );
    // The code is single use.
    assert!(
        h.engine
            .reset_password("shop@market.test", &otp, "Third#pass1")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn change_password_checks_current_one() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;

    assert_eq!(
        h.engine
            .change_password(account.id, "Wrong#pass1", "Other#pass1")
            .await,
        Err(EngineError::Unauthorized)
    );
    h.engine
        .change_password(account.id, PASSWORD, "Other#pass1")
        .await
        .unwrap();
    assert!(h.engine.authenticate("shop@market.test", "Other#pass1").await.is_ok());
}

#[tokio::test]
async fn admins_are_verified_and_hidden_from_account_list() {
    let h = harness().await;
    let admin = admin(&h).await;
    client(&h, "shop@market.test").await;

    assert!(admin.email_verified);
    assert!(admin.is_admin());
    let accounts = h.engine.list_accounts().await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].email, "shop@market.test");

    let profile = h.engine.profile("admin@market.test").await.unwrap();
    assert_eq!(profile.balance_minor, None);
    let profile = h.engine.profile("shop@market.test").await.unwrap();
    assert_eq!(profile.balance_minor, Some(0));
}

#[tokio::test]
async fn account_flags_and_avatar() {
    let h = harness().await;
    let admin = admin(&h).await;
    let account = client(&h, "shop@market.test").await;

    let updated = h
        .engine
        .update_account_flags(account.id, true, true)
        .await
        .unwrap();
    assert!(updated.is_vat && updated.can_upload_order);
    assert!(matches!(
        h.engine.update_account_flags(admin.id, true, true).await,
        Err(EngineError::InvalidInput(_))
    ));

    let first = h
        .engine
        .set_avatar(account.id, b"png-1", "png")
        .await
        .unwrap()
        .avatar
        .unwrap();
    let second = h
        .engine
        .set_avatar(account.id, b"png-2", "PNG")
        .await
        .unwrap()
        .avatar
        .unwrap();
    assert!(second.ends_with(".png"));
    assert!(!h.uploads.join("avatars").join(&first).exists());
    assert_eq!(
        std::fs::read(h.uploads.join("avatars").join(&second)).unwrap(),
        b"png-2"
    );
}

#[tokio::test]
async fn listing_removal_request_reaches_admins_and_requester() {
    let h = harness().await;
    admin(&h).await;

    let cmd = ListingRemovalCmd {
        name: "Ada".to_string(),
        email: "ada@elsewhere.test".to_string(),
        marketplace: "Amazon".to_string(),
        product_name: "Mug".to_string(),
        product_url: "https://amazon.test/mug".to_string(),
        meeting: "Monday".to_string(),
        comment: String::new(),
    };
    let outcome = h.engine.request_listing_removal(&cmd).await.unwrap();
    assert!(outcome.warning.is_none());

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, vec!["admin@market.test".to_string()]);
    assert_eq!(sent[1].to, vec!["ada@elsewhere.test".to_string()]);
    assert!(sent.iter().all(|n| n.subject == "Listing removal request."));
    assert!(sent[0].body.contains("https://amazon.test/mug"));
}

#[tokio::test]
async fn passwords_are_stored_as_argon2_hashes() {
    let h = harness().await;
    let shop = client(&h, "shop@market.test").await;

    let first = stored_password_hash(&h.db, "shop@market.test").await;
    assert!(first.starts_with("$argon2id$"), "{first}");
    assert!(!first.contains(PASSWORD));

    h.engine
        .change_password(shop.id, PASSWORD, "Another#456")
        .await
        .unwrap();
    let second = stored_password_hash(&h.db, "shop@market.test").await;
    assert!(second.starts_with("$argon2id$"));
    assert_ne!(first, second);
    assert_eq!(
        h.engine.authenticate("shop@market.test", PASSWORD).await,
        Err(EngineError::Unauthorized)
    );
    assert!(h.engine.authenticate("shop@market.test", "Another#456").await.is_ok());
}
