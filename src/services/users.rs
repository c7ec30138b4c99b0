use crate::{
    auth,
    config::AppConfig,
    entities::{otp_token, user, OtpToken, User, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Minutes a signup verification code stays valid.
const OTP_TTL_MINUTES: i64 = 15;

/// Account service: two-step OTP signup, login, and profile upkeep.
///
/// Signup is deliberately split. `signup_request` stores the pending
/// account (hash included) in `otp_tokens` and emails a 6-digit code;
/// no user row exists yet. `signup_verify` turns the newest matching
/// token into a real account. Abandoned signups therefore never occupy
/// a username.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    event_sender: Arc<EventSender>,
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
        }
    }

    /// First signup step. Validates the desired account, rejects
    /// usernames and emails that already belong to a registered user,
    /// and issues a verification code. Pending tokens for the same
    /// email are left alone; only the newest one counts at verify time.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn signup_request(&self, input: SignupRequestInput) -> Result<(), ServiceError> {
        input.validate()?;
        let username = input.username.trim().to_string();
        let email = normalize_email(&input.email);

        let username_taken = User::find()
            .filter(user::Column::Username.eq(username.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if username_taken {
            return Err(ServiceError::Conflict(
                "Username is already taken".to_string(),
            ));
        }

        let email_taken = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await?
            .is_some();
        if email_taken {
            return Err(ServiceError::Conflict(
                "Email is already registered".to_string(),
            ));
        }

        let password_hash = auth::hash_password(&input.password)?;
        let code = auth::generate_otp_code();
        let now = Utc::now();

        let token = otp_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.clone()),
            username: Set(username),
            password_hash: Set(password_hash),
            code: Set(code.clone()),
            expires_at: Set(now + Duration::minutes(OTP_TTL_MINUTES)),
            used: Set(false),
            created_at: Set(now),
        };
        token.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::SignupOtpIssued { email, code })
            .await;

        info!("Issued signup verification code");
        Ok(())
    }

    /// Second signup step. The newest unused, unexpired token for the
    /// email must carry the submitted code; every failure mode returns
    /// the same message so codes cannot be probed.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn signup_verify(&self, input: SignupVerifyInput) -> Result<AuthOutcome, ServiceError> {
        let email = normalize_email(&input.email);
        let now = Utc::now();

        let token = OtpToken::find()
            .filter(otp_token::Column::Email.eq(email.clone()))
            .filter(otp_token::Column::Used.eq(false))
            .filter(otp_token::Column::ExpiresAt.gt(now))
            .order_by_desc(otp_token::Column::CreatedAt)
            .one(&*self.db)
            .await?;

        let token = match token {
            Some(t) if t.code == input.code.trim() => t,
            _ => {
                return Err(ServiceError::ValidationError(
                    "Invalid or expired verification code".to_string(),
                ))
            }
        };

        let txn = self.db.begin().await?;

        // Uniqueness is re-checked here: another signup may have
        // completed for the same name while this one sat unverified.
        let username_taken = User::find()
            .filter(user::Column::Username.eq(token.username.clone()))
            .one(&txn)
            .await?
            .is_some();
        if username_taken {
            return Err(ServiceError::Conflict(
                "Username is already taken".to_string(),
            ));
        }
        let email_taken = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&txn)
            .await?
            .is_some();
        if email_taken {
            return Err(ServiceError::Conflict(
                "Email is already registered".to_string(),
            ));
        }

        let user_model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(token.username.clone()),
            email: Set(email),
            password_hash: Set(token.password_hash.clone()),
            role: Set(UserRole::Customer),
            phone: Set(None),
            address: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let user = user_model.insert(&txn).await?;

        let mut used_token: otp_token::ActiveModel = token.into();
        used_token.used = Set(true);
        used_token.update(&txn).await?;

        txn.commit().await?;

        let token = auth::issue_token(
            &user,
            &self.config.jwt_secret,
            self.config.jwt_expiration_secs,
        )?;
        info!("Created account {} ({})", user.username, user.id);
        Ok(AuthOutcome { token, user })
    }

    /// Username + password login. Unknown username and wrong password
    /// produce the same answer.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthOutcome, ServiceError> {
        let user = User::find()
            .filter(user::Column::Username.eq(input.username.trim()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::Unauthorized("Invalid username or password".to_string())
            })?;

        if !auth::verify_password(&input.password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        let token = auth::issue_token(
            &user,
            &self.config.jwt_secret,
            self.config.jwt_expiration_secs,
        )?;
        info!("User {} logged in", user.username);
        Ok(AuthOutcome { token, user })
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    /// Updates contact details. An empty string clears phone or
    /// address; a changed email must not collide with another account.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;

        let existing = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = existing.clone().into();
        if let Some(email) = input.email {
            let email = normalize_email(&email);
            if email != existing.email {
                let taken = User::find()
                    .filter(user::Column::Email.eq(email.clone()))
                    .one(&*self.db)
                    .await?
                    .is_some();
                if taken {
                    return Err(ServiceError::Conflict(
                        "Email is already registered".to_string(),
                    ));
                }
                active.email = Set(email);
            }
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone.trim().to_string()).filter(|p| !p.is_empty()));
        }
        if let Some(address) = input.address {
            active.address = Set(Some(address.trim().to_string()).filter(|a| !a.is_empty()));
        }
        active.updated_at = Set(Utc::now());

        let user = active.update(&*self.db).await?;
        Ok(user)
    }

    /// Rotates the password after verifying the current one.
    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        input: ChangePasswordInput,
    ) -> Result<(), ServiceError> {
        input.validate()?;

        let user = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if !auth::verify_password(&input.current_password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = auth::hash_password(&input.new_password)?;
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!("Password changed for user {}", user_id);
        Ok(())
    }
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// First signup step request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequestInput {
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,
    #[validate(email(message = "Email address is invalid"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Second signup step request
#[derive(Debug, Deserialize)]
pub struct SignupVerifyInput {
    pub email: String,
    pub code: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Profile update request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(email(message = "Email address is invalid"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Password change request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordInput {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Token plus the account it belongs to. The model's hash field is
/// marked skip_serializing, so this is safe to return as-is.
#[derive(Debug, Serialize)]
pub struct AuthOutcome {
    pub token: String,
    pub user: user::Model,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Input Validation ====================

    #[test]
    fn signup_rejects_short_password() {
        let input = SignupRequestInput {
            username: "rahim".to_string(),
            email: "rahim@example.com".to_string(),
            password: "short".to_string(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn signup_rejects_bad_email() {
        let input = SignupRequestInput {
            username: "rahim".to_string(),
            email: "not-an-email".to_string(),
            password: "long enough password".to_string(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn signup_accepts_reasonable_input() {
        let input = SignupRequestInput {
            username: "rahim".to_string(),
            email: "rahim@example.com".to_string(),
            password: "a sensible passphrase".to_string(),
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn profile_update_validates_only_present_email() {
        assert!(UpdateProfileInput::default().validate().is_ok());
        let bad = UpdateProfileInput {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    // ==================== Normalization ====================

    #[test]
    fn emails_are_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  Rahim@Example.COM "), "rahim@example.com");
    }

    // ==================== Serialization ====================

    #[test]
    fn auth_outcome_never_leaks_the_hash() {
        let outcome = AuthOutcome {
            token: "jwt".to_string(),
            user: user::Model {
                id: Uuid::new_v4(),
                username: "rahim".to_string(),
                email: "rahim@example.com".to_string(),
                password_hash: "$argon2id$secret".to_string(),
                role: UserRole::Customer,
                phone: None,
                address: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("rahim"));
    }
}
