use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::entities::{order, order_item};
use crate::errors::ServiceError;

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Outbound transactional mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Serialize)]
struct BrevoContact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct BrevoEmailRequest<'a> {
    sender: BrevoContact<'a>,
    to: Vec<BrevoContact<'a>>,
    subject: &'a str,
    #[serde(rename = "htmlContent")]
    html_content: &'a str,
}

/// Brevo (Sendinblue) SMTP API client.
#[derive(Clone)]
pub struct BrevoMailer {
    client: reqwest::Client,
    api_key: String,
    sender_name: String,
    sender_email: String,
    max_retries: u32,
}

impl BrevoMailer {
    pub fn new(api_key: String, sender_name: String, sender_email: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            api_key,
            sender_name,
            sender_email,
            max_retries: 3,
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), ServiceError> {
        let payload = BrevoEmailRequest {
            sender: BrevoContact {
                email: &self.sender_email,
                name: Some(&self.sender_name),
            },
            to: vec![BrevoContact { email: to, name: None }],
            subject,
            html_content: html_body,
        };

        let body = serde_json::to_string(&payload)
            .map_err(|e| ServiceError::MailError(e.to_string()))?;

        for attempt in 1..=self.max_retries {
            let request = self
                .client
                .post(BREVO_SEND_URL)
                .header("Content-Type", "application/json")
                .header("api-key", &self.api_key)
                .body(body.clone());

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        info!("Mail delivered to {}: {}", to, subject);
                        return Ok(());
                    } else {
                        warn!(
                            "Mail delivery failed with status: {} (attempt {}/{})",
                            response.status(),
                            attempt,
                            self.max_retries
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        "Mail delivery error: {} (attempt {}/{})",
                        e, attempt, self.max_retries
                    );
                }
            }

            // Exponential backoff: 1s, 2s, 4s
            if attempt < self.max_retries {
                let backoff = Duration::from_secs(2_u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }
        }

        error!("Mail delivery failed after {} attempts", self.max_retries);
        Err(ServiceError::MailError(format!(
            "Failed to deliver mail after {} retries",
            self.max_retries
        )))
    }
}

/// Drops every message on the floor with a log line. Used when no
/// Brevo API key is configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), ServiceError> {
        info!("Mail suppressed (no API key configured): to={} subject={}", to, subject);
        Ok(())
    }
}

/// Picks the Brevo client when an API key is configured, otherwise
/// the no-op fallback.
pub fn build_mailer(config: &AppConfig) -> Arc<dyn Mailer> {
    match config.brevo_api_key.as_deref() {
        Some(key) if !key.is_empty() => Arc::new(BrevoMailer::new(
            key.to_string(),
            config.mail_sender_name.clone(),
            config.mail_sender_email.clone(),
        )),
        _ => {
            warn!("BREVO_API_KEY not set, outbound mail disabled");
            Arc::new(NoopMailer)
        }
    }
}

/// Subject and HTML body for the signup verification code.
pub fn signup_otp_message(code: &str) -> (String, String) {
    let subject = "Your verification code".to_string();
    let html = format!(
        "<p>Use this code to verify your account:</p>\
         <h2 style=\"letter-spacing:4px\">{}</h2>\
         <p>The code expires in 15 minutes. If you did not request it, ignore this mail.</p>",
        code
    );
    (subject, html)
}

/// Subject and HTML body confirming a freshly placed order.
pub fn order_placed_message(order: &order::Model, items: &[order_item::Model]) -> (String, String) {
    let subject = format!("Order {} confirmed", order.order_number);

    let mut rows = String::new();
    for item in items {
        let name = match item.color.as_deref() {
            Some(color) => format!("{} ({})", item.product_name, color),
            None => item.product_name.clone(),
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            name, item.quantity, item.line_total
        ));
    }

    let html = format!(
        "<p>Thanks for your order <strong>{}</strong>.</p>\
         <table border=\"1\" cellpadding=\"4\">\
         <tr><th>Item</th><th>Qty</th><th>Total</th></tr>{}</table>\
         <p>Subtotal: {}<br>Discount: {}<br>Delivery ({}): {}<br>\
         <strong>Grand total: {}</strong></p>\
         <p>Payment method: {}</p>",
        order.order_number,
        rows,
        order.subtotal,
        order.discount_amount,
        order.delivery_label.as_deref().unwrap_or("delivery"),
        order.delivery_amount,
        order.total_amount,
        order.payment_method,
    );
    (subject, html)
}

/// Subject and HTML body for a status change the shopper should hear about.
pub fn order_status_message(order: &order::Model) -> (String, String) {
    let subject = format!("Order {} is now {}", order.order_number, order.status);
    let html = format!(
        "<p>Your order <strong>{}</strong> is now <strong>{}</strong>.</p>\
         <p>Grand total: {}</p>",
        order.order_number, order.status, order.total_amount
    );
    (subject, html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brevo_payload_serializes_html_content_key() {
        let payload = BrevoEmailRequest {
            sender: BrevoContact {
                email: "shop@example.com",
                name: Some("Shop"),
            },
            to: vec![BrevoContact {
                email: "shopper@example.com",
                name: None,
            }],
            subject: "Hello",
            html_content: "<p>Hi</p>",
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("htmlContent"));
        assert!(json.contains("shopper@example.com"));
        // Absent names stay out of the payload entirely
        assert!(!json.contains("null"));
    }

    #[test]
    fn otp_message_carries_code() {
        let (subject, html) = signup_otp_message("042137");
        assert!(subject.contains("verification"));
        assert!(html.contains("042137"));
    }

    #[tokio::test]
    async fn noop_mailer_always_succeeds() {
        let mailer = NoopMailer;
        assert!(mailer.send("a@b.c", "s", "<p>x</p>").await.is_ok());
    }
}
