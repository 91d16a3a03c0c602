// Application configuration: everything the batch needs, resolved once at
// startup into a plain value object. The pipeline itself never reads
// environment state - it only sees what gets passed in here.

use thiserror::Error;

use crate::infra::mail::smtp_mailer::SmtpMailer;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// All missing keys are collected and reported together so the operator
    /// can fix everything in one pass.
    #[error("configuration incomplete, missing: {0}")]
    Missing(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sender: String,
    pub password: String,
    pub subject: String,
    /// Mail body with the `{{nama}}` placeholder, read from the body file.
    pub body_template: String,
    pub smtp_relay: String,
    pub smtp_port: u16,
    /// Optional Drive folder the working copies are placed into.
    pub folder_id: Option<String>,
}

impl AppConfig {
    /// Reads settings from the environment (`.env` is loaded by `main`
    /// before this runs) and the email body file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let body_file =
            std::env::var("EMAIL_BODY_FILE").unwrap_or_else(|_| "email_body.txt".to_string());

        Self::from_parts(
            std::env::var("EMAIL_SENDER").ok(),
            std::env::var("EMAIL_PASSWORD").ok(),
            std::env::var("EMAIL_SUBJECT").ok(),
            std::fs::read_to_string(&body_file).ok(),
            &body_file,
            std::env::var("SMTP_RELAY").ok(),
            std::env::var("SMTP_PORT").ok(),
            std::env::var("DRIVE_FOLDER_ID").ok(),
        )
    }

    /// Validation split out from the environment reads so it can be tested
    /// directly.
    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        sender: Option<String>,
        password: Option<String>,
        subject: Option<String>,
        body_template: Option<String>,
        body_file: &str,
        smtp_relay: Option<String>,
        smtp_port: Option<String>,
        folder_id: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        if sender.is_none() {
            missing.push("EMAIL_SENDER".to_string());
        }
        if password.is_none() {
            missing.push("EMAIL_PASSWORD".to_string());
        }
        if subject.is_none() {
            missing.push("EMAIL_SUBJECT".to_string());
        }
        if body_template.is_none() {
            missing.push(format!("{} (email body file)", body_file));
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing.join(", ")));
        }

        Ok(Self {
            sender: sender.unwrap_or_default(),
            password: password.unwrap_or_default(),
            subject: subject.unwrap_or_default(),
            body_template: body_template.unwrap_or_default(),
            smtp_relay: smtp_relay.unwrap_or_else(|| SmtpMailer::DEFAULT_RELAY.to_string()),
            smtp_port: smtp_port
                .and_then(|v| v.parse().ok())
                .unwrap_or(SmtpMailer::DEFAULT_PORT),
            folder_id: folder_id.filter(|v| !v.is_empty()),
        })
    }
}
