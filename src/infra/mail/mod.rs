// Mail infra layer.
// - `smtp_mailer.rs` submits certificates over STARTTLS via lettre.

#[path = "smtp_mailer.rs"]
pub mod smtp_mailer;
