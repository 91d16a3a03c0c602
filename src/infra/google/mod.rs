// Google API infra layer.
// - `auth.rs` resolves credentials (service account or delegated user).
// - `drive_client.rs` copies, exports and deletes Drive files.
// - `slides_client.rs` runs the placeholder replacement on a presentation.

#[path = "auth.rs"]
pub mod auth;

#[path = "drive_client.rs"]
pub mod drive_client;

#[path = "slides_client.rs"]
pub mod slides_client;
