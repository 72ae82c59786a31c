// ABOUTME: Matrix client initialization, authentication, and home channel resolution
// ABOUTME: Handles client creation with a persistent crypto store and login via password or token

use anyhow::{Context, Result};
use matrix_sdk::{
    ruma::{OwnedRoomAliasId, OwnedRoomId, OwnedUserId},
    Client,
};
use salon_core::config::MatrixConfig;
use std::path::Path;

pub async fn create_client(homeserver: &str, store_dir: &Path) -> Result<Client> {
    std::fs::create_dir_all(store_dir)
        .with_context(|| format!("Failed to create store directory {}", store_dir.display()))?;

    let client = Client::builder()
        .homeserver_url(homeserver)
        .sqlite_store(store_dir, None)
        .build()
        .await
        .context("Failed to create Matrix client")?;

    tracing::info!(store = %store_dir.display(), "Matrix client created successfully");

    Ok(client)
}

pub async fn login(client: &Client, matrix: &MatrixConfig) -> Result<()> {
    if let Some(token) = matrix.access_token.as_deref() {
        tracing::info!("Logging in with access token");
        let user_id: OwnedUserId = matrix.user_id.parse().context("Invalid Matrix user id")?;
        let session = matrix_sdk::AuthSession::Matrix(matrix_sdk::matrix_auth::MatrixSession {
            meta: matrix_sdk::SessionMeta {
                user_id,
                device_id: matrix.device_name.clone().into(),
            },
            tokens: matrix_sdk::matrix_auth::MatrixSessionTokens {
                access_token: token.to_string(),
                refresh_token: None,
            },
        });
        client.restore_session(session).await?;
    } else if let Some(pwd) = matrix.password.as_deref() {
        tracing::info!("Logging in with password");
        client
            .matrix_auth()
            .login_username(&matrix.user_id, pwd)
            .device_id(&matrix.device_name)
            .initial_device_display_name(&matrix.device_name)
            .send()
            .await
            .context("Failed to log in")?;
    } else {
        anyhow::bail!("Either MATRIX_PASSWORD or MATRIX_ACCESS_TOKEN is required");
    }

    let user_id = client
        .user_id()
        .context("Login succeeded but the client has no user id")?;
    tracing::info!(user_id = %user_id, "Logged in successfully");

    Ok(())
}

/// Resolve a room id or `#alias:server` to a room id
pub async fn resolve_channel(client: &Client, id_or_alias: &str) -> Result<String> {
    if id_or_alias.starts_with('#') {
        let alias: OwnedRoomAliasId = id_or_alias
            .parse()
            .with_context(|| format!("Invalid room alias {}", id_or_alias))?;
        let response = client
            .resolve_room_alias(&alias)
            .await
            .with_context(|| format!("Failed to resolve room alias {}", id_or_alias))?;
        tracing::debug!(alias = %alias, room_id = %response.room_id, "Resolved room alias");
        return Ok(response.room_id.to_string());
    }

    let room_id: OwnedRoomId = id_or_alias
        .parse()
        .with_context(|| format!("Invalid room id {}", id_or_alias))?;
    Ok(room_id.to_string())
}
