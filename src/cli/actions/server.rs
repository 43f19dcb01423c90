use crate::api::{self, AuthConfig};
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            let config = AuthConfig::new(globals.frontend_url.clone())
                .with_token_ttl_seconds(globals.token_ttl_seconds)
                .with_bootstrap_admin_email(globals.admin_email.clone());

            api::new(port, dsn, globals.secret_key.clone(), config).await?;
        }
    }

    Ok(())
}
