//! Create an admin account: `create-admin <username> <password>`.

use std::process::ExitCode;

use dotenvy::dotenv;
use tracing::{error, info};

use service::auth::{domain::RegisterInput, AuthService};

async fn create(username: String, password: String) -> anyhow::Result<()> {
    let cfg = configs::AppConfig::load_or_env()?;
    if cfg.database.is_memory() {
        anyhow::bail!("database.url is {}; an admin created there would vanish on exit", configs::MEMORY_DATABASE_URL);
    }
    let store = service::store::connect(&cfg.database).await?;
    let user = AuthService::new(store).create_admin(RegisterInput { username, password }).await?;
    info!(user_id = %user.id, username = %user.username, "admin created");
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();
    common::utils::logging::init_logging_default();

    let mut args = std::env::args().skip(1);
    let (Some(username), Some(password), None) = (args.next(), args.next(), args.next()) else {
        eprintln!("usage: create-admin <username> <password>");
        return ExitCode::from(2);
    };

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };
    match rt.block_on(create(username, password)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "create-admin failed");
            ExitCode::FAILURE
        }
    }
}
