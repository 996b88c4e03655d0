use std::collections::HashSet;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use todo_authz::authz::{roles, SecurityCatalog};
use todo_authz::config::{ProviderConfig, ProviderKind};
use todo_authz::jwt::{Claims, JwtConfig};
use todo_authz::provider::KeycloakClient;
use todo_authz::seed::Seeder;

#[derive(Parser, Debug)]
#[command(author, version, about = "todo-authz maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the embedded migrations to DATABASE_URL
    Migrate,
    /// Show which embedded migrations the database has applied
    MigrateStatus,
    /// Create the client, roles, resources, policies and permissions in the
    /// authorization provider. Safe to run repeatedly.
    Seed,
    /// Mint an HS256 bearer token signed with JWT_SECRET, for the in-memory
    /// provider and local testing
    Token {
        /// Subject (user id)
        user: String,
        /// Client roles to grant
        #[arg(long = "role", default_value = roles::USER)]
        roles: Vec<String>,
        /// Lifetime in minutes
        #[arg(long, default_value_t = 60)]
        minutes: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    match Cli::parse().command {
        Commands::Migrate => {
            todo_authz::db::init().await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = todo_authz::db::init().await?;
            print_status(&pool).await?;
        }
        Commands::Seed => {
            let config = ProviderConfig::from_env()?;
            if config.kind != ProviderKind::Keycloak {
                anyhow::bail!("seeding needs AUTH_PROVIDER=keycloak");
            }
            let client_id = config.client_id.clone();
            let admin = Arc::new(KeycloakClient::new(config)?);
            let report = Seeder::new(admin, SecurityCatalog::todo()?, client_id).run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                anyhow::bail!("seeding incomplete: {} failures", report.failures.len());
            }
        }
        Commands::Token { user, roles, minutes } => {
            let jwt = JwtConfig::from_env()?;
            println!("{}", mint_token(&jwt, &user, &roles, minutes)?);
        }
    }

    Ok(())
}

fn mint_token(jwt: &JwtConfig, user: &str, roles: &[String], minutes: i64) -> anyhow::Result<String> {
    let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
    let claims = Claims::new(user, chrono::Duration::minutes(minutes)).with_client_roles(&jwt.client_id, &roles);
    Ok(jwt.encode(&claims)?)
}

async fn print_status(pool: &SqlitePool) -> anyhow::Result<()> {
    let applied: HashSet<i64> = sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in sqlx::migrate!().iter() {
        let status = if applied.contains(&migration.version) { "applied" } else { "pending" };
        println!("{:<8} {:<20} {}", status, migration.version, migration.description.trim());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_token_carries_client_roles() {
        let jwt = JwtConfig {
            secret: Arc::new(b"cli-secret".to_vec()),
            public_key_pem: None,
            issuer: None,
            client_id: "test-client".to_string(),
        };
        let token = mint_token(&jwt, "user-u", &["User".to_string(), "Administrator".to_string()], 5).unwrap();

        let claims = jwt.decode(&token).unwrap();
        let principal = jwt.principal(claims, token);
        assert_eq!(principal.user_id, "user-u");
        assert!(principal.has_role("User"));
        assert!(principal.has_role("Administrator"));
    }
}
