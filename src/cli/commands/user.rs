use clap::Subcommand;
use serde_json::json;

use crate::app::AppState;
use crate::cli::utils::{output_empty_collection, output_json, output_success};
use crate::cli::OutputFormat;
use crate::database::models::Rol;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "List users of a tenant")]
    List {
        #[arg(help = "Tenant key, e.g. ucb")]
        tenant: String,
    },

    #[command(about = "Change a user's role")]
    SetRole {
        #[arg(help = "Tenant key, e.g. ucb")]
        tenant: String,
        #[arg(help = "User id")]
        id: i64,
        #[arg(help = "Estudiante, Profesor or Director")]
        rol: String,
    },
}

pub async fn handle(cmd: UserCommands, state: &AppState, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::List { tenant } => {
            let tenant = state.tenants.resolve_key(&tenant).await?;
            let users = state.users.list_users(&tenant).await?;
            if users.is_empty() {
                return output_empty_collection(&output_format, "users", "No users found");
            }

            match output_format {
                OutputFormat::Json => output_json("users", &users)?,
                OutputFormat::Text => {
                    println!("{:<6} {:<30} {:<12} {}", "ID", "EMAIL", "ROL", "NAME");
                    println!("{}", "-".repeat(75));
                    for u in &users {
                        println!("{:<6} {:<30} {:<12} {}", u.id, u.email, u.rol, u.display_name());
                    }
                }
            }
            Ok(())
        }
        UserCommands::SetRole { tenant, id, rol } => {
            let rol: Rol = rol.parse().map_err(anyhow::Error::msg)?;
            let tenant = state.tenants.resolve_key(&tenant).await?;
            let user = state.users.update_role(&tenant, id, rol).await?;
            output_success(
                &output_format,
                &format!("User {} is now {}", user.email, user.rol),
                Some(json!({ "user": user })),
            )
        }
    }
}
