use clap::Subcommand;
use serde_json::json;

use crate::app::AppState;
use crate::cli::utils::{output_empty_collection, output_json};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List configured tenants")]
    List,

    #[command(about = "Show which tenant an email address maps to")]
    Resolve {
        #[arg(help = "Email address")]
        email: String,
    },
}

pub async fn handle(cmd: TenantCommands, state: &AppState, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::List => {
            let tenants = state.tenants.list().await?;
            if tenants.is_empty() {
                return output_empty_collection(&output_format, "tenants", "No tenants configured");
            }

            match output_format {
                OutputFormat::Json => output_json("tenants", &tenants)?,
                OutputFormat::Text => {
                    println!("{:<10} {:<20} {:<15} {}", "KEY", "DOMAIN", "SCHEMA", "TABLE PREFIX");
                    println!("{}", "-".repeat(65));
                    for t in &tenants {
                        println!("{:<10} {:<20} {:<15} {}", t.key, t.domain, t.schema, t.table_prefix);
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Resolve { email } => {
            let tenant = state.tenants.resolve(&email).await?;
            let role = tenant.credentials.as_ref().map(|c| c.user.clone());

            match output_format {
                OutputFormat::Json => output_json(
                    "tenant",
                    &json!({
                        "key": tenant.key,
                        "domain": tenant.domain,
                        "schema": tenant.schema,
                        "table_prefix": tenant.table_prefix,
                        "db_user": role,
                        "usuarios_table": tenant.table("usuarios").qualified(),
                    }),
                )?,
                OutputFormat::Text => {
                    println!("Tenant:       {}", tenant.key);
                    println!("Domain:       {}", tenant.domain);
                    println!("Schema:       {}", tenant.schema);
                    println!("Table prefix: {}", tenant.table_prefix);
                    println!("DB role:      {}", role.as_deref().unwrap_or("(default)"));
                }
            }
            Ok(())
        }
    }
}
