use clap::Subcommand;

use crate::app::AppState;
use crate::cli::utils::{output_empty_collection, output_json};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum CourseCommands {
    #[command(about = "List courses of a tenant")]
    List {
        #[arg(help = "Tenant key, e.g. ucb")]
        tenant: String,
    },
}

pub async fn handle(cmd: CourseCommands, state: &AppState, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        CourseCommands::List { tenant } => {
            let tenant = state.tenants.resolve_key(&tenant).await?;
            let courses = state.courses.list_courses(&tenant).await?;
            if courses.is_empty() {
                return output_empty_collection(&output_format, "courses", "No courses found");
            }

            match output_format {
                OutputFormat::Json => output_json("courses", &courses)?,
                OutputFormat::Text => {
                    println!("{:<6} {:<30} {}", "ID", "NAME", "TEACHER");
                    println!("{}", "-".repeat(50));
                    for c in &courses {
                        let teacher = c.profesor_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
                        println!("{:<6} {:<30} {}", c.id, c.nombre, teacher);
                    }
                }
            }
            Ok(())
        }
    }
}
