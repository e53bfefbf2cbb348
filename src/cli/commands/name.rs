use clap::Subcommand;

use crate::cli::utils::output_json;
use crate::cli::OutputFormat;
use crate::names::split_full_name;

#[derive(Subcommand)]
pub enum NameCommands {
    #[command(about = "Split a full name into nombre and apellido")]
    Split {
        #[arg(help = "Full name", num_args = 0.., trailing_var_arg = true)]
        full_name: Vec<String>,
    },
}

pub fn handle(cmd: NameCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        NameCommands::Split { full_name } => {
            let name = split_full_name(&full_name.join(" "));
            match output_format {
                OutputFormat::Json => output_json("name", &name)?,
                OutputFormat::Text => {
                    println!("Nombre:   {}", name.nombre);
                    println!("Apellido: {}", name.apellido);
                }
            }
            Ok(())
        }
    }
}
