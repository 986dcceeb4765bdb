pub mod fix;
pub mod inspect;

use crate::cli::Commands;
use crate::errors::UnifixResult;
use crate::utils::Config;

pub fn handle_command(command: Commands, config: &mut Config) -> UnifixResult<()> {
    match command {
        Commands::Fix {
            dump,
            report,
            output,
            max_fixes,
            search_depth,
            interactive,
            format,
        } => {
            if let Some(m) = max_fixes {
                config.fixer.max_fixes = m;
            }
            if let Some(s) = search_depth {
                config.fixer.search_depth = s;
            }
            if interactive {
                config.fixer.interactive = true;
            }

            fix::handle(&dump, &report, output.as_deref(), format, config)
        }
        Commands::Inspect {
            dump,
            stage,
            function,
            text,
        } => inspect::handle(&dump, stage, function.as_deref(), text),
    }
}
