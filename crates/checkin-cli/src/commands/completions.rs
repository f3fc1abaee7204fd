use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

const BIN_NAME: &str = "checkin";

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
        }
    }
}

pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();

    match output_path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            generate(Shell::from(shell), &mut command, BIN_NAME, &mut writer);
            writer.flush()?;
            tracing::debug!("Wrote {shell:?} completions to {}", path.display());
            println!("{}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            generate(Shell::from(shell), &mut command, BIN_NAME, &mut stdout);
            stdout.flush()?;
        }
    }

    Ok(())
}
