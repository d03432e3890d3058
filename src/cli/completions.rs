use std::io::Write;

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::args::Cli;
use crate::error::Result;

/// Writes the completion script for `shell` to `output`.
pub fn handle_completion_command(shell: Shell, output: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "pcert", output);
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completion_mentions_subcommands() {
        let mut out = Vec::new();
        handle_completion_command(Shell::Bash, &mut out).unwrap();
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("pcert"));
        assert!(script.contains("create"));
        assert!(script.contains("--sign-cert"));
    }
}
