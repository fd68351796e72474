//! Shell completion generation

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

use crate::cli::CliArgs;

/// Write a completion script for `shell` to `out`
///
/// # Arguments
/// * `shell` - Target shell
/// * `out` - Destination, usually stdout
pub fn write_completion(shell: Shell, out: &mut impl Write) {
    let mut cmd = CliArgs::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}

/// Print a completion script for `shell` to stdout
pub fn generate_completion(shell: Shell) {
    write_completion(shell, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_script_mentions_subcommands() {
        let mut buffer = Vec::new();
        write_completion(Shell::Bash, &mut buffer);
        let script = String::from_utf8(buffer).unwrap();

        assert!(script.contains("dataapi"));
        assert!(script.contains("create-collection"));
    }

    #[test]
    fn test_zsh_script_is_generated() {
        let mut buffer = Vec::new();
        write_completion(Shell::Zsh, &mut buffer);
        assert!(!buffer.is_empty());
    }
}
