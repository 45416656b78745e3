use anyhow::{bail, Result};
use clap::{ArgMatches, Command};
use clap_complete::{generate, Shell};
use std::io;

/// Generate shell completions for the specified shell
pub fn execute(matches: &ArgMatches, cli: &mut Command) -> Result<()> {
    let Some(shell_str) = matches.get_one::<String>("shell") else {
        bail!("Shell argument is required. Supported shells: bash, zsh, fish, powershell, elvish");
    };

    let shell = parse_shell(shell_str)?;
    generate(shell, cli, "espmon", &mut io::stdout());
    Ok(())
}

fn parse_shell(name: &str) -> Result<Shell> {
    Ok(match name.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "powershell" => Shell::PowerShell,
        "elvish" => Shell::Elvish,
        _ => bail!(
            "Unsupported shell: {}. Supported shells: bash, zsh, fish, powershell, elvish",
            name
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell() {
        assert_eq!(parse_shell("BASH").unwrap(), Shell::Bash);
        assert_eq!(parse_shell("powershell").unwrap(), Shell::PowerShell);
        assert!(parse_shell("cmd").is_err());
    }

    #[test]
    fn test_generate_into_buffer() {
        let mut cli = crate::commands::build_cli();
        let mut out = Vec::new();
        generate(Shell::Bash, &mut cli, "espmon", &mut out);
        assert!(String::from_utf8(out).unwrap().contains("espmon"));
    }
}
