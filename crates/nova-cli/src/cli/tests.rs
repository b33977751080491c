#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command};
    use clap::{CommandFactory, Parser};
    use std::path::PathBuf;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dev_with_overrides() {
        let cli = Cli::try_parse_from(["nova", "dev", "--port", "3000", "--host", "0.0.0.0"]).unwrap();
        match cli.command {
            Command::Dev(args) => {
                assert_eq!(args.port, Some(3000));
                assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
            }
            other => panic!("expected dev, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nova", "build", "--config", "custom.json", "--cwd", "site", "-v"])
            .unwrap();
        assert!(cli.verbose);
        let global = cli.global();
        assert_eq!(global.config, Some(PathBuf::from("custom.json")));
        assert_eq!(global.cwd, Some(PathBuf::from("site")));
        assert!(matches!(cli.command, Command::Build(ref a) if !a.no_compile));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["nova", "-v", "-q", "dev"]).is_err());
    }

    #[test]
    fn test_runtime_requires_manifest() {
        assert!(Cli::try_parse_from(["nova", "runtime"]).is_err());
        let cli = Cli::try_parse_from(["nova", "runtime", "--manifest", ".nova/dev.json"]).unwrap();
        assert!(matches!(cli.command, Command::Runtime(ref a) if a.manifest == PathBuf::from(".nova/dev.json")));
    }

    #[test]
    fn test_runtime_is_hidden() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("dev"));
        assert!(!help.contains("runtime"));
    }
}
