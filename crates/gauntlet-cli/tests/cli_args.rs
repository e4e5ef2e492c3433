use clap::Parser;
use gauntlet_cli::{commands, Cli, Commands};

#[test]
fn test_run_flags_parse() {
    let cli = Cli::try_parse_from([
        "gauntlet",
        "-v",
        "run",
        "--nodes",
        "7",
        "--adversarial",
        "5,6",
        "--http-base",
        "28000",
        "--scenarios",
        "flood,replay",
        "--expand-to",
        "10",
        "--keep-running",
    ])
    .unwrap();
    assert!(cli.verbose);
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.topology.nodes, Some(7));
            assert_eq!(args.topology.adversarial, Some(vec![5, 6]));
            assert_eq!(args.topology.http_base, Some(28000));
            assert_eq!(args.scenarios.as_deref(), Some("flood,replay"));
            assert_eq!(args.expand_to, Some(10));
            assert!(args.keep_running);
            assert!(!args.container);
        }
        other => panic!("expected run, got {:?}", other),
    }
}

#[test]
fn test_global_config_after_subcommand() {
    let cli = Cli::try_parse_from(["gauntlet", "plan", "--config", "custom.toml", "--print-config"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("custom.toml")));
    assert!(matches!(cli.command, Commands::Plan { print_config: true, .. }));
}

#[test]
fn test_unknown_flag_is_rejected() {
    assert!(Cli::try_parse_from(["gauntlet", "run", "--teleport"]).is_err());
}

#[tokio::test]
async fn test_plan_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gauntlet.toml");
    std::fs::write(
        &path,
        format!(
            "[topology]\nnodes = 3\nadversarial = [2]\nwork_dir = \"{}\"\n",
            dir.path().display()
        ),
    )
    .unwrap();

    let cli = Cli::try_parse_from(["gauntlet", "--config", path.to_str().unwrap(), "plan"]).unwrap();
    let code = commands::execute(cli, std::future::pending()).await.unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn test_invalid_config_exits_with_two() {
    let cli = Cli::try_parse_from(["gauntlet", "plan", "--nodes", "2", "--adversarial", "0"]).unwrap();
    let err = commands::execute(cli, std::future::pending()).await.unwrap_err();
    let cli_error = err.downcast_ref::<gauntlet_cli::CliError>().unwrap();
    assert_eq!(cli_error.exit_code(), 2);
}
