use espmon::commands::build_cli;
use espmon::commands::monitor::connection_from_matches;
use std::time::Duration;

#[test]
fn test_monitor_requires_port() {
    assert!(build_cli().try_get_matches_from(["espmon", "monitor"]).is_err());
}

#[test]
fn test_monitor_rejects_zero_timeout() {
    let matches =
        build_cli().get_matches_from(["espmon", "monitor", "COM3", "--timeout-ms", "0"]);
    let (_, sub) = matches.subcommand().unwrap();
    assert!(connection_from_matches(sub).is_err());
}

#[test]
fn test_monitor_defaults_to_two_second_timeout() {
    let matches = build_cli().get_matches_from(["espmon", "monitor", "/dev/ttyACM0", "--json"]);
    let (_, sub) = matches.subcommand().unwrap();
    assert!(sub.get_flag("json"));
    let config = connection_from_matches(sub).unwrap();
    assert_eq!(config.read_timeout, Duration::from_secs(2));
    assert_eq!(config.baud_rate, 115_200);
}

#[test]
fn test_completions_shell_is_validated() {
    assert!(build_cli()
        .try_get_matches_from(["espmon", "completions", "cmd"])
        .is_err());
    assert!(build_cli()
        .try_get_matches_from(["espmon", "completions", "zsh"])
        .is_ok());
}
