use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "FAE_HOST",
        "FAE_PORT",
        "FAE_DATABASE_URL",
        "FAE_COMPLIANCE_ORACLE_URL",
        "FAE_COMPLIANCE_TIMEOUT_MS",
        "FAE_SWEEP_INTERVAL_SECS",
        "FAE_QUOTA_CEILING",
        "FAE_LOT_SIZE_FRACTION",
        "FAE_SNIPING_WINDOW_MINS",
        "FAE_AUCTION_EXTENSION_MINS",
        "FAE_MAX_AUCTION_EXTENSIONS",
        "FAE_PICKUP_LEAD_HOURS",
        "FAE_EVENT_BUFFER_SIZE",
        "FAE_LOG_EVENTS",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
