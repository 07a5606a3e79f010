use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument prints the help text and the current configuration.
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
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "CPG_DATABASE_URL",
        "CPG_MAX_DB_CONNECTIONS",
        "CPG_AUTO_MIGRATE",
        "CPG_WALLET_POLICY",
        "CPG_ORDER_LIFETIME_SECS",
        "CPG_SWEEP_INTERVAL_SECS",
        "CPG_CURRENCY_SETTINGS",
        "CPG_PAYMENT_METHODS",
        "CPG_FIXED_EXCHANGE_RATES",
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
