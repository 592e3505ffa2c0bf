//! Diagnostics command.

use crate::config::Config;
use crate::pool::ClientPool;
use anyhow::Result;
use colored::Colorize;
use dbup_core::{ClientLocator, DatabaseKind};

pub fn execute(config: &Config) -> Result<()> {
    println!("{}", "dbup Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check SQL client
    print!("  SQL client: ");
    let locator = ClientLocator::new(&config.client.executable);
    match locator.ensure() {
        Ok(path) => println!("{} ({})", "✓ found".green(), path.display()),
        Err(_) => {
            println!("{}", "✗ not found".red());
            if which::which("mysql").is_err() {
                issues.push("no SQL client on PATH either; install one or fix client.executable");
            } else {
                issues.push("configured client.executable is invalid");
            }
        }
    }

    // Check config file
    print!("  Config file: ");
    let config_path = Config::config_path();
    if config_path.exists() {
        println!("{} ({})", "✓ exists".green(), config_path.display());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check source tree
    print!("  Source directory: ");
    if config.source.directory.join("sql").is_dir() {
        println!("{}", "✓ has sql tree".green());
    } else {
        println!("{}", "✗ no sql directory".red());
        issues.push("source.directory does not contain a sql tree");
    }

    // Check databases
    println!();
    println!("  {}", "Databases:".cyan());
    for kind in DatabaseKind::ALL {
        print!("    {kind}: ");
        if !kind.is_enabled(config.enabled_mask()) {
            println!("{}", "○ disabled".yellow());
            continue;
        }

        match ClientPool::new(&locator, config.connection_info(kind))
            .and_then(|pool| pool.database_exists())
        {
            Ok(true) => println!("{}", "✓ reachable".green()),
            Ok(false) => println!("{}", "○ server reachable, schema absent".yellow()),
            Err(e) => {
                println!("{}", format!("✗ {e}").red());
                issues.push("a configured database is unreachable");
            }
        }
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {issue}");
        }
    }

    Ok(())
}
