//! validate-config: check a streak configuration file before deploying it

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use streak_config::{ConfigError, StreakPolicy, CURRENT_CONFIG_VERSION};
use streak_util::{default_config_path, format_duration};

const EXIT_INVALID: u8 = 1;
const EXIT_USAGE: u8 = 2;

fn usage() -> ExitCode {
    eprintln!("usage: validate-config <config-file>");
    eprintln!("  the daemon reads {} by default", default_config_path().display());
    ExitCode::from(EXIT_USAGE)
}

fn summarize(path: &Path, policy: &StreakPolicy) {
    let rules = &policy.rules;
    println!("{}: ok (config_version {})", path.display(), CURRENT_CONFIG_VERSION);
    println!("  data_dir        {}", policy.service.data_dir.display());
    println!("  activity_db     {}", policy.service.activity_db.display());
    println!("  min activity    {}", format_duration(rules.min_duration));
    println!(
        "  freezes         every {} days, cap {}",
        rules.days_per_freeze, rules.max_freezes
    );
    println!("  lookback        {} days", rules.lookback_days);
    println!("  default cutoff  {}", rules.default_cutoff);
}

fn report(path: &Path, error: &ConfigError) {
    eprintln!("{}: invalid", path.display());
    match error {
        ConfigError::ValidationFailed { errors } => {
            for (index, message) in errors.iter().enumerate() {
                eprintln!("  {}. {}", index + 1, message);
            }
        }
        ConfigError::UnsupportedVersion(found) => {
            eprintln!("  config_version {found} is not supported (this build reads {CURRENT_CONFIG_VERSION})");
        }
        other => eprintln!("  {other}"),
    }
}

fn main() -> ExitCode {
    let mut args = std::env::args_os().skip(1);
    let (Some(path), None) = (args.next().map(PathBuf::from), args.next()) else {
        return usage();
    };

    match streak_config::load_config(&path) {
        Ok(policy) => {
            summarize(&path, &policy);
            ExitCode::SUCCESS
        }
        Err(error) => {
            report(&path, &error);
            ExitCode::from(EXIT_INVALID)
        }
    }
}
