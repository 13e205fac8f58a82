use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Game directory containing game.json
    pub input: PathBuf,
    /// Resource file to write
    pub output: PathBuf,
    /// More output per occurrence (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        let test_cases = vec![
            (vec!["scummgen", "in", "out"], LevelFilter::Warn),
            (vec!["scummgen", "-v", "in", "out"], LevelFilter::Info),
            (vec!["scummgen", "in", "out", "-vvv"], LevelFilter::Debug),
            (vec!["scummgen", "--quiet", "in", "out"], LevelFilter::Error),
        ];
        for (args, level) in test_cases {
            let cli = Cli::try_parse_from(args.clone()).unwrap();
            assert_eq!(cli.log_level(), level, "{args:?}");
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["scummgen", "-q", "-v", "in", "out"]).is_err());
        assert!(Cli::try_parse_from(["scummgen", "in"]).is_err());
    }
}
