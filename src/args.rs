/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "guard", version, about, long_about = None)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Launch the interactive two-panel interface
    #[arg(short, long)]
    pub interactive: bool,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, PartialEq, Clone, Subcommand)]
#[clap(rename_all = "kebab_case")]
pub enum Command {
    /// Create the .guardfile registry in the current directory
    Init {
        /// Permission bits applied to guarded files, octal (e.g. 0000)
        mode: String,
        /// Owner applied to guarded files (empty: leave unchanged)
        #[arg(default_value = "")]
        owner: String,
        /// Group applied to guarded files (empty: leave unchanged)
        #[arg(default_value = "")]
        group: String,
    },
    /// Register files, remembering their current permissions
    /// (`add <paths>... to <collection>` also adds them to a collection)
    Add {
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Unregister files, restoring their permissions
    /// (`remove <paths>... from <collection>` only edits membership)
    Remove {
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Create empty collections
    Create {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Destroy collections; their files stay registered
    Destroy {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Edit collection membership: `update <collection> add|remove <paths>...`
    Update {
        collection: String,
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Disable guard on collections and empty their membership
    Clear {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Enable guard on files, collections or folders
    Enable {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Disable guard, restoring original permissions
    Disable {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Flip guard state; untracked files are registered first
    Toggle {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Show guard state of files, collections or folders
    Show { targets: Vec<String> },
    /// Show or change configuration: `config show` or `config set ...`
    Config {
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Disable every guard and restore original permissions
    Reset,
    /// Drop entries for missing files and empty collections
    Cleanup,
    /// Reset, clean up and delete the registry
    Uninstall,
    /// Print the version
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let args = Args::parse_from(["guard", "add", "a.txt", "b.txt"]);
        assert_eq!(
            Some(Command::Add {
                args: vec!["a.txt".to_owned(), "b.txt".to_owned()]
            }),
            args.command
        );
    }

    #[test]
    fn interactive_flag_needs_no_subcommand() {
        let args = Args::parse_from(["guard", "-i"]);
        assert!(args.interactive);
        assert_eq!(None, args.command);
    }

    #[test]
    fn missing_required_arguments_fail_parsing() {
        assert!(Args::try_parse_from(["guard", "clear"]).is_err());
        assert!(Args::try_parse_from(["guard", "enable"]).is_err());
        assert!(Args::try_parse_from(["guard", "init"]).is_err());
    }

    #[test]
    fn verbosity_accumulates() {
        let args = Args::parse_from(["guard", "-vv", "reset"]);
        assert_eq!(2, args.verbose);
    }
}
