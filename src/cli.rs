/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Thin projection of the engine onto a terminal: argument shapes in,
//! canonical output lines out. Warnings accumulate into a trailing block;
//! the exit code is 1 iff at least one failure occurred.

use std::path::PathBuf;

use crate::args::Command;
use crate::engine::maintenance::{self, CleanupReport, ConfigChange, ResetReport};
use crate::engine::{Engine, Failure, GuardReport, ReportLine};
use crate::errors::{GuardError, Result};
use crate::platform::Platform;
use crate::registry::config::GuardConfig;
use crate::registry::entry::{Folder, GuardState};
use crate::resolver::{self, Keyword, Target};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Collects warnings and failures during one invocation and renders them as
/// a trailing block after the command output.
#[derive(Default)]
struct Output {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Output {
    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, error: &GuardError) {
        self.errors.push(error.to_string());
    }

    fn absorb_guard_report(&mut self, report: &GuardReport) {
        self.warnings.extend(report.warnings.iter().cloned());
        self.absorb_failures(&report.failures);
    }

    fn absorb_failures(&mut self, failures: &[Failure]) {
        for failure in failures {
            let message = failure.error.to_string();
            // Most error texts already carry the path; add it when missing.
            if message.contains(failure.subject.as_str()) {
                self.errors.push(message);
            } else {
                self.errors.push(format!("{}: {}", failure.subject, message));
            }
        }
    }

    fn finish(self) -> i32 {
        for warning in &self.warnings {
            println!("Warning: {}", warning);
        }
        for error in &self.errors {
            eprintln!("Error: {}", error);
        }
        if self.errors.is_empty() {
            EXIT_OK
        } else {
            EXIT_FAILURE
        }
    }
}

fn usage(text: &str) -> i32 {
    eprintln!("Usage: {}", text);
    EXIT_FAILURE
}

/// Dispatch one parsed command against the workspace.
pub fn run(command: Command, workspace: PathBuf, platform: &dyn Platform) -> i32 {
    match command {
        Command::Init { mode, owner, group } => run_init(workspace, platform, &mode, &owner, &group),
        Command::Version => {
            let version = env!("CARGO_PKG_VERSION");
            if version.is_empty() {
                println!("guard version dev");
            } else {
                println!("guard version {}", version);
            }
            EXIT_OK
        }
        other => match Engine::open(workspace, platform) {
            Ok(engine) => dispatch(other, engine),
            Err(err) => {
                eprintln!("Error: {}", err);
                EXIT_FAILURE
            }
        },
    }
}

fn run_init(workspace: PathBuf, platform: &dyn Platform, mode: &str, owner: &str, group: &str) -> i32 {
    match maintenance::init(&workspace, platform, mode, owner, group) {
        Ok(config) => {
            println!("Initialized .guardfile with:");
            print_config_fields(&config);
            EXIT_OK
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            EXIT_FAILURE
        }
    }
}

fn dispatch(command: Command, mut engine: Engine<'_>) -> i32 {
    let mut out = Output::default();
    let result = match command {
        Command::Add { args } => run_add(&mut engine, &args, &mut out),
        Command::Remove { args } => run_remove(&mut engine, &args, &mut out),
        Command::Create { names } => run_create(&mut engine, &names, &mut out),
        Command::Destroy { names } => run_destroy(&mut engine, &names, &mut out),
        Command::Update { collection, args } => run_update(&mut engine, &collection, &args, &mut out),
        Command::Clear { names } => run_clear(&mut engine, &names, &mut out),
        Command::Enable { targets } => run_set_guard(&mut engine, &targets, true, &mut out),
        Command::Disable { targets } => run_set_guard(&mut engine, &targets, false, &mut out),
        Command::Toggle { targets } => run_toggle(&mut engine, &targets, &mut out),
        Command::Show { targets } => run_show(&engine, &targets, &mut out),
        Command::Config { args } => run_config(&mut engine, &args, &mut out),
        Command::Reset => run_reset(&mut engine, &mut out),
        Command::Cleanup => run_cleanup(&mut engine, &mut out),
        Command::Uninstall => run_uninstall(engine, &mut out),
        Command::Init { .. } | Command::Version => unreachable!("handled before dispatch"),
    };
    match result {
        Ok(Some(code)) => code,
        Ok(None) => out.finish(),
        Err(err) => {
            out.error(&err);
            out.finish()
        }
    }
}

/// Commands return `Some(code)` to bypass the trailing block (usage
/// errors), `None` to let the accumulated output decide.
type CommandResult = Result<Option<i32>>;

fn run_add(engine: &mut Engine<'_>, args: &[String], out: &mut Output) -> CommandResult {
    match split_membership(args, "to") {
        Some((paths, collection)) => {
            if paths.is_empty() {
                return Ok(Some(usage("guard add <paths>... to <collection>")));
            }
            let report = engine.update_add(collection, paths)?;
            println!(
                "Added {} file(s) to collection '{}'",
                report.added, collection
            );
            if report.already > 0 {
                println!(
                    "{} file(s) already contained in the collection",
                    report.already
                );
            }
            out.warnings.extend(report.warnings);
            out.absorb_failures(&report.failures);
        }
        None => {
            let report = engine.add(args)?;
            println!("Registered {} file(s)", report.registered);
            if report.already > 0 {
                println!("{} file(s) already registered", report.already);
            }
            out.absorb_failures(&report.failures);
        }
    }
    Ok(None)
}

fn run_remove(engine: &mut Engine<'_>, args: &[String], out: &mut Output) -> CommandResult {
    match split_membership(args, "from") {
        Some((paths, collection)) => {
            if paths.is_empty() {
                return Ok(Some(usage("guard remove <paths>... from <collection>")));
            }
            let report = engine.update_remove(collection, paths)?;
            println!(
                "Removed {} file(s) from collection '{}'",
                report.removed, collection
            );
            out.warnings.extend(report.warnings);
            out.absorb_failures(&report.failures);
        }
        None => {
            let report = engine.remove(args)?;
            println!("Removed {} file(s)", report.removed);
            out.warnings.extend(report.warnings);
            out.absorb_failures(&report.failures);
        }
    }
    Ok(None)
}

/// `add a b to coll` / `remove a b from coll` sugar: split on the keyword.
fn split_membership<'a>(args: &'a [String], keyword: &str) -> Option<(&'a [String], &'a str)> {
    let at = args.iter().position(|arg| arg == keyword)?;
    if at + 2 != args.len() {
        return None;
    }
    Some((&args[..at], &args[at + 1]))
}

fn run_create(engine: &mut Engine<'_>, names: &[String], out: &mut Output) -> CommandResult {
    let report = engine.create(names)?;
    println!("Created {} collection(s):", report.created.len());
    for name in &report.created {
        println!("  - {}", name);
    }
    for name in &report.duplicates {
        out.warn(format!("collection '{}' already exists", name));
    }
    Ok(None)
}

fn run_destroy(engine: &mut Engine<'_>, names: &[String], out: &mut Output) -> CommandResult {
    let report = engine.destroy(names)?;
    println!("Destroyed {} collection(s):", report.destroyed.len());
    for (name, count) in &report.destroyed {
        println!("  - {} ({} files)", name, count);
    }
    out.warnings.extend(report.warnings);
    out.absorb_failures(&report.failures);
    Ok(None)
}

fn run_update(
    engine: &mut Engine<'_>,
    collection: &str,
    args: &[String],
    out: &mut Output,
) -> CommandResult {
    let (action, paths) = match args.split_first() {
        Some((action, paths)) if !paths.is_empty() => (action.as_str(), paths),
        _ => return Ok(Some(usage("guard update <collection> add|remove <paths>..."))),
    };
    match action {
        "add" => {
            let report = engine.update_add(collection, paths)?;
            println!(
                "Added {} file(s) to collection '{}'",
                report.added, collection
            );
            if report.already > 0 {
                println!(
                    "{} file(s) already contained in the collection",
                    report.already
                );
            }
            out.warnings.extend(report.warnings);
            out.absorb_failures(&report.failures);
            Ok(None)
        }
        "remove" => {
            let report = engine.update_remove(collection, paths)?;
            println!(
                "Removed {} file(s) from collection '{}'",
                report.removed, collection
            );
            out.warnings.extend(report.warnings);
            out.absorb_failures(&report.failures);
            Ok(None)
        }
        _ => Ok(Some(usage("guard update <collection> add|remove <paths>..."))),
    }
}

fn run_clear(engine: &mut Engine<'_>, names: &[String], out: &mut Output) -> CommandResult {
    let report = engine.clear(names)?;
    println!("Cleared {} collection(s):", report.cleared.len());
    for (name, count) in &report.cleared {
        println!("  - {}: removed {} file(s)", name, count);
    }
    out.warnings.extend(report.warnings);
    out.absorb_failures(&report.failures);
    Ok(None)
}

/// Classify free-form targets, honoring a leading `file|collection|folder`
/// keyword that applies to every remaining argument.
fn classify_targets(
    engine: &Engine<'_>,
    args: &[String],
    out: &mut Output,
) -> Vec<Target> {
    let (keyword, rest) = match args.split_first() {
        Some((first, rest)) if Keyword::parse(first).is_some() && !rest.is_empty() => {
            (Keyword::parse(first), rest)
        }
        _ => (None, args),
    };
    let mut targets = Vec::new();
    for arg in rest {
        match resolver::resolve(&engine.registry, arg, keyword) {
            Ok(resolution) => {
                if resolution.shadowed_collection {
                    out.warn(GuardError::Conflict(arg.clone()).to_string());
                }
                targets.push(resolution.target);
            }
            Err(err) => out.error(&err),
        }
    }
    targets
}

fn run_set_guard(
    engine: &mut Engine<'_>,
    args: &[String],
    on: bool,
    out: &mut Output,
) -> CommandResult {
    let targets = classify_targets(engine, args, out);
    let report = engine.set_guard(&targets, on)?;
    render_guard_report(&report, out);
    Ok(None)
}

fn run_toggle(engine: &mut Engine<'_>, args: &[String], out: &mut Output) -> CommandResult {
    let targets = classify_targets(engine, args, out);
    let report = engine.toggle(&targets)?;
    render_guard_report(&report, out);
    Ok(None)
}

fn render_guard_report(report: &GuardReport, out: &mut Output) {
    for line in &report.lines {
        match line {
            ReportLine::FileEnabled(path) => println!("Guard enabled for {}", path),
            ReportLine::FileDisabled(path) => println!("Guard disabled for {}", path),
            ReportLine::CollectionEnabled(name) => {
                println!("Guard enabled for collection {}", name)
            }
            ReportLine::CollectionDisabled(name) => {
                println!("Guard disabled for collection {}", name)
            }
            ReportLine::FolderEnabled(path) => {
                println!("Guard enabled for folder {}", Folder::name_for(path))
            }
            ReportLine::FolderDisabled(path) => {
                println!("Guard disabled for folder {}", Folder::name_for(path))
            }
        }
    }
    if report.standalone_enabled > 0 {
        println!("Guard enabled for {} file(s)", report.standalone_enabled);
    }
    if report.standalone_disabled > 0 {
        println!("Guard disabled for {} file(s)", report.standalone_disabled);
    }
    out.absorb_guard_report(report);
}

fn run_show(engine: &Engine<'_>, args: &[String], out: &mut Output) -> CommandResult {
    let registry = &engine.registry;
    if args.is_empty() {
        // Full overview: every tracked file, then every collection.
        for entry in registry.files() {
            show_file(engine, &entry.path.to_string(), out);
        }
        show_all_collections(engine);
        return Ok(None);
    }
    let (keyword, rest) = match args.split_first() {
        Some((first, rest)) if Keyword::parse(first).is_some() => (Keyword::parse(first), rest),
        _ => (None, args),
    };
    if keyword == Some(Keyword::Collection) && rest.is_empty() {
        show_all_collections(engine);
        return Ok(None);
    }
    if rest.is_empty() {
        return Ok(Some(usage("guard show [file|collection|folder] <names>...")));
    }
    for arg in rest {
        match keyword {
            Some(Keyword::File) => show_file(engine, arg, out),
            Some(Keyword::Collection) => show_collection(engine, arg, out),
            Some(Keyword::Folder) => show_folder(engine, arg, out),
            None => match resolver::resolve(registry, arg, None) {
                Ok(resolution) => match resolution.target {
                    Target::File(path) => show_file(engine, path.as_str(), out),
                    Target::Collection(name) => show_collection(engine, &name, out),
                    Target::Folder(path) => show_folder(engine, path.as_str(), out),
                },
                Err(err) => out.error(&err),
            },
        }
    }
    Ok(None)
}

fn show_file(engine: &Engine<'_>, arg: &str, out: &mut Output) {
    let registry = &engine.registry;
    let path = match engine.canonical(arg) {
        Ok(path) => path,
        Err(err) => {
            out.error(&err);
            return;
        }
    };
    let state = registry.file_state(&path);
    if state == GuardState::Untracked && !path.to_path(registry.workspace()).is_file() {
        out.error(&GuardError::NotFound(format!("'{}'", arg)));
        return;
    }
    let collections = registry.collections_containing(&path).join(", ");
    println!("{} {} ({})", state.indicator(), path, collections);
    if registry.file(&path).is_some() && !path.to_path(registry.workspace()).is_file() {
        out.warn(format!("'{}' not found on disk, run 'guard cleanup'", path));
    }
}

fn show_collection(engine: &Engine<'_>, name: &str, out: &mut Output) {
    let registry = &engine.registry;
    let collection = match registry.collection(name) {
        Some(collection) => collection,
        None => {
            out.error(&GuardError::NotFound(format!("collection '{}'", name)));
            return;
        }
    };
    println!(
        "{} collection: {} ({} files)",
        registry.collection_state(name).indicator(),
        name,
        collection.members.len()
    );
}

fn show_folder(engine: &Engine<'_>, arg: &str, out: &mut Output) {
    let registry = &engine.registry;
    let path = match engine.canonical(arg) {
        Ok(path) => path,
        Err(err) => {
            out.error(&err);
            return;
        }
    };
    if !path.to_path(registry.workspace()).is_dir() {
        out.error(&GuardError::NotFound(format!("folder '{}'", arg)));
        return;
    }
    let children = registry.disk_children(&path);
    println!(
        "{} folder: {} ({} files)",
        registry.folder_state(&path).indicator(),
        Folder::name_for(&path),
        children.len()
    );
}

fn show_all_collections(engine: &Engine<'_>) {
    let registry = &engine.registry;
    for collection in registry.collections() {
        println!(
            "{} collection: {} ({} files)",
            registry.collection_state(&collection.name).indicator(),
            collection.name,
            collection.members.len()
        );
    }
    for folder in registry.folders() {
        println!(
            "{} folder: {} ({} files)",
            registry.folder_state(&folder.path).indicator(),
            folder.name,
            registry.disk_children(&folder.path).len()
        );
    }
    let total = registry.collections().len();
    let guarded = registry
        .collections()
        .iter()
        .filter(|c| c.guard)
        .count();
    println!(
        "{} collection(s) total: {} guarded, {} unguarded",
        total,
        guarded,
        total - guarded
    );
}

fn run_config(engine: &mut Engine<'_>, args: &[String], out: &mut Output) -> CommandResult {
    match args.split_first() {
        Some((action, rest)) if action == "show" && rest.is_empty() => {
            println!("Configuration:");
            print_config_fields(&engine.registry.config);
            Ok(None)
        }
        Some((action, rest)) if action == "set" && !rest.is_empty() => {
            let change = match parse_config_change(rest) {
                Some(change) => change,
                None => {
                    return Ok(Some(usage(
                        "guard config set mode|owner|group <value> | guard config set <mode> [owner] [group]",
                    )))
                }
            };
            let warnings = engine.config_set(change.clone())?;
            println!("Config updated:");
            if change.mode.is_some() {
                println!("  Mode: {}", engine.registry.config.display_mode());
            }
            if change.owner.is_some() {
                println!("  Owner: {}", display_field(&engine.registry.config.owner));
            }
            if change.group.is_some() {
                println!("  Group: {}", display_field(&engine.registry.config.group));
            }
            for warning in warnings {
                out.warn(warning);
            }
            Ok(None)
        }
        _ => Ok(Some(usage("guard config show | guard config set ..."))),
    }
}

fn parse_config_change(rest: &[String]) -> Option<ConfigChange> {
    let mut change = ConfigChange::default();
    match rest.first().map(String::as_str) {
        Some("mode") | Some("owner") | Some("group") => {
            if rest.len() != 2 {
                return None;
            }
            match rest[0].as_str() {
                "mode" => change.mode = Some(rest[1].clone()),
                "owner" => change.owner = Some(rest[1].clone()),
                "group" => change.group = Some(rest[1].clone()),
                _ => unreachable!(),
            }
        }
        Some(_) => {
            if rest.len() > 3 {
                return None;
            }
            change.mode = Some(rest[0].clone());
            change.owner = rest.get(1).cloned();
            change.group = rest.get(2).cloned();
        }
        None => return None,
    }
    Some(change)
}

fn print_config_fields(config: &GuardConfig) {
    println!("  Mode: {}", config.display_mode());
    println!("  Owner: {}", display_field(&config.owner));
    println!("  Group: {}", display_field(&config.group));
}

fn display_field(value: &str) -> &str {
    if value.is_empty() {
        "(empty)"
    } else {
        value
    }
}

fn run_reset(engine: &mut Engine<'_>, out: &mut Output) -> CommandResult {
    let report = engine.reset()?;
    print_reset_block(&report);
    out.warnings.extend(report.warnings);
    out.absorb_failures(&report.failures);
    Ok(None)
}

fn print_reset_block(report: &ResetReport) {
    println!("Reset complete:");
    println!("  Guard disabled for {} file(s)", report.files_disabled);
    println!(
        "  Guard disabled for {} collection(s)",
        report.collections_disabled
    );
}

fn run_cleanup(engine: &mut Engine<'_>, _out: &mut Output) -> CommandResult {
    let report = engine.cleanup()?;
    print_cleanup_block(&report);
    Ok(None)
}

fn print_cleanup_block(report: &CleanupReport) {
    println!("Cleanup complete:");
    println!("  Removed {} file(s) (file not found)", report.files_removed);
    println!(
        "  Removed {} collection(s) (empty)",
        report.collections_removed
    );
    if report.folders_removed > 0 {
        println!(
            "  Removed {} folder(s) (directory not found)",
            report.folders_removed
        );
    }
}

fn run_uninstall(engine: Engine<'_>, out: &mut Output) -> CommandResult {
    let (reset, cleanup) = engine.uninstall()?;
    print_reset_block(&reset);
    print_cleanup_block(&cleanup);
    println!("Removed .guardfile");
    out.warnings.extend(reset.warnings);
    out.absorb_failures(&reset.failures);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_sugar_splits_on_trailing_keyword() {
        let args: Vec<String> = ["a.txt", "b.txt", "to", "docs"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let (paths, collection) = split_membership(&args, "to").unwrap();
        assert_eq!(2, paths.len());
        assert_eq!("docs", collection);

        // The keyword must be followed by exactly one name.
        let args: Vec<String> = ["a.txt", "to", "docs", "extra"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        assert!(split_membership(&args, "to").is_none());

        let args: Vec<String> = ["a.txt", "b.txt"].iter().map(|s| (*s).to_owned()).collect();
        assert!(split_membership(&args, "to").is_none());
    }

    #[test]
    fn config_change_forms() {
        let keyed = parse_config_change(&["mode".to_owned(), "0644".to_owned()]).unwrap();
        assert_eq!(Some("0644".to_owned()), keyed.mode);
        assert_eq!(None, keyed.owner);

        let positional = parse_config_change(&[
            "0600".to_owned(),
            "alice".to_owned(),
            "staff".to_owned(),
        ])
        .unwrap();
        assert_eq!(Some("0600".to_owned()), positional.mode);
        assert_eq!(Some("alice".to_owned()), positional.owner);
        assert_eq!(Some("staff".to_owned()), positional.group);

        assert!(parse_config_change(&["mode".to_owned()]).is_none());
        assert!(parse_config_change(&[]).is_none());
    }

    #[test]
    fn empty_config_fields_render_placeholder() {
        assert_eq!("(empty)", display_field(""));
        assert_eq!("alice", display_field("alice"));
    }
}
