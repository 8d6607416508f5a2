//! `teamlog` - CLI for team attendance
//!
//! This binary manages the roster and records check-ins and check-outs.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::HashMap;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use serde::Serialize;

use teamlog::cli::{
    Cli, Command, ConfigCommand, HistoryCommand, MemberCommand, MemberEditArgs,
    MemberFieldsArgs, PositionCommand, ResolveCommand, TransitionCommand,
};
use teamlog::seed::seed_sample_members;
use teamlog::{
    init_logging, AttendanceEvent, Config, EventKind, Member, MemberFilter, MemberInput,
    MemberUpdate, Position, QuickCheckIn, Resolution, Roster, Transition,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<teamlog::Error>()
                .map_or(1, teamlog::Error::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Configuration commands never touch the database
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(&config, config_cmd),
        command => command,
    };

    let mut roster = Roster::open(&config).with_context(|| {
        format!(
            "failed to open roster at {}",
            config.database_path().display()
        )
    })?;

    match command {
        Command::Init => handle_init(&roster),
        Command::Seed => {
            let added = seed_sample_members(&mut roster)?;
            println!("Added {added} sample members.");
            Ok(())
        }
        Command::Status(status_cmd) => handle_status(&roster, status_cmd.json),
        Command::Member(member_cmd) => handle_member(&mut roster, member_cmd),
        Command::Checkin(cmd) => handle_transition(&mut roster, &cmd, EventKind::Checkin),
        Command::Checkout(cmd) => handle_transition(&mut roster, &cmd, EventKind::Checkout),
        Command::CheckoutAll => {
            let count = roster.checkout_all()?;
            println!("Checked out {count} members.");
            Ok(())
        }
        Command::Quick { text } => handle_quick(&mut roster, &text),
        Command::Resolve(resolve_cmd) => handle_resolve(&roster, &resolve_cmd),
        Command::History(history_cmd) => handle_history(&roster, &config, &history_cmd),
        Command::Today { json } => handle_today(&roster, json),
        Command::Position(position_cmd) => handle_position(&roster, position_cmd),
        Command::Config(_) => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_init(roster: &Roster) -> Result<()> {
    let added = roster.ensure_default_positions()?;
    println!("Database ready at {}", roster.storage().path().display());
    if added > 0 {
        println!("Restored {added} default positions.");
    }
    Ok(())
}

fn handle_status(roster: &Roster, json: bool) -> Result<()> {
    let stats = roster.stats()?;
    let present = roster.present_members()?;

    if json {
        let status = serde_json::json!({
            "database_path": roster.storage().path(),
            "stats": stats,
            "present": present,
        });
        return print_json(&status);
    }

    println!("teamlog status");
    println!("--------------");
    println!("Database:      {}", roster.storage().path().display());
    println!("Members:       {}", stats.total_members);
    println!("  Active:      {}", stats.active_members);
    println!("  Inactive:    {}", stats.inactive_members);
    println!("Present:       {}", stats.present_members);
    println!("Events:        {}", stats.total_events);
    if !present.is_empty() {
        println!();
        print_members(&present);
    }
    Ok(())
}

fn position_named(roster: &Roster, name: &str) -> Result<Position> {
    roster.position_by_name(name)?.ok_or_else(|| {
        teamlog::Error::validation("position", format!("no position named '{name}'")).into()
    })
}

fn member_input<'a>(roster: &Roster, fields: &'a MemberFieldsArgs) -> Result<MemberInput<'a>> {
    let position = position_named(roster, &fields.position)?;
    Ok(MemberInput {
        first_name: &fields.first,
        last_name: &fields.last,
        identity: &fields.identity,
        position_id: position.id,
    })
}

fn member_update<'a>(roster: &Roster, edit: &'a MemberEditArgs) -> Result<MemberUpdate<'a>> {
    let position_id = match &edit.position {
        Some(name) => Some(position_named(roster, name)?.id),
        None => None,
    };
    Ok(MemberUpdate {
        first_name: edit.first.as_deref(),
        last_name: edit.last.as_deref(),
        identity: edit.identity.as_deref(),
        position_id,
        active: edit.active_flag(),
    })
}

fn handle_member(roster: &mut Roster, cmd: MemberCommand) -> Result<()> {
    match cmd {
        MemberCommand::Add(fields) => {
            let input = member_input(roster, &fields)?;
            let member = roster.create_member(&input)?;
            println!("Added member {}: {}", member.id, member.full_name());
        }
        MemberCommand::List { filter, json } => {
            let members = roster.members(filter.into())?;
            if json {
                return print_json(&members);
            }
            if members.is_empty() {
                println!("No members.");
            } else {
                print_members(&members);
            }
        }
        MemberCommand::Show { id, json } => {
            let member = roster.member(id)?;
            if json {
                return print_json(&member);
            }
            print_member_detail(&member);
            let recent = roster.history(id, Some(5))?;
            if !recent.is_empty() {
                println!();
                println!("Recent activity:");
                for event in &recent {
                    print_event(event, None);
                }
            }
        }
        MemberCommand::Edit(edit) => {
            let update = member_update(roster, &edit)?;
            let member = roster.edit_member(edit.id, &update)?;
            println!("Updated member {}: {}", member.id, member.full_name());
        }
        MemberCommand::Delete { id } => {
            let member = roster.delete_member(id)?;
            println!("Deleted member {}: {}", member.id, member.full_name());
        }
        MemberCommand::Toggle { id } => {
            let member = roster.toggle_active(id)?;
            print_activity(&member);
        }
        MemberCommand::Activate { id } => {
            let member = roster.set_active(id, true)?;
            print_activity(&member);
        }
        MemberCommand::Deactivate { id } => {
            let member = roster.set_active(id, false)?;
            print_activity(&member);
        }
    }
    Ok(())
}

fn handle_transition(roster: &mut Roster, cmd: &TransitionCommand, kind: EventKind) -> Result<()> {
    let verb = match kind {
        EventKind::Checkin => "checked in",
        EventKind::Checkout => "checked out",
    };
    match roster.transition(cmd.id, kind, cmd.note.as_deref())? {
        Transition::Recorded { member, event } => {
            println!(
                "{} {verb} at {}",
                member.full_name(),
                event.timestamp.with_timezone(&Local).format("%H:%M:%S")
            );
        }
        Transition::Skipped(member) => {
            println!("{} is already {verb}.", member.full_name());
        }
    }
    Ok(())
}

fn handle_quick(roster: &mut Roster, text: &str) -> Result<()> {
    match roster.quick_check_in(text)? {
        QuickCheckIn::CheckedIn(member) => println!("Welcome, {}!", member.full_name()),
        QuickCheckIn::AlreadyCheckedIn(member) => {
            println!("{} is already checked in.", member.full_name());
        }
        QuickCheckIn::Ambiguous(candidates) => {
            println!("Several members match; use the member ID:");
            print_members(&candidates);
        }
        QuickCheckIn::NotFound => println!("No active member matches."),
    }
    Ok(())
}

fn handle_resolve(roster: &Roster, cmd: &ResolveCommand) -> Result<()> {
    let resolution = roster.resolve(&cmd.text, !cmd.include_inactive)?;
    if cmd.json {
        return print_json(&resolution);
    }
    match resolution {
        Resolution::Found(member) => print_member_detail(&member),
        Resolution::Ambiguous(candidates) => {
            println!("{} members match:", candidates.len());
            print_members(&candidates);
        }
        Resolution::NotFound => println!("No member matches."),
    }
    Ok(())
}

fn handle_history(roster: &Roster, config: &Config, cmd: &HistoryCommand) -> Result<()> {
    let limit = cmd.limit.unwrap_or(config.attendance.history_limit);
    let member = roster.member(cmd.id)?;
    let events = roster.history(cmd.id, Some(limit))?;
    if cmd.json {
        return print_json(&events);
    }

    println!("History for {} ({})", member.full_name(), member.id);
    if events.is_empty() {
        println!("No attendance recorded.");
    }
    for event in &events {
        print_event(event, None);
    }
    Ok(())
}

fn handle_today(roster: &Roster, json: bool) -> Result<()> {
    let events = roster.events_today()?;
    if json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("No attendance recorded today.");
        return Ok(());
    }

    let names: HashMap<i64, String> = roster
        .members(MemberFilter::All)?
        .into_iter()
        .map(|m| (m.id, m.full_name()))
        .collect();
    for event in &events {
        print_event(event, names.get(&event.member_id).map(String::as_str));
    }
    Ok(())
}

fn handle_position(roster: &Roster, cmd: PositionCommand) -> Result<()> {
    match cmd {
        PositionCommand::List { json } => {
            let positions = roster.positions()?;
            if json {
                return print_json(&positions);
            }
            println!("{:>4}  {:<12} {:>7}  DESCRIPTION", "ID", "NAME", "MEMBERS");
            for position in &positions {
                println!(
                    "{:>4}  {:<12} {:>7}  {}",
                    position.id,
                    position.name,
                    position.member_count,
                    position.description.as_deref().unwrap_or("")
                );
            }
        }
        PositionCommand::Add { name, description } => {
            let position = roster.add_position(&name, description.as_deref())?;
            println!("Added position {}: {}", position.id, position.name);
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                return print_json(config);
            }
            println!("Current Configuration");
            println!("=====================");
            println!();
            println!("[Storage]");
            println!("  Database path:         {}", config.database_path().display());
            println!();
            println!("[Identity]");
            println!("  Digest:                {}", config.identity.digest);
            println!(
                "  Identifier pattern:    {}",
                config
                    .identity
                    .numeric_pattern
                    .as_deref()
                    .unwrap_or("(all digits)")
            );
            println!();
            println!("[Attendance]");
            println!(
                "  Repeat check-in:       {:?}",
                config.attendance.repeat_check_in
            );
            println!(
                "  Deactivate checks out: {}",
                config.attendance.deactivate_checks_out
            );
            println!(
                "  History limit:         {}",
                config.attendance.history_limit
            );
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn print_members(members: &[Member]) {
    println!(
        "{:>4}  {:<24} {:<10} {:<8} {}",
        "ID", "NAME", "POSITION", "ACTIVE", "IN"
    );
    for member in members {
        println!(
            "{:>4}  {:<24} {:<10} {:<8} {}",
            member.id,
            member.full_name(),
            member.position.name,
            if member.active { "yes" } else { "no" },
            if member.checked_in { "yes" } else { "no" }
        );
    }
}

fn print_member_detail(member: &Member) {
    println!("Member {}", member.id);
    println!("  Name:         {}", member.full_name());
    println!("  Position:     {}", member.position);
    println!("  Identity:     {}", member.identity_hash.short());
    println!("  Active:       {}", member.active);
    println!("  Checked in:   {}", member.checked_in);
    println!(
        "  Last updated: {}",
        member
            .last_updated
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_activity(member: &Member) {
    let state = if member.active { "active" } else { "inactive" };
    if !member.active && member.checked_in {
        println!(
            "{} is now {state} (still checked in).",
            member.full_name()
        );
    } else {
        println!("{} is now {state}.", member.full_name());
    }
}

fn print_event(event: &AttendanceEvent, name: Option<&str>) {
    let when = event
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S");
    let who = name.map(|n| format!("  {n}")).unwrap_or_default();
    match &event.note {
        Some(note) => println!("{when}  {:<8}{who}  ({note})", event.kind),
        None => println!("{when}  {:<8}{who}", event.kind),
    }
}
