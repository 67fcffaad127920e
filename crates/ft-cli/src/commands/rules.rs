//! Rule management commands.
//!
//! Edits go straight to the database. A running `ft run` picks them up on
//! its next start.

use std::io::Write;

use anyhow::{Context, Result, bail};

use ft_core::{NotificationRule, RuleEngine, RuleId, UsageStore};
use ft_db::Database;

use super::util::{format_duration, minutes_to_ms};
use crate::RulesAction;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &RulesAction) -> Result<()> {
    let mut engine = RuleEngine::new(db.load_rules().context("failed to load rules")?);

    match action {
        RulesAction::List => return list(writer, engine.rules()),
        RulesAction::Add {
            app,
            minutes,
            message,
        } => {
            let rule = engine.add(app.as_str(), minutes_to_ms(*minutes)?, message.clone())?;
            writeln!(
                writer,
                "Added rule {} for {} ({})",
                rule.id,
                rule.app_name,
                format_duration(rule.time_limit_ms)
            )?;
        }
        RulesAction::Remove { id } => {
            let id = resolve(&engine, id)?;
            let removed = engine.remove(&id)?;
            writeln!(writer, "Removed rule {} for {}", removed.id, removed.app_name)?;
        }
        RulesAction::Enable { id } | RulesAction::Disable { id } => {
            let enabled = matches!(action, RulesAction::Enable { .. });
            let id = resolve(&engine, id)?;
            engine.set_enabled(&id, enabled)?;
            writeln!(
                writer,
                "{} rule {id}",
                if enabled { "Enabled" } else { "Disabled" }
            )?;
        }
        RulesAction::Test { app, minutes } => {
            let alerts = engine.preview(app, minutes_to_ms(*minutes)?);
            if alerts.is_empty() {
                writeln!(writer, "No rule would fire.")?;
            }
            for alert in alerts {
                writeln!(writer, "{}: {}", alert.rule_id, alert.message)?;
            }
            return Ok(());
        }
    }

    db.save_rules(engine.rules()).context("failed to save rules")?;
    Ok(())
}

fn list<W: Write>(writer: &mut W, rules: &[NotificationRule]) -> Result<()> {
    if rules.is_empty() {
        writeln!(writer, "No rules.")?;
        return Ok(());
    }
    for rule in rules {
        write!(
            writer,
            "{}  {:<20} {:>8}  {}",
            rule.id,
            rule.app_name,
            format_duration(rule.time_limit_ms),
            if rule.enabled { "on" } else { "off" }
        )?;
        if let Some(message) = &rule.custom_message {
            write!(writer, "  \"{message}\"")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Finds the rule whose ID equals or uniquely starts with `prefix`.
fn resolve(engine: &RuleEngine, prefix: &str) -> Result<RuleId> {
    if let Some(rule) = engine.rules().iter().find(|rule| rule.id.as_str() == prefix) {
        return Ok(rule.id.clone());
    }
    let mut matches = engine
        .rules()
        .iter()
        .filter(|rule| rule.id.as_str().starts_with(prefix));
    match (matches.next(), matches.next()) {
        (Some(rule), None) => Ok(rule.id.clone()),
        (None, _) => bail!("no rule matches {prefix}"),
        (Some(_), Some(_)) => bail!("{prefix} matches more than one rule"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn rule(id: &str, app: &str, minutes: i64, enabled: bool) -> NotificationRule {
        NotificationRule {
            id: RuleId::new(id).unwrap(),
            app_name: app.to_string(),
            time_limit_ms: minutes * 60_000,
            enabled,
            custom_message: None,
        }
    }

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let mut chat = rule("b7e2-chat", "Chat", 15, false);
        chat.custom_message = Some("Back to work".to_string());
        db.save_rules(&[rule("a1c9-browser", "Browser", 90, true), chat])
            .unwrap();
        db
    }

    fn exec(db: &mut Database, action: &RulesAction) -> String {
        let mut output = Vec::new();
        run(&mut output, db, action).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn lists_rules_in_insertion_order() {
        let mut db = seeded();
        assert_snapshot!(exec(&mut db, &RulesAction::List), @r#"
        a1c9-browser  Browser                1h 30m  on
        b7e2-chat  Chat                  15m 00s  off  "Back to work"
        "#);
    }

    #[test]
    fn add_appends_and_persists() {
        let mut db = seeded();
        let output = exec(
            &mut db,
            &RulesAction::Add {
                app: "Editor".to_string(),
                minutes: 45,
                message: None,
            },
        );
        assert!(output.starts_with("Added rule "));
        assert!(output.ends_with(" for Editor (45m 00s)\n"));

        let rules = db.load_rules().unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[2].app_name, "Editor");
        assert_eq!(rules[2].time_limit_ms, 2_700_000);
    }

    #[test]
    fn add_rejects_non_positive_limit() {
        let mut db = seeded();
        let action = RulesAction::Add {
            app: "Editor".to_string(),
            minutes: 0,
            message: None,
        };
        assert!(run(&mut Vec::new(), &mut db, &action).is_err());
        assert_eq!(db.load_rules().unwrap().len(), 2);
    }

    #[test]
    fn toggles_and_removes_by_prefix() {
        let mut db = seeded();
        let output = exec(&mut db, &RulesAction::Enable { id: "b7".to_string() });
        assert_snapshot!(output, @"Enabled rule b7e2-chat");
        assert!(db.load_rules().unwrap()[1].enabled);

        exec(&mut db, &RulesAction::Remove { id: "a1c9".to_string() });
        let rules = db.load_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].app_name, "Chat");
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        let mut db = seeded();
        let action = RulesAction::Disable { id: String::new() };
        let err = run(&mut Vec::new(), &mut db, &action).unwrap_err();
        assert!(err.to_string().contains("more than one rule"));
    }

    #[test]
    fn test_previews_without_saving() {
        let mut db = seeded();
        let action = RulesAction::Test {
            app: "browser".to_string(),
            minutes: 120,
        };
        assert_snapshot!(
            exec(&mut db, &action),
            @"a1c9-browser: You've spent 2h 0m on Browser. Time for a break!"
        );
        let action = RulesAction::Test {
            app: "Chat".to_string(),
            minutes: 120,
        };
        assert_snapshot!(exec(&mut db, &action), @"No rule would fire.");
    }
}
