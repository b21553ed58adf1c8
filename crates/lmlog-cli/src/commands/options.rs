//! Options subcommands: validate and canonicalize options files.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};
use lmlog_core::{OptionsModel, Rule};
use serde::Serialize;

use super::util;

/// JSON payload for `options validate --json`.
#[derive(Debug, Serialize)]
struct ValidateJson {
    global_timeout_enabled: bool,
    feature_timeouts: usize,
    groups: usize,
    rules: usize,
    roundtrip_ok: bool,
    custom_identifiers: Vec<String>,
}

/// Runs `options validate`.
pub fn validate(file: &Path, log: Option<&Path>, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let model = OptionsModel::import(&text);
    let roundtrip_ok = equivalent(&model, &OptionsModel::import(&model.export()));

    let custom_identifiers = match log {
        Some(log) => {
            let parsed = util::load_log(log)?;
            let known: BTreeSet<String> =
                parsed.sessions.iter().map(|s| s.user.clone()).collect();
            model.custom_identifiers(&known).into_iter().collect()
        }
        None => Vec::new(),
    };

    if json {
        let payload = ValidateJson {
            global_timeout_enabled: model.global_timeout.enabled,
            feature_timeouts: model.feature_timeouts.len(),
            groups: model.groups.len(),
            rules: model.rules.len(),
            roundtrip_ok,
            custom_identifiers,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print!(
            "{}",
            format_validation(&model, roundtrip_ok, &custom_identifiers)
        );
    }

    Ok(())
}

/// Runs `options normalize`: import then re-export canonical text.
pub fn normalize(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    print!("{}", OptionsModel::import(&text).export());
    Ok(())
}

/// Formats the validation summary.
#[must_use]
pub fn format_validation(
    model: &OptionsModel,
    roundtrip_ok: bool,
    custom_identifiers: &[String],
) -> String {
    let mut output = String::new();

    if model.global_timeout.enabled {
        writeln!(
            output,
            "Global idle timeout: {}s",
            model.global_timeout.seconds
        )
        .unwrap();
    } else {
        writeln!(output, "Global idle timeout: disabled").unwrap();
    }
    writeln!(
        output,
        "{} feature timeouts, {} groups, {} rules",
        model.feature_timeouts.len(),
        model.groups.len(),
        model.rules.len()
    )
    .unwrap();
    writeln!(
        output,
        "Round-trip: {}",
        if roundtrip_ok { "ok" } else { "FAILED" }
    )
    .unwrap();

    if !custom_identifiers.is_empty() {
        writeln!(
            output,
            "Identifiers not seen in the log: {}",
            custom_identifiers.join(", ")
        )
        .unwrap();
    }

    output
}

/// Model equivalence per the round-trip contract: identical timeouts,
/// groups compared as (name, member set), rules compared as an unordered
/// collection.
fn equivalent(a: &OptionsModel, b: &OptionsModel) -> bool {
    let group_sets = |model: &OptionsModel| -> BTreeSet<(String, BTreeSet<String>)> {
        model
            .groups
            .iter()
            .filter(|group| !group.members.is_empty())
            .map(|group| {
                (
                    group.name.clone(),
                    group.members.iter().cloned().collect(),
                )
            })
            .collect()
    };
    let sorted_rules = |model: &OptionsModel| -> Vec<Rule> {
        let mut rules = model.rules.clone();
        rules.sort();
        rules
    };

    a.global_timeout == b.global_timeout
        && a.feature_timeouts == b.feature_timeouts
        && group_sets(a) == group_sets(b)
        && sorted_rules(a) == sorted_rules(b)
}
