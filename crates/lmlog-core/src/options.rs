//! Codec for the line-oriented license options grammar.
//!
//! The model is edited incrementally by callers and serialized on demand;
//! it is independent of the log data. Import follows the same silent-skip
//! policy as the log parser: lines it cannot classify are ignored, so a
//! file with foreign directives degrades to a partial model instead of
//! failing.

use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for options rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// CAP and RESERVE rules always carry a positive seat count.
    #[error("{kind} rules require a positive seat count")]
    MissingCount { kind: RuleKind },
}

/// Rule directives, matching their textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Cap,
    Reserve,
    Include,
    Exclude,
    IncludeBorrow,
    ExcludeBorrow,
}

impl RuleKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cap => "CAP",
            Self::Reserve => "RESERVE",
            Self::Include => "INCLUDE",
            Self::Exclude => "EXCLUDE",
            Self::IncludeBorrow => "INCLUDE_BORROW",
            Self::ExcludeBorrow => "EXCLUDE_BORROW",
        }
    }

    /// Whether the directive carries a seat count field.
    #[must_use]
    pub const fn requires_count(&self) -> bool {
        matches!(self, Self::Cap | Self::Reserve)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized directive tokens.
#[derive(Debug, Clone)]
pub struct UnknownDirective(String);

impl fmt::Display for UnknownDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown directive: {}", self.0)
    }
}

impl std::error::Error for UnknownDirective {}

impl FromStr for RuleKind {
    type Err = UnknownDirective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CAP" => Ok(Self::Cap),
            "RESERVE" => Ok(Self::Reserve),
            "INCLUDE" => Ok(Self::Include),
            "EXCLUDE" => Ok(Self::Exclude),
            "INCLUDE_BORROW" => Ok(Self::IncludeBorrow),
            "EXCLUDE_BORROW" => Ok(Self::ExcludeBorrow),
            _ => Err(UnknownDirective(s.to_string())),
        }
    }
}

/// What a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Group,
    User,
    Host,
    Subnet,
}

impl TargetKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "GROUP",
            Self::User => "USER",
            Self::Host => "HOST",
            Self::Subnet => "SUBNET",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = UnknownDirective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GROUP" => Ok(Self::Group),
            "USER" => Ok(Self::User),
            "HOST" => Ok(Self::Host),
            "SUBNET" => Ok(Self::Subnet),
            _ => Err(UnknownDirective(s.to_string())),
        }
    }
}

/// One seat-allocation rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rule {
    pub kind: RuleKind,
    /// Seat count; present exactly when the kind requires one.
    pub count: Option<u32>,
    pub feature: String,
    /// Version filter from a `:SWVERSION=` suffix.
    pub version: Option<String>,
    pub target_kind: TargetKind,
    pub target: String,
}

impl Rule {
    /// Builds a validated rule. Counts on non-counting kinds are dropped;
    /// a missing or zero count on CAP/RESERVE is an error.
    pub fn new(
        kind: RuleKind,
        count: Option<u32>,
        feature: impl Into<String>,
        version: Option<String>,
        target_kind: TargetKind,
        target: impl Into<String>,
    ) -> Result<Self, OptionsError> {
        let count = if kind.requires_count() {
            match count {
                Some(count) if count > 0 => Some(count),
                _ => return Err(OptionsError::MissingCount { kind }),
            }
        } else {
            None
        };
        Ok(Self {
            kind,
            count,
            feature: feature.into(),
            version,
            target_kind,
            target: target.into(),
        })
    }
}

/// A named group of member identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub members: Vec<String>,
}

/// Global idle timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTimeout {
    pub enabled: bool,
    pub seconds: u32,
}

/// Per-feature idle timeout override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTimeout {
    pub feature: String,
    pub seconds: u32,
}

/// Structured license-policy configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsModel {
    pub global_timeout: GlobalTimeout,
    pub feature_timeouts: Vec<FeatureTimeout>,
    pub groups: Vec<Group>,
    pub rules: Vec<Rule>,
}

impl OptionsModel {
    /// Parses options text into a model. Comment, blank, and unrecognized
    /// lines are ignored.
    #[must_use]
    pub fn import(text: &str) -> Self {
        let mut model = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !model.import_line(line) {
                tracing::trace!(line, "ignoring unrecognized options line");
            }
        }
        model
    }

    /// Dispatches one non-comment line; returns false when unrecognized.
    fn import_line(&mut self, line: &str) -> bool {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(directive) = tokens.first() else {
            return false;
        };

        match directive.to_ascii_uppercase().as_str() {
            "TIMEOUTALL" => {
                let Some(seconds) = tokens.get(1).and_then(|t| t.parse().ok()) else {
                    return false;
                };
                self.global_timeout = GlobalTimeout {
                    enabled: true,
                    seconds,
                };
                true
            }
            "TIMEOUT" => {
                let (Some(feature), Some(seconds)) =
                    (tokens.get(1), tokens.get(2).and_then(|t| t.parse().ok()))
                else {
                    return false;
                };
                self.feature_timeouts.push(FeatureTimeout {
                    feature: (*feature).to_string(),
                    seconds,
                });
                true
            }
            "GROUP" => {
                let Some(name) = tokens.get(1) else {
                    return false;
                };
                self.groups.push(Group {
                    name: (*name).to_string(),
                    members: tokens[2..].iter().map(|t| (*t).to_string()).collect(),
                });
                true
            }
            directive => match directive.parse::<RuleKind>() {
                Ok(kind) => self.import_rule(kind, &tokens[1..]),
                Err(_) => false,
            },
        }
    }

    fn import_rule(&mut self, kind: RuleKind, args: &[&str]) -> bool {
        let (count, rest) = if kind.requires_count() {
            let Some(count) = args.first().and_then(|t| t.parse::<u32>().ok()) else {
                return false;
            };
            (Some(count), &args[1..])
        } else {
            (None, args)
        };

        let [feature, target_kind, target] = rest else {
            return false;
        };
        let Ok(target_kind) = target_kind.parse::<TargetKind>() else {
            return false;
        };
        let (feature, version) = split_version(feature);

        match Rule::new(kind, count, feature, version, target_kind, *target) {
            Ok(rule) => {
                self.rules.push(rule);
                true
            }
            Err(_) => false,
        }
    }

    /// Renders the model as options-file text. The output re-imports to an
    /// equivalent model.
    #[must_use]
    pub fn export(&self) -> String {
        let mut out = String::new();
        writeln!(out, "# License server options").unwrap();
        writeln!(out, "#").unwrap();

        if self.global_timeout.enabled {
            writeln!(out, "TIMEOUTALL {}", self.global_timeout.seconds).unwrap();
        } else {
            writeln!(out, "# no global idle timeout").unwrap();
        }

        for timeout in &self.feature_timeouts {
            writeln!(out, "TIMEOUT {} {}", timeout.feature, timeout.seconds).unwrap();
        }

        for group in &self.groups {
            if group.members.is_empty() {
                continue;
            }
            writeln!(out, "GROUP {} {}", group.name, group.members.join(" ")).unwrap();
        }

        for rule in &self.rules {
            let mut line = rule.kind.as_str().to_string();
            if let Some(count) = rule.count {
                write!(line, " {count}").unwrap();
            }
            write!(line, " {}", rule.feature).unwrap();
            if let Some(version) = &rule.version {
                write!(line, ":SWVERSION={version}").unwrap();
            }
            write!(line, " {} {}", rule.target_kind, rule.target).unwrap();
            writeln!(out, "{line}").unwrap();
        }

        out
    }

    /// All user identifiers the model references: group members plus
    /// user-targeted rule targets.
    #[must_use]
    pub fn referenced_identifiers(&self) -> BTreeSet<String> {
        let mut identifiers: BTreeSet<String> = self
            .groups
            .iter()
            .flat_map(|group| group.members.iter().cloned())
            .collect();
        identifiers.extend(
            self.rules
                .iter()
                .filter(|rule| rule.target_kind == TargetKind::User)
                .map(|rule| rule.target.clone()),
        );
        identifiers
    }

    /// Identifiers referenced by the model that do not appear in `known`
    /// (typically the log's session users). These are retained so callers
    /// can still present them.
    #[must_use]
    pub fn custom_identifiers(&self, known: &BTreeSet<String>) -> BTreeSet<String> {
        self.referenced_identifiers()
            .into_iter()
            .filter(|identifier| !known.contains(identifier))
            .collect()
    }
}

/// Splits a `feature:SWVERSION=<v>` token into feature and version.
fn split_version(token: &str) -> (String, Option<String>) {
    match token.split_once(':') {
        Some((feature, suffix)) => match suffix.split_once('=') {
            Some((key, version)) if key.eq_ignore_ascii_case("SWVERSION") => {
                (feature.to_string(), Some(version.to_string()))
            }
            _ => (token.to_string(), None),
        },
        None => (token.to_string(), None),
    }
}
