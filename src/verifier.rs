//! Query Safety Verifier
//!
//! Decides whether a model-generated SQL++ string may run against a live
//! dataverse. Checks are textual and conservative: a safe query may be
//! rejected, a mutating or unbounded one must not pass.

use crate::packager::QueryPackage;
use lazy_static::lazy_static;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use tracing::{info, warn};

// Fixed verb list. SQL++ UPSERT is not on it and passes this check.
lazy_static! {
    static ref UNSAFE_VERB: Regex = Regex::new(r"(?i)\b(DROP|DELETE|UPDATE|ALTER|INSERT)\b").unwrap();
    static ref SELECT_KEYWORD: Regex = Regex::new(r"(?i)\bSELECT\b").unwrap();
    static ref FROM_KEYWORD: Regex = Regex::new(r"(?i)\bFROM\b").unwrap();
    static ref LIMIT_CLAUSE: Regex = Regex::new(r"(?i)\bLIMIT\s+\d+\b").unwrap();
}

/// One named predicate of the verification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationCheck {
    NoUnsafeCommands,
    HasRequiredClauses,
    HasLimit,
    ValidDataverse,
    HasMetadata,
}

impl VerificationCheck {
    /// Canonical evaluation and reporting order.
    pub const ALL: [VerificationCheck; 5] = [
        VerificationCheck::NoUnsafeCommands,
        VerificationCheck::HasRequiredClauses,
        VerificationCheck::HasLimit,
        VerificationCheck::ValidDataverse,
        VerificationCheck::HasMetadata,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VerificationCheck::NoUnsafeCommands => "noUnsafeCommands",
            VerificationCheck::HasRequiredClauses => "hasRequiredClauses",
            VerificationCheck::HasLimit => "hasLimit",
            VerificationCheck::ValidDataverse => "validDataverse",
            VerificationCheck::HasMetadata => "hasMetadata",
        }
    }

    fn evaluate(&self, pkg: &QueryPackage) -> bool {
        match self {
            VerificationCheck::NoUnsafeCommands => no_unsafe_commands(pkg.query()),
            VerificationCheck::HasRequiredClauses => has_required_clauses(pkg.query()),
            VerificationCheck::HasLimit => has_limit(pkg.query()),
            VerificationCheck::ValidDataverse => !pkg.dataverse_name().is_empty(),
            VerificationCheck::HasMetadata => !pkg.metadata().is_empty(),
        }
    }
}

impl fmt::Display for VerificationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub check: VerificationCheck,
    pub passed: bool,
}

/// Verdict plus every individual check, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub passed: bool,
    checks: Vec<CheckOutcome>,
}

impl VerificationResult {
    pub fn checks(&self) -> &[CheckOutcome] {
        &self.checks
    }

    pub fn get(&self, check: VerificationCheck) -> Option<bool> {
        self.checks
            .iter()
            .find(|outcome| outcome.check == check)
            .map(|outcome| outcome.passed)
    }

    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|outcome| !outcome.passed)
            .map(|outcome| outcome.check.name())
            .collect()
    }
}

// Serialized as `{"passed": bool, "checks": {name: bool, ...}}` with keys in canonical order.
impl Serialize for VerificationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Checks<'a>(&'a [CheckOutcome]);

        impl Serialize for Checks<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for outcome in self.0 {
                    map.serialize_entry(outcome.check.name(), &outcome.passed)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("passed", &self.passed)?;
        map.serialize_entry("checks", &Checks(&self.checks))?;
        map.end()
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.checks {
            writeln!(
                f,
                "- {}: {}",
                outcome.check,
                if outcome.passed { "PASSED" } else { "FAILED" }
            )?;
        }
        Ok(())
    }
}

/// Stateless safety gate. Safe to share across tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyVerifier;

impl SafetyVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn verify(&self, pkg: &QueryPackage) -> VerificationResult {
        let checks: Vec<CheckOutcome> = VerificationCheck::ALL
            .iter()
            .map(|check| CheckOutcome {
                check: *check,
                passed: check.evaluate(pkg),
            })
            .collect();
        let passed = checks.iter().all(|outcome| outcome.passed);
        let result = VerificationResult { passed, checks };

        if passed {
            info!(package = %pkg.id(), "Query verification passed");
        } else {
            warn!(
                package = %pkg.id(),
                failed = ?result.failed_checks(),
                "Query verification failed"
            );
        }
        for outcome in result.checks() {
            info!(
                package = %pkg.id(),
                "- {}: {}",
                outcome.check,
                if outcome.passed { "PASSED" } else { "FAILED" }
            );
        }

        result
    }
}

/// Whole-word mutating verb anywhere in the text, string literals included.
pub fn no_unsafe_commands(query: &str) -> bool {
    !UNSAFE_VERB.is_match(query)
}

pub fn has_required_clauses(query: &str) -> bool {
    SELECT_KEYWORD.is_match(query) && FROM_KEYWORD.is_match(query)
}

pub fn has_limit(query: &str) -> bool {
    LIMIT_CLAUSE.is_match(query)
}
