//! SQL guard: validation of model-proposed statements before execution.
//!
//! This is keyword screening, not SQL parsing. The policy errs toward
//! rejection: a mutation keyword anywhere in the text refuses the statement,
//! even inside a string literal. The read-only connection behind it catches
//! anything that slips through.

/// Keywords that refuse a statement outright, wherever they appear.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "attach", "pragma", "replace",
    "truncate",
];

// ─── Verdicts ────────────────────────────────────────────────────────────────

/// Why the guard refused a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Blank input after trimming.
    EmptyQuery,
    /// A mutation keyword appeared somewhere in the text.
    ForbiddenKeyword { keyword: &'static str },
    /// More than one statement (a `;` beyond the trailing terminator).
    MultipleStatements,
    /// The statement is not a SELECT, nor a WITH chain ending in one.
    NotASelect,
}

impl RejectReason {
    /// Stable identifier for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::EmptyQuery => "empty_query",
            RejectReason::ForbiddenKeyword { .. } => "forbidden_keyword",
            RejectReason::MultipleStatements => "multiple_statements",
            RejectReason::NotASelect => "not_a_select",
        }
    }

    /// Instruction fed back to the model so it can correct the statement.
    pub fn hint(&self) -> String {
        match self {
            RejectReason::EmptyQuery => {
                "The query was empty. Provide a single SELECT statement.".into()
            }
            RejectReason::ForbiddenKeyword { keyword } => format!(
                "The query contains the forbidden keyword {}. Only read-only SELECT \
                 statements are allowed; rewrite the query without it.",
                keyword.to_uppercase()
            ),
            RejectReason::MultipleStatements => {
                "The query contains more than one statement. Submit exactly one SELECT \
                 statement with no embedded semicolons."
                    .into()
            }
            RejectReason::NotASelect => {
                "Only SELECT statements are allowed; a WITH chain must end in a \
                 SELECT. Rewrite the query as a single SELECT."
                    .into()
            }
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of guard validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Safe to execute; carries the normalized statement.
    Accepted { normalized: String },
    /// Refused; carries the reason.
    Rejected { reason: RejectReason },
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Validate a candidate statement against the read-only policy.
///
/// Normalization trims surrounding whitespace and strips at most one
/// trailing `;`, so accepted output re-validates to itself. Pure function;
/// callers log the verdict.
///
/// Checks run in a fixed order: blank input, forbidden keywords, statement
/// count, leading keyword. `DROP TABLE titles` therefore reports the
/// forbidden keyword, not the missing SELECT.
pub fn validate(raw: &str) -> Verdict {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Verdict::Rejected {
            reason: RejectReason::EmptyQuery,
        };
    }

    if let Some(keyword) = find_forbidden_keyword(trimmed) {
        return Verdict::Rejected {
            reason: RejectReason::ForbiddenKeyword { keyword },
        };
    }

    let normalized = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    if normalized.contains(';') {
        return Verdict::Rejected {
            reason: RejectReason::MultipleStatements,
        };
    }

    let leading = leading_keyword(normalized);
    let starts_select = leading.eq_ignore_ascii_case("select");
    let starts_with = leading.eq_ignore_ascii_case("with") && with_terminates_in_select(normalized);
    if !(starts_select || starts_with) {
        return Verdict::Rejected {
            reason: RejectReason::NotASelect,
        };
    }

    Verdict::Accepted {
        normalized: normalized.to_string(),
    }
}

/// Scan identifier-shaped tokens for a mutation keyword.
///
/// Tokens split at non-identifier boundaries, so `date_added` never matches
/// while a keyword inside a string literal still rejects.
fn find_forbidden_keyword(text: &str) -> Option<&'static str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .find_map(|token| {
            FORBIDDEN_KEYWORDS
                .iter()
                .copied()
                .find(|kw| token.eq_ignore_ascii_case(kw))
        })
}

/// The statement's leading identifier run.
fn leading_keyword(text: &str) -> &str {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    &text[..end]
}

/// Whether a WITH chain's terminal statement is a SELECT.
///
/// Skips the CTE list without parsing it: each entry is a name, an optional
/// column list in parens, AS, and a parenthesized body, comma-separated.
/// Whatever follows the last body must lead with SELECT. A SELECT inside a
/// CTE body never counts; unbalanced parens fall through to rejection.
fn with_terminates_in_select(text: &str) -> bool {
    let mut rest = text["with".len()..].trim_start();
    if leading_keyword(rest).eq_ignore_ascii_case("recursive") {
        rest = rest["recursive".len()..].trim_start();
    }
    loop {
        let Some(open) = rest.find('(') else {
            return false;
        };
        let Some(close) = matching_paren(rest, open) else {
            return false;
        };
        rest = rest[close + 1..].trim_start();
        if leading_keyword(rest).eq_ignore_ascii_case("as") {
            // That group was a column list; the body group follows.
            continue;
        }
        match rest.strip_prefix(',') {
            Some(tail) => rest = tail.trim_start(),
            None => return leading_keyword(rest).eq_ignore_ascii_case("select"),
        }
    }
}

/// Byte index of the `)` matching the `(` at `open`, if the text balances.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in text[open..].char_indices() {
        if c == '(' {
            depth += 1;
        } else if c == ')' {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(open + idx);
            }
        }
    }
    None
}

// ─── Tests ───────────────────────────────────────────────────────────────────
