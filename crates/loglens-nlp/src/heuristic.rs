//! Heuristic translation.
//!
//! Picks a target table with an ordered list of keyword rules (first match
//! wins) and composes a default query shape around it: time window, entity
//! filters, ordering and a row cap. No external calls are made, so this is
//! the path every failure degrades to.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::hints::{explicit_tables, LexicalHints};

/// Row cap appended to every row-returning query.
pub const ROW_LIMIT: u32 = 100;

/// Table used when no rule matches.
pub const DEFAULT_TABLE: &str = "AzureDiagnostics";

const DEFAULT_LOOKBACK: &str = "24h";

const FILTER_KEYWORDS: &[&str] = &[
    "filter", "where", "only", "specific", "named", "called", "from", "by", "for", "of", "with",
];

const RESOURCE_KEYWORDS: &[&str] = &[
    "vm", "vms", "server", "servers", "computer", "computers", "machine", "machines",
];

const HEALTH_TERMS: &[&str] = &[
    "availability", "available", "health", "status", "uptime", "alive", "running", "online",
    "offline", "reachable",
];
const PERF_TERMS: &[&str] = &["performance", "perf", "cpu", "memory", "disk", "processor"];
const ERROR_TERMS: &[&str] = &["error", "fail"];
const SUCCESS_TERMS: &[&str] = &["success", "succeeded"];
const CLIENT_TERMS: &[&str] = &["client", "source", "caller", "from", "origin", "remote", "user"];

// Words that follow a resource keyword without naming a resource.
const NOT_A_RESOURCE: &[&str] = &[
    "a", "an", "the", "my", "our", "is", "are", "was", "were", "with", "that", "which", "in",
    "on", "for", "of", "and", "or", "to", "from", "named", "called", "availability", "available",
    "health", "healthy", "status", "uptime", "alive", "running", "online", "offline", "up",
    "down", "performance", "perf", "cpu", "memory", "disk", "logs", "log", "errors", "error",
    "metrics", "heartbeat", "heartbeats", "usage", "events", "list", "count", "inventory",
    "reachable", "restarts", "restarted",
];

// Upper-case tokens that are vocabulary rather than resource names.
const ACRONYMS: &[&str] = &[
    "VM", "VMS", "CPU", "AKS", "IP", "HTTP", "HTTPS", "KQL", "API", "URL", "SQL", "ADF", "OS",
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "UTC", "ID",
];

lazy_static! {
    static ref HTTP_METHOD_UPPER: Regex =
        Regex::new(r"\b(GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS)\b").unwrap();
    static ref HTTP_METHOD_PHRASE: Regex = Regex::new(
        r"(?i)\b(get|post|put|delete|patch|head|options)\s+(requests?|calls?|methods?)\b"
    )
    .unwrap();
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").unwrap();
    static ref WORD: Regex = Regex::new(r"[A-Za-z0-9_]+").unwrap();
    // Whole words only: "serverless" is not a server.
    static ref VM_WORDS: Regex =
        Regex::new(r"(?i)\b(vms?|virtual machines?|servers?|computers?|machines?)\b").unwrap();

    /// Table rules in precedence order; rule 1 (explicit table name) runs before these.
    static ref TABLE_RULES: Vec<TableRule> = vec![
        TableRule {
            name: "vm-availability",
            table: "Heartbeat",
            matches: |i| {
                mentions_vm(i.text)
                    && mentions_any(i.text, HEALTH_TERMS)
                    && i.hints.status_codes.is_empty()
            },
        },
        TableRule {
            name: "vm-performance",
            table: "Perf",
            matches: |i| mentions_vm(i.text) && mentions_any(i.text, PERF_TERMS),
        },
        TableRule {
            name: "app-service",
            table: "AppServiceHTTPLogs",
            matches: |i| {
                mentions_any(
                    i.text,
                    &["app service", "appservice", "web app", "webapp", "website", "http log"],
                )
            },
        },
        TableRule {
            name: "functions",
            table: "FunctionAppLogs",
            matches: |i| mentions_any(i.text, &["function", "serverless"]),
        },
        TableRule {
            name: "activity",
            table: "AzureActivity",
            matches: |i| {
                mentions_any(
                    i.text,
                    &[
                        "activity", "audit", "who did", "who created", "who deleted",
                        "who changed", "change", "deploy", "created", "deleted", "modified",
                    ],
                )
            },
        },
        TableRule {
            name: "sign-in",
            table: "SigninLogs",
            matches: |i| {
                mentions_any(
                    i.text,
                    &["sign in", "sign-in", "signin", "login", "log in", "logon", "logged in", "authenticat"],
                )
            },
        },
        TableRule {
            name: "availability-test",
            table: "AppAvailabilityResults",
            matches: |i| {
                mentions(i.text, "availability")
                    && mentions_any(i.text, &["test", "web", "url", "ping", "site"])
            },
        },
        TableRule {
            name: "requests",
            table: "AppRequests",
            matches: |i| mentions_any(i.text, &["request", "api call"]),
        },
        TableRule {
            name: "exceptions",
            table: "AppExceptions",
            matches: |i| mentions_any(i.text, &["exception", "crash"]),
        },
        TableRule {
            name: "traces",
            table: "AppTraces",
            matches: |i| mentions(i.text, "trace"),
        },
        TableRule {
            name: "dependencies",
            table: "AppDependencies",
            matches: |i| mentions_any(i.text, &["dependenc", "external call"]),
        },
        TableRule {
            name: "security",
            table: "SecurityEvent",
            matches: |i| mentions_any(i.text, &["security", "threat", "alert"]),
        },
        TableRule {
            name: "containers",
            table: "ContainerLog",
            matches: |i| {
                mentions_any(i.text, &["container", "docker", "kubernetes", "k8s", "aks", "pod"])
            },
        },
        TableRule {
            name: "performance",
            table: "Perf",
            matches: |i| mentions_any(i.text, PERF_TERMS),
        },
        TableRule {
            name: "heartbeat",
            table: "Heartbeat",
            matches: |i| {
                mentions_any(i.text, &["heartbeat", "agent status"]) || mentions_vm(i.text)
            },
        },
        TableRule {
            name: "syslog",
            table: "Syslog",
            matches: |i| mentions_any(i.text, &["syslog", "linux"]),
        },
        TableRule {
            name: "windows-events",
            table: "Event",
            matches: |i| mentions_any(i.text, &["windows event", "event log", "eventlog"]),
        },
    ];
}

struct RuleInput<'a> {
    text: &'a str,
    hints: &'a LexicalHints,
}

struct TableRule {
    name: &'static str,
    table: &'static str,
    matches: fn(&RuleInput<'_>) -> bool,
}

/// The outcome of table selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSelection {
    pub table: String,
    /// Name of the rule that fired
    pub rule: String,
}

/// Time filter applied right after the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    /// `TimeGenerated > ago(<span>)`
    Lookback(String),
    /// The closed interval from 48h ago to 24h ago
    Yesterday,
}

impl TimeWindow {
    pub fn clause(&self) -> String {
        match self {
            Self::Lookback(span) => format!("| where TimeGenerated > ago({})", span),
            Self::Yesterday => "| where TimeGenerated between (ago(48h) .. ago(24h))".to_string(),
        }
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::Lookback(DEFAULT_LOOKBACK.to_string())
    }
}

/// Terminal shape of a heuristic query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryShape {
    /// Newest rows first, capped at [`ROW_LIMIT`]
    LatestRows,
    /// Latest heartbeat and count per resource
    HeartbeatSummary,
}

/// A fully composed heuristic query, kept structured until rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicPlan {
    pub selection: TableSelection,
    pub time: TimeWindow,
    pub resource: Option<String>,
    pub filters: Vec<String>,
    pub shape: QueryShape,
}

impl HeuristicPlan {
    /// Builds the plan for a question.
    pub fn build(question: &str, known_tables: &[String]) -> Self {
        let lower = question.trim().to_lowercase();
        let hints = LexicalHints::extract(question);
        let selection = select_table_with(question, &lower, &hints, known_tables);
        let table = selection.table.as_str();

        let time = infer_time_window(&lower, &hints);
        let resource = extract_resource_name(question);

        let mut filters = Vec::new();
        if let Some(name) = &resource {
            filters.push(format!("| where {} contains {}", resource_column(table), kql_string(name)));
        }
        if table == "Perf" {
            if let Some(counter) = perf_counter_filter(&lower) {
                filters.push(counter);
            }
        }
        if !hints.ip_addresses.is_empty() {
            filters.push(ip_filter(table, &hints.ip_addresses, &lower));
        }
        if !hints.emails.is_empty() {
            filters.push(email_filter(table, &hints.emails));
        }
        if let Some(status) = status_filter(table, &hints.status_codes, &lower) {
            filters.push(status);
        }
        if let Some(method) = method_filter(table, question) {
            filters.push(method);
        }

        let shape = if table == "Heartbeat" && resource.is_some() {
            QueryShape::HeartbeatSummary
        } else {
            QueryShape::LatestRows
        };

        debug!(
            table = %selection.table,
            rule = %selection.rule,
            filters = filters.len(),
            "Heuristic plan built"
        );

        Self {
            selection,
            time,
            resource,
            filters,
            shape,
        }
    }

    /// Renders the plan as KQL text.
    pub fn to_kql(&self) -> String {
        let mut parts = vec![self.selection.table.clone(), self.time.clause()];
        parts.extend(self.filters.iter().cloned());

        match self.shape {
            QueryShape::LatestRows => {
                parts.push("| order by TimeGenerated desc".to_string());
                parts.push(format!("| take {}", ROW_LIMIT));
            }
            QueryShape::HeartbeatSummary => {
                parts.push(
                    "| summarize LastHeartbeat = max(TimeGenerated), HeartbeatCount = count() by Computer, _ResourceId, OSType, OSName"
                        .to_string(),
                );
                parts.push("| order by LastHeartbeat desc".to_string());
            }
        }

        parts.join(" ")
    }
}

/// Heuristic-only translation of a question.
pub fn translate(question: &str, known_tables: &[String]) -> String {
    HeuristicPlan::build(question, known_tables).to_kql()
}

/// Chooses the target table; see the module docs for precedence.
pub fn select_table(question: &str, known_tables: &[String]) -> TableSelection {
    let lower = question.trim().to_lowercase();
    let hints = LexicalHints::extract(question);
    select_table_with(question, &lower, &hints, known_tables)
}

fn select_table_with(
    question: &str,
    lower: &str,
    hints: &LexicalHints,
    known_tables: &[String],
) -> TableSelection {
    let explicit = explicit_tables(question, known_tables);
    // A plain-word table name capitalised only because it opens the sentence
    // ("Update the ...") is not an explicit reference.
    let first_word = WORD.find(question).map(|m| m.as_str());
    if let Some(table) = explicit
        .into_iter()
        .find(|t| first_word != Some(t.as_str()) || question.trim() == t.as_str() || is_camel(t))
    {
        trace!(%table, "Explicit table named in question");
        return TableSelection {
            table,
            rule: "explicit-table".to_string(),
        };
    }

    let input = RuleInput { text: lower, hints };
    for rule in TABLE_RULES.iter() {
        if (rule.matches)(&input) {
            trace!(rule = rule.name, table = rule.table, "Table rule matched");
            return TableSelection {
                table: rule.table.to_string(),
                rule: rule.name.to_string(),
            };
        }
    }

    TableSelection {
        table: DEFAULT_TABLE.to_string(),
        rule: "default".to_string(),
    }
}

fn is_camel(table: &str) -> bool {
    table.contains('_') || table.chars().filter(|c| c.is_ascii_uppercase()).count() >= 2
}

/// True when the question names an entity or asks for filtering, in which
/// case catalog shortcuts must not answer it.
pub fn has_specific_intent(question: &str) -> bool {
    let hints = LexicalHints::extract(question);
    if !hints.ip_addresses.is_empty()
        || !hints.emails.is_empty()
        || !hints.status_codes.is_empty()
        || !hints.time_ranges.is_empty()
        || !hints.quoted.is_empty()
    {
        return true;
    }

    let lower = question.trim().to_lowercase();
    if has_time_phrase(&lower) {
        return true;
    }

    WORD.find_iter(&lower)
        .map(|m| m.as_str())
        .any(|w| FILTER_KEYWORDS.contains(&w) || RESOURCE_KEYWORDS.contains(&w))
}

fn has_time_phrase(lower: &str) -> bool {
    mentions_any(
        lower,
        &[
            "last hour", "past hour", "last week", "past week", "last month", "past month",
            "yesterday",
        ],
    )
}

/// Maps time phrases to a window; 24 hours when nothing is said.
pub fn infer_time_window(lower: &str, hints: &LexicalHints) -> TimeWindow {
    let lookback = |span: &str| TimeWindow::Lookback(span.to_string());

    if mentions_any(lower, &["last hour", "past hour", "1 hour"]) {
        lookback("1h")
    } else if mentions_any(lower, &["last 7 days", "last week", "past week", "7 days"]) {
        lookback("7d")
    } else if mentions_any(lower, &["last 30 days", "last month", "past month", "30 days"]) {
        lookback("30d")
    } else if mentions(lower, "today") {
        lookback(DEFAULT_LOOKBACK)
    } else if mentions(lower, "yesterday") {
        TimeWindow::Yesterday
    } else if let Some(range) = hints.time_ranges.first() {
        lookback(&range.to_kql())
    } else {
        TimeWindow::default()
    }
}

/// Finds a resource name: the token after a resource keyword, or a
/// capitalised identifier-like token such as `WEB-SRV01` or `SqlVm01`.
pub fn extract_resource_name(question: &str) -> Option<String> {
    let tokens: Vec<&str> = question
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| matches!(c, ',' | '?' | '!' | ';' | ':' | '(' | ')' | '"' | '\'')))
        .map(|t| t.trim_end_matches('.'))
        .filter(|t| !t.is_empty())
        .collect();

    let keywords: Vec<&str> = RESOURCE_KEYWORDS
        .iter()
        .copied()
        .chain(["host", "named", "called"])
        .collect();

    for pair in tokens.windows(2) {
        let (keyword, candidate) = (pair[0].to_lowercase(), pair[1]);
        if keywords.contains(&keyword.as_str()) && is_resource_candidate(candidate) {
            return Some(candidate.to_string());
        }
    }

    tokens
        .iter()
        .skip(1)
        .chain(tokens.first().filter(|t| t.chars().any(|c| c.is_ascii_digit() || c == '-')))
        .find(|t| looks_like_resource_id(t))
        .map(|t| t.to_string())
}

fn is_resource_candidate(token: &str) -> bool {
    let lower = token.to_lowercase();
    IDENTIFIER.is_match(token)
        && !NOT_A_RESOURCE.contains(&lower.as_str())
        && !RESOURCE_KEYWORDS.contains(&lower.as_str())
        && !ACRONYMS.contains(&token.to_uppercase().as_str())
        && !token.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn looks_like_resource_id(token: &str) -> bool {
    if !IDENTIFIER.is_match(token) || ACRONYMS.contains(&token) {
        return false;
    }
    let upper = token.chars().filter(|c| c.is_ascii_uppercase()).count();
    let marked = token.chars().any(|c| c.is_ascii_digit() || c == '-' || c == '_');
    let camel = token.chars().skip(1).any(|c| c.is_ascii_uppercase())
        && token.chars().any(|c| c.is_ascii_lowercase());
    upper > 0 && (marked || camel) && !is_table_name(token)
}

fn is_table_name(token: &str) -> bool {
    crate::catalog::COMMON_TABLES.contains(&token)
}

fn resource_column(table: &str) -> &'static str {
    match table {
        "Heartbeat" | "Perf" | "Event" | "Syslog" | "SecurityEvent" | "ContainerLog" => "Computer",
        "AzureDiagnostics" => "Resource",
        "FunctionAppLogs" => "AppName",
        "AppRequests" | "AppExceptions" | "AppTraces" | "AppDependencies" => "AppRoleName",
        "AppAvailabilityResults" => "Name",
        "SigninLogs" => "AppDisplayName",
        _ => "_ResourceId",
    }
}

fn perf_counter_filter(lower: &str) -> Option<String> {
    if mentions_any(lower, &["cpu", "processor"]) {
        Some("| where ObjectName == \"Processor\" and CounterName == \"% Processor Time\"".to_string())
    } else if mentions(lower, "memory") {
        Some("| where ObjectName == \"Memory\"".to_string())
    } else if mentions(lower, "disk") {
        Some("| where ObjectName == \"LogicalDisk\"".to_string())
    } else {
        None
    }
}

/// IP filter; the column depends on the table and on whether the question
/// talks about the client/source side of a connection.
fn ip_filter(table: &str, ips: &[String], lower: &str) -> String {
    let client_side = mentions_any(lower, CLIENT_TERMS);
    let columns: &[&str] = match table {
        "AppServiceHTTPLogs" => &["CIp"],
        "SigninLogs" => &["IPAddress"],
        "AzureActivity" => &["CallerIpAddress"],
        "AppRequests" | "AppExceptions" | "AppTraces" | "AppDependencies"
        | "AppAvailabilityResults" | "AppPageViews" => &["ClientIP"],
        "Heartbeat" => &["ComputerIP"],
        "SecurityEvent" => &["IpAddress"],
        "Syslog" => &["HostIP"],
        "AzureDiagnostics" if client_side => &["clientIP_s", "CallerIPAddress", "SourceIP"],
        "AzureDiagnostics" => &["clientIP_s", "CallerIPAddress", "SourceIP", "DestinationIP"],
        _ => &[],
    };

    if columns.is_empty() {
        let any: Vec<String> = ips.iter().map(|ip| format!("* has {}", kql_string(ip))).collect();
        return format!("| where {}", any.join(" or "));
    }

    let dynamic_schema = table == "AzureDiagnostics";
    let conditions: Vec<String> = columns
        .iter()
        .map(|col| {
            let column = if dynamic_schema {
                format!("column_ifexists(\"{}\", \"\")", col)
            } else {
                col.to_string()
            };
            match_values(&column, ips)
        })
        .collect();
    format!("| where {}", conditions.join(" or "))
}

fn email_filter(table: &str, emails: &[String]) -> String {
    match table {
        "SigninLogs" | "AADNonInteractiveUserSignInLogs" => {
            format!("| where {}", match_values("UserPrincipalName", emails))
        }
        "AzureActivity" => format!("| where {}", match_values("Caller", emails)),
        _ => {
            let any: Vec<String> = emails.iter().map(|e| format!("* has {}", kql_string(e))).collect();
            format!("| where {}", any.join(" or "))
        }
    }
}

/// Explicit status codes win; otherwise error or success wording maps to a
/// per-table predicate where the table has one.
fn status_filter(table: &str, codes: &[u16], lower: &str) -> Option<String> {
    if !codes.is_empty() {
        let list: Vec<String> = codes.iter().map(u16::to_string).collect();
        let numeric = |col: &str| {
            if list.len() == 1 {
                format!("{} == {}", col, list[0])
            } else {
                format!("{} in ({})", col, list.join(", "))
            }
        };
        let textual = |col: &str| {
            let quoted: Vec<String> = list.iter().map(|c| format!("\"{}\"", c)).collect();
            if quoted.len() == 1 {
                format!("{} == {}", col, quoted[0])
            } else {
                format!("{} in ({})", col, quoted.join(", "))
            }
        };
        let condition = match table {
            "AppServiceHTTPLogs" => numeric("ScStatus"),
            "AppRequests" | "AppDependencies" => textual("ResultCode"),
            _ => [
                numeric("toint(column_ifexists(\"httpStatusCode_d\", 0))"),
                numeric("toint(column_ifexists(\"ScStatus\", 0))"),
                textual("tostring(column_ifexists(\"ResultCode\", \"\"))"),
            ]
            .join(" or "),
        };
        return Some(format!("| where {}", condition));
    }

    let predicate = if mentions_any(lower, ERROR_TERMS) {
        error_predicate(table)
    } else if mentions_any(lower, SUCCESS_TERMS) {
        success_predicate(table)
    } else {
        None
    };
    predicate.map(|p| format!("| where {}", p))
}

fn error_predicate(table: &str) -> Option<&'static str> {
    match table {
        "AppServiceHTTPLogs" => Some("ScStatus >= 400"),
        "AppRequests" | "AppDependencies" | "AppAvailabilityResults" => Some("Success == false"),
        "AzureDiagnostics" => Some("Level == \"Error\" or Category contains \"Error\""),
        "AzureActivity" => Some("ActivityStatusValue in (\"Failure\", \"Failed\")"),
        "SigninLogs" => Some("ResultType != \"0\""),
        "FunctionAppLogs" => Some("Level == \"Error\""),
        "ContainerLog" => Some("LogEntrySource == \"stderr\""),
        "Syslog" => Some("SeverityLevel in (\"err\", \"crit\", \"alert\", \"emerg\")"),
        "Event" => Some("EventLevelName == \"Error\""),
        "AppTraces" => Some("SeverityLevel >= 3"),
        _ => None,
    }
}

fn success_predicate(table: &str) -> Option<&'static str> {
    match table {
        "AppServiceHTTPLogs" => Some("ScStatus < 400"),
        "AppRequests" | "AppDependencies" | "AppAvailabilityResults" => Some("Success == true"),
        "AzureActivity" => Some("ActivityStatusValue in (\"Success\", \"Succeeded\")"),
        "SigninLogs" => Some("ResultType == \"0\""),
        _ => None,
    }
}

fn method_filter(table: &str, question: &str) -> Option<String> {
    let method = HTTP_METHOD_UPPER
        .captures(question)
        .or_else(|| HTTP_METHOD_PHRASE.captures(question))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())?;

    let column = match table {
        "AppServiceHTTPLogs" => "CsMethod",
        "AzureDiagnostics" => "column_ifexists(\"httpMethod_s\", \"\")",
        _ => return None,
    };
    Some(format!("| where {} == \"{}\"", column, method))
}

fn match_values(column: &str, values: &[String]) -> String {
    if values.len() == 1 {
        format!("{} == {}", column, kql_string(&values[0]))
    } else {
        let list: Vec<String> = values.iter().map(|v| kql_string(v)).collect();
        format!("{} in ({})", column, list.join(", "))
    }
}

/// Double-quoted KQL string literal.
pub fn kql_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// True when `term` occurs in `text` starting at a word boundary.
pub(crate) fn mentions(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(i, _)| {
        text[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

/// True when `text` names a VM, server, computer or machine as a whole word.
pub(crate) fn mentions_vm(text: &str) -> bool {
    VM_WORDS.is_match(text)
}

pub(crate) fn mentions_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| mentions(text, t))
}
