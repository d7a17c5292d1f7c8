//! Prompt assembly for AI translation.

use crate::heuristic::{mentions, mentions_any, mentions_vm};
use crate::hints::LexicalHints;
use crate::overlay::OverlaySnapshot;

/// Fixed instructions sent ahead of any overlay context.
pub const RULE_SHEET: &str = "\
You translate questions about Azure Log Analytics data into KQL (Kusto Query Language).

## Table Disambiguation
- VM or server availability, health, uptime or \"is it running\" means Heartbeat, never AppAvailabilityResults.
- AppAvailabilityResults is only for web availability tests (URL ping tests).
- VM performance (cpu, memory, disk) means Perf filtered by ObjectName and CounterName.
- Who did what, resource changes and deployments mean AzureActivity.
- Sign-ins, logins and authentication mean SigninLogs.
- Web app or App Service HTTP traffic means AppServiceHTTPLogs.
- Application Insights data lives in AppRequests, AppExceptions, AppTraces and AppDependencies.
- Container and Kubernetes output means ContainerLog; Linux system logs mean Syslog; Windows event logs mean Event.
- When nothing else fits use AzureDiagnostics.

## Column Names
- Time: TimeGenerated on every table
- Machine: Computer (Heartbeat, Perf, Event, Syslog, SecurityEvent)
- HTTP status: ScStatus (AppServiceHTTPLogs), ResultCode (AppRequests, AppDependencies)
- HTTP method: CsMethod (AppServiceHTTPLogs)
- Client IP: CIp (AppServiceHTTPLogs), IPAddress (SigninLogs), CallerIpAddress (AzureActivity), ClientIP (App* tables)
- User: UserPrincipalName (SigninLogs), Caller (AzureActivity)
- Outcome: Success (AppRequests, AppDependencies), ResultType (SigninLogs), ActivityStatusValue (AzureActivity), Level (AzureDiagnostics)

## Output Rules
- Return ONLY the KQL query: no explanations, no markdown, no comments.
- Always include a time filter (default ago(24h)).
- Always limit raw rows with take 100 unless the query aggregates.";

/// Prefix of the user message; the question follows it verbatim.
pub const USER_PREFIX: &str = "Convert this to KQL: ";

const VM_AVAILABILITY_HINT: &str =
    "This asks about VM availability: use Heartbeat, not AppAvailabilityResults";

/// Builds the system message.
pub fn system_message(snapshot: &OverlaySnapshot, known_tables: &[String], max_tables: usize) -> String {
    let mut message = RULE_SHEET.to_string();

    let context = snapshot.context();
    if !context.is_empty() {
        message.push_str("\n\n");
        message.push_str(context);
    }

    let tables: Vec<&str> = known_tables
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(max_tables)
        .collect();
    if !tables.is_empty() {
        message.push_str("\n\nAvailable tables in this workspace: ");
        message.push_str(&tables.join(", "));
    }

    message
}

/// Builds the user message: the question followed by any hint bullets.
pub fn user_message(question: &str, hints: &LexicalHints, snapshot: &OverlaySnapshot) -> String {
    let lower = question.trim().to_lowercase();

    let mut notes = hints.lines();
    if asks_vm_availability(&lower) {
        notes.push(VM_AVAILABILITY_HINT.to_string());
    }
    for (alias, canonical) in snapshot.overlay().matching_aliases(&lower) {
        notes.push(format!("\"{}\" refers to resource {}", alias, canonical));
    }
    for mapping in snapshot.overlay().matching_table_mappings(&lower) {
        let mut note = format!("Operator rule: use table {}", mapping.table);
        if let Some(column) = &mapping.key_column {
            note.push_str(&format!(" keyed on {}", column));
        }
        notes.push(note);
    }

    let mut message = format!("{}{}", USER_PREFIX, question.trim());
    if !notes.is_empty() {
        message.push_str("\n\nHints:");
        for note in notes {
            message.push_str("\n- ");
            message.push_str(&note);
        }
    }
    message
}

fn asks_vm_availability(lower: &str) -> bool {
    mentions_vm(lower)
        && mentions_any(lower, &["availab", "uptime", "alive", "health", "up or down"])
        && !mentions(lower, "test")
}
