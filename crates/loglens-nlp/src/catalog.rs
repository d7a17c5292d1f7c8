//! Static query catalog.
//!
//! A fixed phrase-to-query table for the most common questions. Keys are
//! lowercase and trimmed; lookups normalise the input the same way. The
//! table is never mutated after start-up, so concurrent reads need no
//! synchronisation.

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

/// Minimum key length considered by [`lookup_partial`]; shorter keys ("adf",
/// "k8s", "vms") would match inside too many unrelated words.
pub const MIN_PARTIAL_KEY_LEN: usize = 4;

/// One canonical phrase and its complete query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CatalogEntry {
    pub phrase: &'static str,
    pub query: &'static str,
}

const fn entry(phrase: &'static str, query: &'static str) -> CatalogEntry {
    CatalogEntry { phrase, query }
}

/// Entries in scan order; the substring scan returns the first hit.
pub static ENTRIES: &[CatalogEntry] = &[
    entry(
        "errors",
        "AzureDiagnostics | where Level == 'Error' or Category contains 'Error' | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "error",
        "AzureDiagnostics | where Level == 'Error' or Category contains 'Error' | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "exceptions",
        "AppExceptions | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "exception",
        "AppExceptions | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "failures",
        "AppRequests | where Success == false | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "failed",
        "AppRequests | where Success == false | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "crashes",
        "AppExceptions | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "app service",
        "AppServiceHTTPLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "app service logs",
        "AppServiceHTTPLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "appservice",
        "AppServiceHTTPLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "web app",
        "AppServiceHTTPLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "web app logs",
        "AppServiceHTTPLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "webapp",
        "AppServiceHTTPLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "website",
        "AppServiceHTTPLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "http logs",
        "AppServiceHTTPLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "console logs",
        "AppServiceConsoleLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "function",
        "FunctionAppLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "functions",
        "FunctionAppLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "function logs",
        "FunctionAppLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "azure functions",
        "FunctionAppLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "serverless",
        "FunctionAppLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "activity",
        "AzureActivity | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "activity logs",
        "AzureActivity | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "audit",
        "AzureActivity | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "audit logs",
        "AuditLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "who did",
        "AzureActivity | where TimeGenerated > ago(24h) | project TimeGenerated, Caller, OperationNameValue, ResourceGroup, _ResourceId | order by TimeGenerated desc | take 100",
    ),
    entry(
        "changes",
        "AzureActivity | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "deployments",
        "AzureActivity | where OperationNameValue contains 'deploy' or OperationNameValue contains 'write' | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "sign in",
        "SigninLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "signin",
        "SigninLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "sign-in",
        "SigninLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "login",
        "SigninLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "logins",
        "SigninLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "logon",
        "SigninLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "authentication",
        "SigninLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "who logged in",
        "SigninLogs | where TimeGenerated > ago(24h) | project TimeGenerated, UserPrincipalName, AppDisplayName, IPAddress, Location, Status | order by TimeGenerated desc | take 100",
    ),
    entry(
        "failed logins",
        "SigninLogs | where ResultType != '0' | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "performance",
        "Perf | where TimeGenerated > ago(1h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "perf",
        "Perf | where TimeGenerated > ago(1h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "cpu",
        "Perf | where ObjectName == 'Processor' and CounterName == '% Processor Time' | where TimeGenerated > ago(1h) | summarize AvgCPU=avg(CounterValue) by Computer, bin(TimeGenerated, 5m) | order by TimeGenerated desc",
    ),
    entry(
        "cpu usage",
        "Perf | where ObjectName == 'Processor' and CounterName == '% Processor Time' | where TimeGenerated > ago(1h) | summarize AvgCPU=avg(CounterValue) by Computer, bin(TimeGenerated, 5m) | order by TimeGenerated desc",
    ),
    entry(
        "memory",
        "Perf | where ObjectName == 'Memory' and CounterName == '% Committed Bytes In Use' | where TimeGenerated > ago(1h) | summarize AvgMemory=avg(CounterValue) by Computer, bin(TimeGenerated, 5m) | order by TimeGenerated desc",
    ),
    entry(
        "memory usage",
        "Perf | where ObjectName == 'Memory' and CounterName == '% Committed Bytes In Use' | where TimeGenerated > ago(1h) | summarize AvgMemory=avg(CounterValue) by Computer, bin(TimeGenerated, 5m) | order by TimeGenerated desc",
    ),
    entry(
        "disk",
        "Perf | where ObjectName == 'LogicalDisk' and CounterName == '% Free Space' | where TimeGenerated > ago(1h) | summarize AvgFreeSpace=avg(CounterValue) by Computer, InstanceName, bin(TimeGenerated, 5m) | order by TimeGenerated desc",
    ),
    entry(
        "disk usage",
        "Perf | where ObjectName == 'LogicalDisk' and CounterName == '% Free Space' | where TimeGenerated > ago(1h) | summarize AvgFreeSpace=avg(CounterValue) by Computer, InstanceName, bin(TimeGenerated, 5m) | order by TimeGenerated desc",
    ),
    entry(
        "heartbeat",
        "Heartbeat | summarize LastHeartbeat=max(TimeGenerated) by Computer, OSType, Version | order by LastHeartbeat desc | take 100",
    ),
    entry(
        "vm health",
        "Heartbeat | summarize LastHeartbeat=max(TimeGenerated) by Computer, OSType | order by LastHeartbeat desc | take 100",
    ),
    entry(
        "virtual machines",
        "Heartbeat | summarize LastHeartbeat=max(TimeGenerated) by Computer, OSType, ComputerEnvironment | order by LastHeartbeat desc | take 100",
    ),
    entry(
        "vms",
        "Heartbeat | summarize LastHeartbeat=max(TimeGenerated) by Computer, OSType | order by LastHeartbeat desc | take 100",
    ),
    entry(
        "computers",
        "Heartbeat | summarize LastHeartbeat=max(TimeGenerated) by Computer, OSType | order by LastHeartbeat desc | take 100",
    ),
    entry(
        "container",
        "ContainerLog | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "containers",
        "ContainerLog | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "container logs",
        "ContainerLog | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "docker",
        "ContainerLog | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "kubernetes",
        "KubeEvents | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "k8s",
        "KubeEvents | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "aks",
        "KubeEvents | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "pods",
        "KubePodInventory | where TimeGenerated > ago(1h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "kube events",
        "KubeEvents | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "security",
        "SecurityEvent | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "security events",
        "SecurityEvent | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "security alerts",
        "SecurityAlert | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "alerts",
        "SecurityAlert | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "threats",
        "SecurityAlert | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "requests",
        "AppRequests | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "traces",
        "AppTraces | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "dependencies",
        "AppDependencies | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "page views",
        "AppPageViews | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "availability",
        "AppAvailabilityResults | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "diagnostics",
        "AzureDiagnostics | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "diagnostic logs",
        "AzureDiagnostics | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "resource logs",
        "AzureDiagnostics | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "syslog",
        "Syslog | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "linux logs",
        "Syslog | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "windows events",
        "Event | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "event log",
        "Event | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "events",
        "Event | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "data factory",
        "ADFActivityRun | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "adf",
        "ADFActivityRun | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "pipeline",
        "ADFPipelineRun | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "storage",
        "StorageBlobLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "blob",
        "StorageBlobLogs | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "sql",
        "AzureDiagnostics | where ResourceProvider == 'MICROSOFT.SQL' | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "database",
        "AzureDiagnostics | where ResourceProvider == 'MICROSOFT.SQL' or ResourceProvider == 'MICROSOFT.DBFORMYSQL' or ResourceProvider == 'MICROSOFT.DBFORPOSTGRESQL' | where TimeGenerated > ago(24h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "metrics",
        "AzureMetrics | where TimeGenerated > ago(1h) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "updates",
        "Update | where TimeGenerated > ago(7d) | order by TimeGenerated desc | take 100",
    ),
    entry(
        "patches",
        "Update | where TimeGenerated > ago(7d) | order by TimeGenerated desc | take 100",
    ),
];

/// Well-known workspace tables, used for explicit-table detection and as the
/// listing fallback when a workspace cannot enumerate its own tables.
pub static COMMON_TABLES: &[&str] = &[
    "AppServiceHTTPLogs",
    "AppServiceConsoleLogs",
    "AppServiceAppLogs",
    "AppServiceAuditLogs",
    "AppServiceFileAuditLogs",
    "AppServicePlatformLogs",
    "AppServiceAuthenticationLogs",
    "FunctionAppLogs",
    "AppTraces",
    "AppRequests",
    "AppExceptions",
    "AppDependencies",
    "AppEvents",
    "AppMetrics",
    "AppPageViews",
    "AppBrowserTimings",
    "AppPerformanceCounters",
    "AppAvailabilityResults",
    "AppSystemEvents",
    "AzureActivity",
    "AzureDiagnostics",
    "AzureMetrics",
    "SigninLogs",
    "AADNonInteractiveUserSignInLogs",
    "AADServicePrincipalSignInLogs",
    "AADManagedIdentitySignInLogs",
    "AuditLogs",
    "SecurityEvent",
    "SecurityAlert",
    "SecurityIncident",
    "SecurityRecommendation",
    "CommonSecurityLog",
    "Syslog",
    "Heartbeat",
    "Perf",
    "Event",
    "VMConnection",
    "InsightsMetrics",
    "VMBoundPort",
    "VMComputer",
    "VMProcess",
    "ContainerLog",
    "ContainerLogV2",
    "ContainerInventory",
    "ContainerImageInventory",
    "ContainerNodeInventory",
    "KubeEvents",
    "KubePodInventory",
    "KubeNodeInventory",
    "KubeServices",
    "KubeMonAgentEvents",
    "AKSAudit",
    "AKSAuditAdmin",
    "AKSControlPlane",
    "AzureNetworkAnalytics_CL",
    "NetworkMonitoring",
    "AzureFirewallApplicationRule",
    "AzureFirewallNetworkRule",
    "AzureFirewallDnsProxy",
    "SQLSecurityAuditEvents",
    "StorageBlobLogs",
    "StorageFileLogs",
    "StorageQueueLogs",
    "StorageTableLogs",
    "ADFActivityRun",
    "ADFPipelineRun",
    "ADFTriggerRun",
    "AutoscaleEvaluationsLog",
    "AutoscaleScaleActionsLog",
    "Operation",
    "Usage",
    "Update",
    "UpdateSummary",
];

lazy_static! {
    static ref INDEX: HashMap<&'static str, &'static str> =
        ENTRIES.iter().map(|e| (e.phrase, e.query)).collect();
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Exact lookup on the lowercased, trimmed input.
pub fn lookup_exact(text: &str) -> Option<&'static str> {
    INDEX.get(normalize(text).as_str()).copied()
}

/// First entry (in catalog order) whose key occurs inside the input.
///
/// Keys shorter than [`MIN_PARTIAL_KEY_LEN`] are skipped. Matching is plain
/// substring containment without word boundaries, so "function" also hits
/// "malfunction". Callers must apply the specific-intent gate first.
pub fn lookup_partial(text: &str) -> Option<&'static CatalogEntry> {
    let normalized = normalize(text);
    let hit = ENTRIES
        .iter()
        .filter(|e| e.phrase.len() >= MIN_PARTIAL_KEY_LEN)
        .find(|e| normalized.contains(e.phrase));
    if let Some(entry) = hit {
        trace!(phrase = entry.phrase, "Partial catalog match");
    }
    hit
}

/// True when the input is exactly a catalog key.
pub fn is_key(text: &str) -> bool {
    lookup_exact(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique_and_normalized() {
        let mut seen = HashSet::new();
        for entry in ENTRIES {
            assert_eq!(entry.phrase, normalize(entry.phrase));
            assert!(seen.insert(entry.phrase), "duplicate key {}", entry.phrase);
            assert!(!entry.query.trim().is_empty());
        }
    }

    #[test]
    fn test_exact_lookup_is_case_insensitive() {
        assert_eq!(
            lookup_exact("  HeartBeat "),
            Some("Heartbeat | summarize LastHeartbeat=max(TimeGenerated) by Computer, OSType, Version | order by LastHeartbeat desc | take 100")
        );
        assert!(lookup_exact("heartbeats please").is_none());
    }

    #[test]
    fn test_partial_lookup_prefers_catalog_order() {
        let entry = lookup_partial("show me errors").unwrap();
        assert_eq!(entry.phrase, "errors");
    }

    #[test]
    fn test_partial_lookup_skips_short_keys() {
        assert!(lookup_partial("adf stuff").is_none());
        assert!(lookup_partial("k8s").is_none());
    }

    #[test]
    fn test_partial_lookup_has_no_word_boundaries() {
        let entry = lookup_partial("malfunctioning widgets").unwrap();
        assert_eq!(entry.phrase, "function");
    }

    #[test]
    fn test_every_query_has_row_cap_or_aggregation() {
        for entry in ENTRIES {
            assert!(
                entry.query.contains("take 100") || entry.query.contains("summarize"),
                "{} has neither a row cap nor an aggregation",
                entry.phrase
            );
        }
    }
}
