//! Foreground application classification.
//!
//! Decides whether an application counts as user-attributable activity or is
//! system/background noise that must stay out of the totals. The decision is
//! a heuristic driven entirely by the static tables below; it is not a
//! security boundary, but it is deterministic for a given input.
//!
//! # Decision Order
//!
//! First match wins:
//!
//! 1. Display name is on [`DENIED_NAMES`] (ASCII case-insensitive).
//! 2. Bundle ID contains one of [`SYSTEM_BUNDLE_PATTERNS`] (case-insensitive).
//! 3. Display name is empty, whitespace-only, or a single character.
//! 4. Display name contains a generic [`ROLE_WORDS`] entry, unless it also
//!    contains an [`ALLOWED_WITH_ROLE_WORDS`] entry.
//! 5. Display name has no letters and no whitespace.

use crate::types::ApplicationIdentity;

/// Well-known system process names.
pub const DENIED_NAMES: &[&str] = &[
    // System processes
    "loginwindow",
    "WindowManager",
    "Dock",
    "Finder",
    "SystemUIServer",
    "notificationcenter",
    "UserEventAgent",
    "trustd",
    "cfprefsd",
    "distnoted",
    "apsd",
    "sharingd",
    "coreservicesd",
    "coreauthd",
    "syspolicyd",
    "securityd",
    "launchd",
    "kernel",
    "kernel_task",
    "mds",
    "mds_stores",
    "mdworker",
    "mdworker_shared",
    "fseventsd",
    // Login/authentication
    "login",
    "logind",
    "SecurityAgent",
    // Window/display managers
    "Window Server",
    "quartz-wm",
    "CoreDisplay",
    // Menu bar items
    "MenuBar",
    "StatusBar",
    "ControlCenter",
    "ControlStrip",
    // Cloud sync and background services
    "backgroundtaskmanagementagent",
    "bird",
    "cloudd",
    "com.apple.cloudd",
    "com.apple.iCloud",
    "nsurlsessiond",
    "nsurlstoraged",
    "softwareupdated",
    "storeassetd",
    // Power management
    "pmset",
    "powermanagementd",
    "thermald",
    // Audio/input
    "AudioComponentRegistrar",
    "coreaudiod",
    "AppleMultitouchDevice",
    "AppleHIDMouse",
    // Bluetooth/WiFi
    "bluetoothd",
    "wifid",
    "airportd",
    "networksetupd",
    // Printing
    "cupsd",
    "cups-browsed",
    // Other system utilities
    "ReportCrash",
    "diagnostics_agent",
    "spindump",
    "systemstats",
    "tmhelper",
    "tmutil",
    "TMRoutedVolume",
    // Placeholders reported when the probe cannot name the window
    "Unknown",
    "Untitled",
];

/// Bundle ID fragments identifying system namespaces.
pub const SYSTEM_BUNDLE_PATTERNS: &[&str] = &[
    "com.apple.loginwindow",
    "com.apple.windowmanager",
    "com.apple.dock",
    "com.apple.finder",
    "com.apple.systemuiserver",
    "com.apple.notificationcenter",
    "com.apple.usereventagent",
    "com.apple.trustd",
    "com.apple.cfprefsd",
    "com.apple.distnoted",
    "com.apple.apsd",
    "com.apple.sharingd",
    "com.apple.coreservicesd",
    "com.apple.coreauthd",
    "com.apple.syspolicyd",
    "com.apple.securityd",
    "com.apple.launchd",
    "com.apple.coredisplay",
    "com.apple.backgroundtaskmanagementagent",
    "com.apple.bird",
    "com.apple.cloudd",
    "com.apple.icloud",
    "com.apple.nsurlsessiond",
    "com.apple.nsurlstoraged",
    "com.apple.softwareupdated",
    "com.apple.storeassetd",
    "com.apple.pmset",
    "com.apple.powermanagementd",
    "com.apple.thermald",
    "com.apple.audiocomponentregistrar",
    "com.apple.coreaudiod",
    "com.apple.applemultitouchdevice",
    "com.apple.applehidmouse",
    "com.apple.bluetoothd",
    "com.apple.wifid",
    "com.apple.airportd",
    "com.apple.networksetupd",
    "com.apple.cupsd",
    "com.apple.cups-browsed",
    "com.apple.reportcrash",
    "com.apple.diagnostics_agent",
    "com.apple.spindump",
    "com.apple.systemstats",
    "com.apple.tmhelper",
    "com.apple.tmutil",
    "com.apple.tmroutedvolume",
];

/// Generic words that mark helper and background processes.
pub const ROLE_WORDS: &[&str] = &[
    "agent",
    "daemon",
    "helper",
    "service",
    "plugin",
    "extension",
    "update",
    "install",
];

/// Real applications whose names may contain a [`ROLE_WORDS`] entry.
pub const ALLOWED_WITH_ROLE_WORDS: &[&str] = &["spotify", "slack", "discord", "zoom", "teams"];

/// Returns `true` if the application must be excluded from usage totals.
///
/// Total over all inputs, including empty names and malformed bundle IDs.
pub fn should_filter(identity: &ApplicationIdentity) -> bool {
    let name = identity.display_name.as_str();

    if DENIED_NAMES
        .iter()
        .any(|denied| denied.eq_ignore_ascii_case(name))
    {
        return true;
    }

    let bundle = identity.bundle_id.to_lowercase();
    if SYSTEM_BUNDLE_PATTERNS
        .iter()
        .any(|pattern| bundle.contains(pattern))
    {
        return true;
    }

    if name.trim().is_empty() || name.chars().count() < 2 {
        return true;
    }

    let lowered = name.to_lowercase();
    if ROLE_WORDS.iter().any(|word| lowered.contains(word))
        && !ALLOWED_WITH_ROLE_WORDS
            .iter()
            .any(|allowed| lowered.contains(allowed))
    {
        return true;
    }

    // Purely numeric or symbolic process names.
    !name
        .chars()
        .any(|c| c.is_alphabetic() || c.is_whitespace())
}

/// Classifies a stored ledger key, which carries no bundle ID.
pub fn should_filter_name(display_name: &str) -> bool {
    should_filter(&ApplicationIdentity::from_name(display_name))
}
