//! Server identity extracted opportunistically from the log.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Placeholder for metadata fields never discovered in the log. Downstream
/// display code renders it directly and never needs null-handling.
pub const UNKNOWN: &str = "Unknown";

/// Version banner, e.g. `(v11.16.2)` or `server version 11.4`. Shared with
/// the interpreter, which classifies matching lines as `Version`.
pub(crate) static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:\(v|\bserver version\s+v?)(\d+(?:\.\d+)+)").unwrap());

static PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blmgrd tcp-port (\d+)").unwrap());

static VENDOR_PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\busing tcp-port (\d+)").unwrap());

static LICENSE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blicense file\(s\):?\s+(\S+)").unwrap());

static PID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bpid (\d+)").unwrap());

static SERVER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bon host ([\w.\-]+)").unwrap());

static SERVER_STARTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bserver started on ([\w.\-]+)").unwrap());

/// Server identity derived once per log.
///
/// Every field starts as [`UNKNOWN`] and is filled by the first matching
/// line. `server_name` is the one exception: the specific
/// `Server started on <host>` pattern overrides a generic earlier capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerMetadata {
    pub server_name: String,
    pub version: String,
    pub port: String,
    pub vendor_port: String,
    pub pid: String,
    pub license_path: String,
}

impl Default for ServerMetadata {
    fn default() -> Self {
        Self {
            server_name: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            port: UNKNOWN.to_string(),
            vendor_port: UNKNOWN.to_string(),
            pid: UNKNOWN.to_string(),
            license_path: UNKNOWN.to_string(),
        }
    }
}

impl ServerMetadata {
    /// Extracts any metadata the message carries. Not mutually exclusive
    /// with event-kind classification: a single line may both set a field
    /// and classify as an event.
    pub(crate) fn observe(&mut self, message: &str) {
        set_if_unknown(&mut self.version, capture(&VERSION_RE, message));
        set_if_unknown(&mut self.port, capture(&PORT_RE, message));
        set_if_unknown(&mut self.vendor_port, capture(&VENDOR_PORT_RE, message));
        set_if_unknown(&mut self.license_path, capture(&LICENSE_PATH_RE, message));
        set_if_unknown(&mut self.pid, capture(&PID_RE, message));

        // The specific pattern may refine an already-set name.
        if let Some(name) = capture(&SERVER_STARTED_RE, message) {
            self.server_name = name;
        } else {
            set_if_unknown(&mut self.server_name, capture(&SERVER_NAME_RE, message));
        }
    }

    /// True if no field was ever discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn capture(re: &Regex, message: &str) -> Option<String> {
    re.captures(message).map(|caps| caps[1].to_string())
}

fn set_if_unknown(field: &mut String, value: Option<String>) {
    if field == UNKNOWN {
        if let Some(value) = value {
            *field = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_unknown_placeholders() {
        let metadata = ServerMetadata::default();
        assert_eq!(metadata.server_name, UNKNOWN);
        assert_eq!(metadata.license_path, UNKNOWN);
        assert!(metadata.is_empty());
    }

    #[test]
    fn extracts_ports_and_license_path() {
        let mut metadata = ServerMetadata::default();
        metadata.observe("lmgrd tcp-port 27000");
        metadata.observe("SW_D using TCP-port 49684");
        metadata.observe("License file(s): /opt/flexlm/license.dat");
        assert_eq!(metadata.port, "27000");
        assert_eq!(metadata.vendor_port, "49684");
        assert_eq!(metadata.license_path, "/opt/flexlm/license.dat");
    }

    #[test]
    fn first_match_wins_for_port_and_pid() {
        let mut metadata = ServerMetadata::default();
        metadata.observe("lmgrd tcp-port 27000 (pid 2715)");
        metadata.observe("lmgrd tcp-port 27001 (pid 9999)");
        assert_eq!(metadata.port, "27000");
        assert_eq!(metadata.pid, "2715");
    }

    #[test]
    fn version_banner_sets_version_once() {
        let mut metadata = ServerMetadata::default();
        metadata.observe("license manager (v11.16.2) started");
        metadata.observe("license manager (v12.0.1) restarted");
        assert_eq!(metadata.version, "11.16.2");
    }

    #[test]
    fn server_version_phrase_also_matches() {
        let mut metadata = ServerMetadata::default();
        metadata.observe("Detecting other license server manager, server version 11.4");
        assert_eq!(metadata.version, "11.4");
    }

    #[test]
    fn specific_server_started_overrides_generic_name() {
        let mut metadata = ServerMetadata::default();
        metadata.observe("license manager running on host licsrv01");
        assert_eq!(metadata.server_name, "licsrv01");
        metadata.observe("Server started on licsrv01.corp.example.com");
        assert_eq!(metadata.server_name, "licsrv01.corp.example.com");
    }

    #[test]
    fn generic_name_does_not_downgrade_specific_one() {
        let mut metadata = ServerMetadata::default();
        metadata.observe("Server started on licsrv01");
        metadata.observe("heartbeat on host otherbox");
        assert_eq!(metadata.server_name, "licsrv01");
    }

    #[test]
    fn unrelated_messages_leave_fields_untouched() {
        let mut metadata = ServerMetadata::default();
        metadata.observe(r#"OUT: "solidworks" alice@WS1"#);
        assert!(metadata.is_empty());
    }
}
