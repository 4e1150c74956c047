pub mod extract;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::core::endpoint::ServiceEndpoint;
use crate::core::transport::{ApiRequest, Transport, fetch_text};

pub use extract::extract_field;
use extract::{FirstWins, field_text};

pub const UNNAMED_VM: &str = "Unnamed";
pub const UNKNOWN_STATUS: &str = "unknown";

const EASY_KILL_TAG: &str = "easy-kill";
static FLAT_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").ok());

/// One VM as reported by the service listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmRecord {
    #[serde(rename = "vmid")]
    id: u64,
    name: String,
    status: String,
    tags: Vec<String>,
    notes: Option<String>,
}

impl VmRecord {
    /// Absent or empty `name`/`status` fall back to `"Unnamed"` / `"unknown"`.
    pub fn new(id: u64, name: Option<String>, status: Option<String>) -> Self {
        Self {
            id,
            name: non_empty(name).unwrap_or_else(|| UNNAMED_VM.to_string()),
            status: non_empty(status).unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
            tags: Vec::new(),
            notes: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = non_empty(notes);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }

    /// The service stops VMs carrying this tag without asking the operator.
    pub fn is_easy_kill(&self) -> bool {
        self.tags
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(EASY_KILL_TAG))
    }
}

impl fmt::Display for VmRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{}) - {}", self.name, self.id, self.status)
    }
}

/// Fetches `GET {base}/api/vms` and parses whatever comes back.
pub async fn list_vms(transport: &dyn Transport, endpoint: &ServiceEndpoint) -> Vec<VmRecord> {
    let body = fetch_text(transport, &ApiRequest::get(endpoint.vms_url())).await;
    let vms = parse_vm_list(&body);
    info!("Loaded {} VMs from {}", vms.len(), endpoint);
    vms
}

/// Turns a listing body into records, in source order, duplicates included.
///
/// The body is read as a stream of JSON values. Arrays are walked element by element;
/// an object with a `vmid` key is one record, any other object is searched for nested
/// records. If the stream breaks on malformed text, the records read so far are kept
/// and the rest of the body is scanned for flat `{...}` spans.
pub fn parse_vm_list(body: &str) -> Vec<VmRecord> {
    let mut records = Vec::new();
    let mut stream = serde_json::Deserializer::from_str(body).into_iter::<FirstWins>();

    loop {
        match stream.next() {
            Some(Ok(FirstWins(value))) => collect_records(&value, &mut records),
            Some(Err(err)) => {
                let offset = stream.byte_offset();
                debug!("VM list is not clean JSON past byte {}: {}", offset, err);
                scan_records(body.get(offset..).unwrap_or_default(), &mut records);
                break;
            }
            None => break,
        }
    }

    records
}

fn collect_records(value: &Value, out: &mut Vec<VmRecord>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_records(item, out);
            }
        }
        Value::Object(map) if map.contains_key("vmid") => match record_from_map(map) {
            Some(record) => out.push(record),
            None => debug!("Skipping VM entry with unusable vmid: {}", value),
        },
        Value::Object(map) => {
            let nested = map.values().any(|v| v.is_object() || v.is_array());
            if !nested {
                debug!("Skipping VM entry without vmid: {}", value);
            }
            for child in map.values() {
                collect_records(child, out);
            }
        }
        _ => {}
    }
}

fn record_from_map(map: &Map<String, Value>) -> Option<VmRecord> {
    let id = map.get("vmid").and_then(parse_vmid)?;
    let name = map.get("name").and_then(field_text);
    let status = map.get("status").and_then(field_text);
    let notes = map.get("notes").and_then(Value::as_str).map(str::to_string);

    Some(
        VmRecord::new(id, name, status)
            .with_tags(parse_tags(map.get("tags")))
            .with_notes(notes),
    )
}

fn scan_records(text: &str, out: &mut Vec<VmRecord>) {
    let Some(re) = FLAT_OBJECT.as_ref() else {
        return;
    };
    for span in re.find_iter(text) {
        match record_from_blob(span.as_str()) {
            Some(record) => out.push(record),
            None => debug!("Skipping VM entry without vmid: {}", span.as_str()),
        }
    }
}

fn record_from_blob(blob: &str) -> Option<VmRecord> {
    let id = extract_field(blob, "vmid")?.trim().parse::<u64>().ok()?;
    let tags = extract_field(blob, "tags").map(Value::String);

    Some(
        VmRecord::new(
            id,
            extract_field(blob, "name"),
            extract_field(blob, "status"),
        )
        .with_tags(parse_tags(tags.as_ref()))
        .with_notes(extract_field(blob, "notes")),
    )
}

fn parse_vmid(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Tags arrive either as a JSON array or as one `;`/`,` separated string.
fn parse_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(raw)) => raw
            .split([';', ','])
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::testing::ScriptedTransport;

    fn summary(records: &[VmRecord]) -> Vec<(u64, &str, &str)> {
        records
            .iter()
            .map(|r| (r.id(), r.name(), r.status()))
            .collect()
    }

    #[test]
    fn concatenated_objects_drop_entries_without_vmid() {
        let body = r#"{"vmid":101,"name":"web1","status":"running"}{"vmid":102,"status":"stopped"}{"name":"broken"}"#;
        let records = parse_vm_list(body);
        assert_eq!(
            summary(&records),
            vec![(101, "web1", "running"), (102, "Unnamed", "stopped")]
        );
    }

    #[test]
    fn no_vm_objects_means_empty_list() {
        for body in ["", "   ", "[]", "{}", "null", "not json at all", r#"{"error":"boom"}"#] {
            assert!(parse_vm_list(body).is_empty(), "body {body:?}");
        }
    }

    #[test]
    fn empty_name_and_status_get_defaults() {
        let body = r#"[{"vmid":5,"name":"","status":""},{"vmid":6,"name":null}]"#;
        let records = parse_vm_list(body);
        assert_eq!(
            summary(&records),
            vec![(5, "Unnamed", "unknown"), (6, "Unnamed", "unknown")]
        );
    }

    #[test]
    fn order_and_duplicates_are_preserved() {
        let body = r#"[{"vmid":3},{"vmid":1},{"vmid":3,"name":"again"},{"vmid":2}]"#;
        let ids: Vec<u64> = parse_vm_list(body).iter().map(VmRecord::id).collect();
        assert_eq!(ids, vec![3, 1, 3, 2]);
    }

    #[test]
    fn vmid_may_be_a_digit_string_but_nothing_else() {
        let body = r#"[{"vmid":"204"},{"vmid":"abc"},{"vmid":-1},{"vmid":true},{"vmid":1.5},{"vmid":""}]"#;
        let ids: Vec<u64> = parse_vm_list(body).iter().map(VmRecord::id).collect();
        assert_eq!(ids, vec![204]);
    }

    #[test]
    fn nested_content_inside_a_record_is_tolerated() {
        let body = r#"{"data":[{"vmid":300,"name":"db","status":"running","config":{"cores":4,"disks":[{"id":1}]}}]}"#;
        let records = parse_vm_list(body);
        assert_eq!(summary(&records), vec![(300, "db", "running")]);
    }

    #[test]
    fn service_shape_with_tags_and_notes() {
        let body = r#"[{"vmid":101,"name":"alpha","tags":["easy-kill"," gpu "],"status":"running","notes":"alpha notes"},{"vmid":202,"name":"beta","tags":"tag1;tag2","status":"stopped","notes":null}]"#;
        let records = parse_vm_list(body);
        assert_eq!(records[0].tags(), ["easy-kill", "gpu"]);
        assert!(records[0].is_easy_kill());
        assert!(records[0].is_running());
        assert_eq!(records[0].notes(), Some("alpha notes"));
        assert_eq!(records[1].tags(), ["tag1", "tag2"]);
        assert!(!records[1].is_easy_kill());
        assert_eq!(records[1].notes(), None);
    }

    #[test]
    fn malformed_tail_is_scanned_after_clean_prefix() {
        let body = r#"[{"vmid":1,"name":"clean"}] {"vmid":2,"name":"dirty",} {"name":"no id"} {"vmid":3"#;
        let records = parse_vm_list(body);
        assert_eq!(
            summary(&records),
            vec![(1, "clean", "unknown"), (2, "dirty", "unknown")]
        );
    }

    #[test]
    fn broken_array_falls_back_to_flat_spans() {
        let body = r#"[{"vmid":10,"status":"running"},{"vmid":11,"name":"x",},"#;
        let records = parse_vm_list(body);
        assert_eq!(
            summary(&records),
            vec![(10, "Unnamed", "running"), (11, "x", "unknown")]
        );
    }

    #[test]
    fn fractional_vmid_is_dropped_on_both_paths() {
        let broken = r#"[{"vmid":1.5,"name":"ghost","status":"running",}"#;
        assert!(parse_vm_list(broken).is_empty());
        let clean = r#"[{"vmid":1.5,"name":"ghost","status":"running"}]"#;
        assert!(parse_vm_list(clean).is_empty());
    }

    #[test]
    fn repeated_vmid_keeps_first_value() {
        let records = parse_vm_list(r#"[{"vmid":1,"vmid":2,"name":"dup"}]"#);
        assert_eq!(summary(&records), vec![(1, "dup", "unknown")]);
    }

    #[test]
    fn display_matches_list_line() {
        let record = VmRecord::new(101, Some("web1".into()), Some("running".into()));
        assert_eq!(record.to_string(), "web1 (#101) - running");
    }

    #[test]
    fn serializes_with_service_field_names() {
        let record = VmRecord::new(7, None, None).with_tags(vec!["a".into()]);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "vmid": 7,
                "name": "Unnamed",
                "status": "unknown",
                "tags": ["a"],
                "notes": null
            })
        );
    }

    #[tokio::test]
    async fn list_vms_reads_vms_endpoint() {
        let transport = ScriptedTransport::with_bodies(&[r#"[{"vmid":1,"name":"a"}]"#]);
        let endpoint = ServiceEndpoint::parse("http://svc:3000").unwrap();
        let vms = list_vms(&transport, &endpoint).await;
        assert_eq!(vms.len(), 1);
        assert_eq!(transport.requests()[0].url, "http://svc:3000/api/vms");
    }

    #[tokio::test]
    async fn list_vms_survives_transport_failure() {
        let transport = ScriptedTransport::new(&[None]);
        let endpoint = ServiceEndpoint::parse("http://svc:3000").unwrap();
        assert!(list_vms(&transport, &endpoint).await.is_empty());
    }
}
