//! Extraction of run facts from `build.xml`
//!
//! The interesting elements are listed once in a static tag-path trie. The
//! streaming reader walks the document keeping a stack of trie positions, so
//! only text under a known path is collected and same-named elements at
//! other depths are ignored.

use std::collections::HashMap;
use std::path::Path;

use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use resultsview_storage::{Package, RunDetails, RunStatus};

use crate::error::{PollError, Result};

const KOJI_STATE: &str = "hudson.plugins.scm.koji.KojiRevisionState";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Result,
    Timestamp,
    StartTime,
    Duration,
    BuiltOn,
    PackageName,
    PackageVersion,
    PackageRelease,
}

#[derive(Debug, Default)]
struct TagNode {
    field: Option<Field>,
    children: HashMap<&'static [u8], TagNode>,
}

impl TagNode {
    fn insert(&mut self, path: &[&'static str], field: Field) {
        let mut node = self;
        for tag in path {
            node = node.children.entry(tag.as_bytes()).or_default();
        }
        node.field = Some(field);
    }
}

static TAG_TREE: Lazy<TagNode> = Lazy::new(|| {
    let mut root = TagNode::default();
    for top in ["build", "matrix-build"] {
        root.insert(&[top, "result"], Field::Result);
        root.insert(&[top, "timestamp"], Field::Timestamp);
        root.insert(&[top, "startTime"], Field::StartTime);
        root.insert(&[top, "duration"], Field::Duration);
        root.insert(&[top, "builtOn"], Field::BuiltOn);
    }
    for (tag, field) in [
        ("name", Field::PackageName),
        ("version", Field::PackageVersion),
        ("release", Field::PackageRelease),
    ] {
        root.insert(&["build", "actions", KOJI_STATE, "build", tag], field);
    }
    root
});

/// Raw values found in one status file. Empty elements are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRecord {
    pub result: Option<String>,
    pub timestamp: Option<String>,
    pub start_time: Option<String>,
    pub duration: Option<String>,
    pub built_on: Option<String>,
    pub package_name: Option<String>,
    pub package_version: Option<String>,
    pub package_release: Option<String>,
}

impl BuildRecord {
    fn set(&mut self, field: Field, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let slot = match field {
            Field::Result => &mut self.result,
            Field::Timestamp => &mut self.timestamp,
            Field::StartTime => &mut self.start_time,
            Field::Duration => &mut self.duration,
            Field::BuiltOn => &mut self.built_on,
            Field::PackageName => &mut self.package_name,
            Field::PackageVersion => &mut self.package_version,
            Field::PackageRelease => &mut self.package_release,
        };
        *slot = Some(text.to_string());
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::from_result(self.result.as_deref())
    }

    /// Timestamps are epoch milliseconds; unparsable values are dropped.
    pub fn details(&self) -> RunDetails {
        let millis = |value: &Option<String>| {
            value
                .as_deref()
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        };
        RunDetails {
            timestamp: millis(&self.timestamp),
            start_time: millis(&self.start_time),
            duration_ms: self.duration.as_deref().and_then(|v| v.parse().ok()),
            built_on: self.built_on.clone(),
        }
    }

    /// Package identity, when name, version and release are all present.
    pub fn package(&self) -> Option<Package> {
        match (
            &self.package_name,
            &self.package_version,
            &self.package_release,
        ) {
            (Some(name), Some(version), Some(release)) => {
                Package::new(name.as_str(), version.as_str(), release.as_str()).ok()
            }
            _ => None,
        }
    }
}

/// Parse a status document.
///
/// # Errors
///
/// Fails on malformed XML, a truncated document, or a document without a
/// root element.
pub fn parse_build_xml(bytes: &[u8]) -> Result<BuildRecord> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut record = BuildRecord::default();
    let mut stack: Vec<Option<&'static TagNode>> = Vec::new();
    let mut text = String::new();
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let parent = match stack.last() {
                    Some(top) => *top,
                    None => Some(&*TAG_TREE),
                };
                let node = parent.and_then(|n| n.children.get(e.name().as_ref()));
                if node.is_some_and(|n| n.field.is_some()) {
                    text.clear();
                }
                stack.push(node);
                seen_root = true;
            }
            Event::End(_) => {
                if let Some(Some(TagNode {
                    field: Some(field), ..
                })) = stack.pop()
                {
                    record.set(*field, &text);
                }
            }
            Event::Empty(_) => seen_root = true,
            Event::Text(t) => {
                if capturing(&stack) {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if capturing(&stack) {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(PollError::malformed(format!(
            "document ends with {} unclosed element(s)",
            stack.len()
        )));
    }
    if !seen_root {
        return Err(PollError::malformed("no root element"));
    }
    Ok(record)
}

/// Read and parse a status file.
pub fn read_build_xml(path: &Path) -> Result<BuildRecord> {
    let bytes = std::fs::read(path).map_err(|e| PollError::io(path, e))?;
    parse_build_xml(&bytes)
}

fn capturing(stack: &[Option<&'static TagNode>]) -> bool {
    matches!(stack.last(), Some(Some(node)) if node.field.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn koji_build(name: &str, version: &str, release: &str, result: Option<&str>) -> String {
        let result = result
            .map(|r| format!("<result>{}</result>", r))
            .unwrap_or_default();
        format!(
            "<?xml version='1.1' encoding='UTF-8'?>\
             <build>\
               <actions>\
                 <hudson.plugins.scm.koji.KojiRevisionState plugin=\"jenkins-scm-koji-plugin@2.2\">\
                   <build>\
                     <name>{name}</name><version>{version}</version><release>{release}</release>\
                     <nvr>{name}-{version}-{release}</nvr>\
                   </build>\
                 </hudson.plugins.scm.koji.KojiRevisionState>\
               </actions>\
               {result}\
             </build>"
        )
    }

    #[test]
    fn test_koji_build_with_result() {
        let record = parse_build_xml(koji_build("pkg", "1", "2", Some("FAILURE")).as_bytes()).unwrap();
        assert_eq!(record.result.as_deref(), Some("FAILURE"));
        assert_eq!(record.status(), RunStatus::Failure);

        let package = record.package().unwrap();
        assert_eq!(package.nvr, "pkg-1-2");
        assert_eq!(package.name, "pkg");
    }

    #[test]
    fn test_missing_result_means_running() {
        let record = parse_build_xml(koji_build("pkg", "1", "3", None).as_bytes()).unwrap();
        assert_eq!(record.result, None);
        assert_eq!(record.status(), RunStatus::Running);
        assert_eq!(record.package().unwrap().nvr, "pkg-1-3");
    }

    #[test]
    fn test_details() {
        let xml = "<build>\
                     <timestamp>1700000000000</timestamp>\
                     <startTime>1700000000500</startTime>\
                     <duration>61000</duration>\
                     <builtOn>hydra-03</builtOn>\
                     <result>SUCCESS</result>\
                   </build>";
        let record = parse_build_xml(xml.as_bytes()).unwrap();
        let details = record.details();

        assert_eq!(details.timestamp.unwrap().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(details.start_time.unwrap().timestamp_millis(), 1_700_000_000_500);
        assert_eq!(details.duration_ms, Some(61_000));
        assert_eq!(details.built_on.as_deref(), Some("hydra-03"));
        assert!(record.package().is_none());
    }

    #[test]
    fn test_unparsable_details_are_dropped() {
        let xml = "<build><timestamp>yesterday</timestamp><duration>-5</duration></build>";
        let details = parse_build_xml(xml.as_bytes()).unwrap().details();
        assert_eq!(details, RunDetails::default());
    }

    #[test]
    fn test_matrix_build_root() {
        let xml = "<matrix-build><result>UNSTABLE</result><builtOn>master</builtOn></matrix-build>";
        let record = parse_build_xml(xml.as_bytes()).unwrap();
        assert_eq!(record.status(), RunStatus::Unstable);
        assert_eq!(record.built_on.as_deref(), Some("master"));
    }

    #[test]
    fn test_same_tag_at_other_depth_is_ignored() {
        let xml = "<build>\
                     <actions><hudson.tasks.junit.TestResultAction><result>FAILURE</result></hudson.tasks.junit.TestResultAction></actions>\
                     <actions><other.Action><build><name>x</name><version>1</version><release>1</release></build></other.Action></actions>\
                   </build>";
        let record = parse_build_xml(xml.as_bytes()).unwrap();
        assert_eq!(record, BuildRecord::default());
    }

    #[test]
    fn test_unknown_root_yields_nothing() {
        let xml = "<project><result>SUCCESS</result></project>";
        let record = parse_build_xml(xml.as_bytes()).unwrap();
        assert_eq!(record.result, None);
    }

    #[test]
    fn test_text_is_trimmed_and_unescaped() {
        let xml = "<build><result>\n   SUCCESS \n</result><builtOn>a&amp;b</builtOn></build>";
        let record = parse_build_xml(xml.as_bytes()).unwrap();
        assert_eq!(record.result.as_deref(), Some("SUCCESS"));
        assert_eq!(record.built_on.as_deref(), Some("a&b"));
    }

    #[test]
    fn test_cdata_counts_as_text() {
        let xml = "<build><result><![CDATA[ABORTED]]></result></build>";
        let record = parse_build_xml(xml.as_bytes()).unwrap();
        assert_eq!(record.status(), RunStatus::Aborted);
    }

    #[test]
    fn test_empty_package_field_means_no_package() {
        let xml = koji_build("pkg", "1", "", Some("SUCCESS"));
        let record = parse_build_xml(xml.as_bytes()).unwrap();
        assert_eq!(record.package_release, None);
        assert!(record.package().is_none());
        assert_eq!(record.status(), RunStatus::Success);

        let record = parse_build_xml(b"<build><result/></build>").unwrap();
        assert_eq!(record.result, None);
    }

    #[test]
    fn test_result_is_case_insensitive() {
        let record = parse_build_xml(b"<build><result>success</result></build>").unwrap();
        assert_eq!(record.status(), RunStatus::Success);
    }

    #[test]
    fn test_truncated_document_fails() {
        let err = parse_build_xml(b"<build><actions><result>SUCC").unwrap_err();
        assert!(matches!(err, PollError::Malformed(_) | PollError::Xml(_)));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        assert!(parse_build_xml(b"<build><result>SUCCESS</build></result>").is_err());
    }

    #[test]
    fn test_empty_document_fails() {
        assert!(parse_build_xml(b"").is_err());
        assert!(parse_build_xml(b"<?xml version='1.0'?>").is_err());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_build_xml(Path::new("/nonexistent/builds/1/build.xml")).unwrap_err();
        assert!(matches!(err, PollError::Io { .. }));
    }
}
