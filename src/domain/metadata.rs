use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// What the projects tree knows about one session id.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionMetadata {
    pub custom_title: Option<String>,
    pub slug: Option<String>,
    pub project: Option<String>,
    pub git_branch: Option<String>,
}

pub type SessionMetadataMap = BTreeMap<String, SessionMetadata>;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LogFragmentInfo {
    pub custom_title: Option<String>,
    pub slug: Option<String>,
}

/// Scans JSONL text for the first custom title and the first slug.
/// Lines that are not JSON objects are skipped.
pub fn parse_log_fragment(text: &str) -> LogFragmentInfo {
    let mut info = LogFragmentInfo::default();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
            continue;
        };
        if !value.is_object() {
            continue;
        }

        if info.custom_title.is_none()
            && value.get("type").and_then(|v| v.as_str()) == Some("custom-title")
        {
            info.custom_title = value
                .get("customTitle")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }

        if info.slug.is_none() {
            info.slug = value
                .get("slug")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }

        if info.custom_title.is_some() && info.slug.is_some() {
            break;
        }
    }

    info
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionsIndex {
    #[serde(default)]
    pub entries: Vec<SessionsIndexEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionsIndexEntry {
    #[serde(rename = "sessionId")]
    pub session_id: String,

    #[serde(rename = "customName", default)]
    pub custom_name: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "gitBranch", default)]
    pub git_branch: Option<String>,
}

pub fn parse_sessions_index(text: &str) -> Result<SessionsIndex, serde_json::Error> {
    serde_json::from_str(text)
}

/// Applies index entries on top of metadata gathered from log fragments.
/// Entries for ids with no existing record are ignored.
pub fn overlay_sessions_index(metadata: &mut SessionMetadataMap, index: SessionsIndex) {
    for entry in index.entries {
        let Some(existing) = metadata.get_mut(&entry.session_id) else {
            continue;
        };
        existing.git_branch = entry.git_branch;
        if let Some(name) = entry.custom_name.or(entry.name) {
            existing.custom_title = Some(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_title_and_slug() {
        let text = concat!(
            r#"{"type":"user","slug":"brave-otter","message":{}}"#,
            "\n",
            "not json\n",
            r#"{"type":"custom-title","customTitle":"First"}"#,
            "\n",
            r#"{"type":"custom-title","customTitle":"Second","slug":"other"}"#,
            "\n",
        );
        let info = parse_log_fragment(text);
        assert_eq!(info.custom_title.as_deref(), Some("First"));
        assert_eq!(info.slug.as_deref(), Some("brave-otter"));
    }

    #[test]
    fn empty_fragment_yields_nothing() {
        assert_eq!(parse_log_fragment(""), LogFragmentInfo::default());
        assert_eq!(parse_log_fragment("[1,2]\n42\n"), LogFragmentInfo::default());
    }

    #[test]
    fn overlay_sets_branch_and_prefers_custom_name() {
        let mut metadata = SessionMetadataMap::new();
        metadata.insert(
            "s1".to_string(),
            SessionMetadata {
                custom_title: Some("from log".to_string()),
                slug: Some("slug".to_string()),
                project: Some("/p".to_string()),
                git_branch: None,
            },
        );
        metadata.insert(
            "s2".to_string(),
            SessionMetadata {
                custom_title: Some("kept".to_string()),
                ..SessionMetadata::default()
            },
        );

        let index = parse_sessions_index(
            r#"{"entries":[
                {"sessionId":"s1","customName":"Custom","name":"Plain","gitBranch":"main"},
                {"sessionId":"s2","gitBranch":"dev"},
                {"sessionId":"unknown","name":"ignored"}
            ]}"#,
        )
        .expect("parse");
        overlay_sessions_index(&mut metadata, index);

        let s1 = &metadata["s1"];
        assert_eq!(s1.custom_title.as_deref(), Some("Custom"));
        assert_eq!(s1.git_branch.as_deref(), Some("main"));
        assert_eq!(s1.slug.as_deref(), Some("slug"));

        let s2 = &metadata["s2"];
        assert_eq!(s2.custom_title.as_deref(), Some("kept"));
        assert_eq!(s2.git_branch.as_deref(), Some("dev"));

        assert!(!metadata.contains_key("unknown"));
    }

    #[test]
    fn overlay_falls_back_to_name() {
        let mut metadata = SessionMetadataMap::new();
        metadata.insert("s1".to_string(), SessionMetadata::default());
        let index =
            parse_sessions_index(r#"{"entries":[{"sessionId":"s1","name":"Plain"}]}"#)
                .expect("parse");
        overlay_sessions_index(&mut metadata, index);
        assert_eq!(metadata["s1"].custom_title.as_deref(), Some("Plain"));
        assert_eq!(metadata["s1"].git_branch, None);
    }

    #[test]
    fn index_without_entries_parses() {
        let index = parse_sessions_index(r#"{"version":1}"#).expect("parse");
        assert!(index.entries.is_empty());
    }
}
