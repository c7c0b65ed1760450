//! Flattens a daemon listing into `(path, synced)` pairs.
//!
//! The daemon's schema is informal: objects may carry a `"folder"` member
//! naming the folder their `"files"` belong to, and everything else is
//! ignored. Shapes that cannot be interpreted are skipped, never reported.

use serde_json::Value;
use tracing::debug;

use crate::paths::{join, last_segment, normalize};

const FOLDER_KEY: &str = "folder";
const FILES_KEY: &str = "files";
const FOLDER_NAME_KEYS: [&str; 2] = ["path", "name"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub emitted: usize,
}

/// Walks `tree` depth-first and hands every listed file to `sink` as a
/// normalized path paired with `true`. `requested_folder` is the folder the
/// query was issued for; it is the context until a `"folder"` member says
/// otherwise.
pub fn ingest<F>(tree: &Value, requested_folder: &str, mut sink: F) -> IngestReport
where
    F: FnMut(String, bool),
{
    let requested = normalize(requested_folder);
    let requested = requested.trim_end_matches('/');
    let mut report = IngestReport::default();
    let mut emit = |path: String| {
        report.emitted += 1;
        sink(path, true);
    };
    walk(tree, requested, requested, None, &mut emit);
    report
}

pub fn ingest_bytes<F>(body: &[u8], requested_folder: &str, sink: F) -> IngestReport
where
    F: FnMut(String, bool),
{
    match serde_json::from_slice::<Value>(body) {
        Ok(tree) => ingest(&tree, requested_folder, sink),
        Err(err) => {
            debug!(folder = requested_folder, error = %err, "ignoring unparsable daemon response");
            IngestReport::default()
        }
    }
}

fn walk(
    node: &Value,
    requested: &str,
    context: &str,
    key: Option<&str>,
    emit: &mut dyn FnMut(String),
) {
    match node {
        Value::Object(members) => {
            let scoped = members
                .get(FOLDER_KEY)
                .and_then(folder_name)
                .map(|name| resolve_folder(&name, requested));
            let context = scoped.as_deref().unwrap_or(context);
            for (member, value) in members {
                walk(value, requested, context, Some(member.as_str()), emit);
            }
        }
        Value::Array(items) => {
            let lists_files = key == Some(FILES_KEY);
            for item in items {
                match item {
                    Value::String(name) if lists_files => {
                        if !name.is_empty() {
                            emit(normalize(&join(context, name)));
                        }
                    }
                    other => walk(other, requested, context, None, emit),
                }
            }
        }
        _ => {}
    }
}

fn folder_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(name) => Some(name.as_str()),
        Value::Object(fields) => FOLDER_NAME_KEYS
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str)),
        _ => None,
    }?;
    let name = normalize(name);
    let name = name.trim_end_matches('/');
    (!name.is_empty()).then(|| name.to_string())
}

// A full path is taken as-is. A bare name is either the requested folder
// itself or one of its children.
fn resolve_folder(name: &str, requested: &str) -> String {
    if name.contains('/') || requested.is_empty() {
        return name.to_string();
    }
    if last_segment(requested) == name {
        return requested.to_string();
    }
    join(requested, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(tree: Value, folder: &str) -> Vec<String> {
        let mut out = Vec::new();
        ingest(&tree, folder, |path, synced| {
            assert!(synced);
            out.push(path);
        });
        out
    }

    #[test]
    fn folder_context_applies_to_sibling_files() {
        let paths = collect(
            json!({"folder": {"name": "Docs"}, "files": ["a.txt", "b.txt"]}),
            "Cloud/Docs",
        );
        assert_eq!(paths, vec!["Cloud/Docs/a.txt", "Cloud/Docs/b.txt"]);
    }

    #[test]
    fn files_without_folder_use_requested_folder() {
        let paths = collect(json!({"files": ["a.txt"]}), r"C:\Cloud\Docs");
        assert_eq!(paths, vec!["C:/Cloud/Docs/a.txt"]);
    }

    #[test]
    fn sibling_folder_contexts_do_not_leak() {
        let paths = collect(
            json!({
                "groups": [
                    {"folder": {"name": "A"}, "files": ["x.txt"]},
                    {"folder": {"name": "B"}, "files": ["y.txt"]}
                ],
                "files": ["z.txt"]
            }),
            "Cloud",
        );
        assert_eq!(
            paths,
            vec!["Cloud/A/x.txt", "Cloud/B/y.txt", "Cloud/z.txt"]
        );
    }

    #[test]
    fn full_folder_path_overrides_requested_folder() {
        let paths = collect(
            json!({"folder": {"id": 3, "path": r"D:\Cloud\Other"}, "files": ["c.txt"]}),
            "Cloud/Docs",
        );
        assert_eq!(paths, vec!["D:/Cloud/Other/c.txt"]);
    }

    #[test]
    fn unexpected_shapes_are_skipped() {
        let paths = collect(
            json!({
                "folder": 42,
                "files": [1, null, "", {"name": "ignored.txt"}, "ok.txt"],
                "other": ["not-a-file.txt"],
                "nested": {"files": "not-an-array"}
            }),
            "Cloud",
        );
        assert_eq!(paths, vec!["Cloud/ok.txt"]);
    }

    #[test]
    fn unparsable_body_emits_nothing() {
        let mut count = 0;
        let report = ingest_bytes(b"{\"files\": [", "Cloud", |_, _| count += 1);
        assert_eq!(report, IngestReport::default());
        assert_eq!(count, 0);
    }

    #[test]
    fn report_counts_emitted_entries() {
        let report = ingest_bytes(br#"{"files": ["a", "b", "a"]}"#, "Cloud", |_, _| {});
        assert_eq!(report.emitted, 3);
    }
}
