use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use super::Resource;
use crate::error::{Result, ScanError};

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Load every resource reachable from the given patterns. Each pattern is a
/// manifest file, a directory (walked recursively) or a glob.
pub fn load_patterns(patterns: &[String]) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();
    for pattern in patterns {
        let files = expand_pattern(pattern)?;
        if files.is_empty() {
            return Err(ScanError::Setup(format!(
                "pattern '{pattern}' matched no manifest files"
            )));
        }
        for file in files {
            resources.extend(load_file(&file)?);
        }
    }
    Ok(resources)
}

fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_manifest(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        return Ok(files);
    }

    let paths = glob::glob(pattern)
        .map_err(|e| ScanError::Setup(format!("invalid pattern '{pattern}': {e}")))?;
    let mut files: Vec<PathBuf> = paths
        .filter_map(|p| p.ok())
        .filter(|p| p.is_file() && is_manifest(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MANIFEST_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Load one manifest file. YAML files may hold several documents; `List`
/// objects (as produced by `kubectl get -o yaml`) are flattened.
pub fn load_file(path: &Path) -> Result<Vec<Resource>> {
    let content = std::fs::read_to_string(path).map_err(|e| ScanError::Manifest {
        file: path.display().to_string(),
        message: e.to_string(),
    })?;

    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let documents = if is_json {
        vec![serde_json::from_str::<Value>(&content).map_err(|e| manifest_err(path, e))?]
    } else {
        parse_yaml_documents(&content).map_err(|e| manifest_err(path, e))?
    };

    let mut resources = Vec::new();
    for doc in documents {
        collect(doc, path, &mut resources)?;
    }
    tracing::debug!(file = %path.display(), resources = resources.len(), "manifest loaded");
    Ok(resources)
}

fn parse_yaml_documents(content: &str) -> std::result::Result<Vec<Value>, serde_yaml::Error> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

fn collect(doc: Value, path: &Path, out: &mut Vec<Resource>) -> Result<()> {
    if let Some(items) = doc.get("items").and_then(Value::as_array) {
        for item in items {
            collect(item.clone(), path, out)?;
        }
        return Ok(());
    }
    out.push(Resource::from_value(doc, Some(path.to_path_buf()))?);
    Ok(())
}

fn manifest_err(path: &Path, e: impl std::fmt::Display) -> ScanError {
    ScanError::Manifest {
        file: path.display().to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MULTI_DOC: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: shop
---
apiVersion: v1
kind: Pod
metadata:
  name: api
  namespace: shop
spec:
  containers:
    - name: api
      image: shop/api:1.2
---
"#;

    #[test]
    fn yaml_multi_document_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("shop.yaml");
        fs::write(&file, MULTI_DOC).unwrap();

        let resources = load_file(&file).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[1].kind, "Pod");
        assert_eq!(resources[1].origin.as_deref(), Some(file.as_path()));
    }

    #[test]
    fn json_list_is_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("snapshot.json");
        fs::write(
            &file,
            r#"{"kind":"List","items":[
                {"kind":"Pod","metadata":{"name":"a","namespace":"x"}},
                {"kind":"Pod","metadata":{"name":"b","namespace":"y"}}
            ]}"#,
        )
        .unwrap();

        let resources = load_file(&file).unwrap();
        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn directory_pattern_walks_manifests_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/shop.yml"), MULTI_DOC).unwrap();
        fs::write(dir.path().join("README.md"), "# not a manifest").unwrap();

        let pattern = dir.path().display().to_string();
        let resources = load_patterns(&[pattern]).unwrap();
        assert_eq!(resources.len(), 2);
    }

    #[test]
    fn glob_pattern_matches_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), MULTI_DOC).unwrap();
        fs::write(dir.path().join("b.yaml"), MULTI_DOC).unwrap();

        let pattern = format!("{}/*.yaml", dir.path().display());
        assert_eq!(load_patterns(&[pattern]).unwrap().len(), 4);
    }

    #[test]
    fn unmatched_pattern_is_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.yaml", dir.path().display());
        let err = load_patterns(&[pattern]).unwrap_err();
        assert!(matches!(err, ScanError::Setup(_)));
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.yaml");
        fs::write(&file, "kind: [unclosed").unwrap();
        let err = load_file(&file).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
