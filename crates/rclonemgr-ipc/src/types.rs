//! Wire types of the control endpoint

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The only route the daemon serves
pub const COPY_PATH: &str = "/gdrive/copy";

/// Body of `POST /gdrive/copy`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRequest {
    #[serde(default)]
    pub sources: Vec<String>,
}

impl CopyRequest {
    pub fn new<I, P>(sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            sources: sources
                .into_iter()
                .map(|p| p.into().to_string_lossy().into_owned())
                .collect(),
        }
    }

    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.sources.iter().map(PathBuf::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_request_json_shape() {
        let request = CopyRequest::new(["/home/me/google/team/a.txt"]);
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"sources":["/home/me/google/team/a.txt"]}"#
        );
    }

    #[test]
    fn test_missing_sources_decode_as_empty() {
        let request: CopyRequest = serde_json::from_str("{}").unwrap();
        assert!(request.sources.is_empty());
    }
}
