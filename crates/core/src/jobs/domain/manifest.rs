use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One output file on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub filename: String,
    pub content_type: String,
    pub artifact_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageManifest {
    pub entries: Vec<ArtifactEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoManifest {
    pub entry: ArtifactEntry,
    pub duration_seconds: f64,
}

/// Everything a finished job produced, consumed once by `fetch`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Manifest {
    Image(ImageManifest),
    Video(VideoManifest),
}

impl Manifest {
    pub fn entries(&self) -> Vec<&ArtifactEntry> {
        match self {
            Manifest::Image(m) => m.entries.iter().collect(),
            Manifest::Video(m) => vec![&m.entry],
        }
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.entries()
            .into_iter()
            .map(|e| e.artifact_path.as_path())
            .collect()
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        match self {
            Manifest::Image(_) => None,
            Manifest::Video(m) => Some(m.duration_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ArtifactEntry {
        ArtifactEntry {
            filename: name.to_string(),
            content_type: "image/jpeg".to_string(),
            artifact_path: PathBuf::from("/store/job").join(name),
        }
    }

    #[test]
    fn test_image_manifest_lists_all_paths() {
        let manifest = Manifest::Image(ImageManifest {
            entries: vec![entry("a_blurred.jpg"), entry("b_blurred.jpg")],
        });
        assert_eq!(
            manifest.paths(),
            vec![
                Path::new("/store/job/a_blurred.jpg"),
                Path::new("/store/job/b_blurred.jpg")
            ]
        );
        assert_eq!(manifest.duration_seconds(), None);
    }

    #[test]
    fn test_video_manifest_carries_duration() {
        let manifest = Manifest::Video(VideoManifest {
            entry: entry("clip_blurred.mp4"),
            duration_seconds: 4.5,
        });
        assert_eq!(manifest.entries().len(), 1);
        assert_eq!(manifest.duration_seconds(), Some(4.5));
    }

    #[test]
    fn test_serialised_with_type_tag() {
        let manifest = Manifest::Video(VideoManifest {
            entry: entry("clip_blurred.mp4"),
            duration_seconds: 2.0,
        });
        let json: serde_json::Value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["entry"]["filename"], "clip_blurred.mp4");

        let back: Manifest = serde_json::from_value(json).unwrap();
        assert_eq!(back, manifest);
    }
}
