use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use std::fmt;
use std::path::Path;

/// Descriptive tags used to label recommendations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<f64>,
}

impl TrackTags {
    /// `Artist - Title` when both are known.
    pub fn label(&self) -> Option<String> {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => Some(format!("{artist} - {title}")),
            (None, Some(title)) => Some(title.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for TrackTags {
    #[allow(clippy::cast_sign_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label().unwrap_or_else(|| "<untagged>".to_string());
        match self.duration_secs {
            Some(secs) => {
                let total = secs.round() as u64;
                write!(f, "{label} [{}:{:02}]", total / 60, total % 60)
            }
            None => write!(f, "{label}"),
        }
    }
}

/// Read tags from `path`. Untagged or unreadable files yield empty tags.
pub fn read_tags(path: &Path) -> TrackTags {
    let tagged_file = match lofty::read_from_path(path) {
        Ok(tagged_file) => tagged_file,
        Err(e) => {
            log::debug!("No readable tags in {}: {}", path.display(), e);
            return TrackTags::default();
        }
    };

    let mut tags = TrackTags {
        duration_secs: Some(tagged_file.properties().duration().as_secs_f64()),
        ..TrackTags::default()
    };

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        tags.title = tag.title().map(|s| s.to_string());
        tags.artist = tag.artist().map(|s| s.to_string());
        tags.album = tag.album().map(|s| s.to_string());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tags_missing_file() {
        assert_eq!(read_tags(Path::new("/nonexistent/file.mp3")), TrackTags::default());
    }

    #[test]
    fn test_display() {
        let tags = TrackTags {
            title: Some("Higan".to_string()),
            artist: Some("Angels of Death".to_string()),
            album: None,
            duration_secs: Some(125.4),
        };
        assert_eq!(tags.to_string(), "Angels of Death - Higan [2:05]");
        assert_eq!(TrackTags::default().to_string(), "<untagged>");
    }
}
