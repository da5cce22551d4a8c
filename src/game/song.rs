use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const UNKNOWN: &str = "Unknown";
const DEFAULT_DIFFICULTY: &str = "Easy";
const YOUTUBE_ID_LEN: usize = 11;

static YOUTUBE_LINK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*").ok()
});

/// Song metadata as it appears next to the notes in a chart file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongMeta {
    pub name: String,
    pub artist: String,
    pub difficulty: Option<String>,
    pub song_link: Option<String>,
    pub link: Option<String>,
    /// Audio file name under the song directory.
    pub filename: Option<String>,
}

/// Which playback source a song is played through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackKind {
    RemoteVideo { video_id: String },
    LocalFile { path: PathBuf },
}

impl SongMeta {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { UNKNOWN } else { &self.name }
    }

    pub fn display_artist(&self) -> &str {
        if self.artist.is_empty() { UNKNOWN } else { &self.artist }
    }

    pub fn difficulty(&self) -> &str {
        self.difficulty
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DIFFICULTY)
    }

    pub fn is_hard(&self) -> bool {
        self.difficulty().eq_ignore_ascii_case("hard")
    }

    /// "`name` - `artist`", as shown over the playfield and on the result screen.
    pub fn title_line(&self) -> String {
        format!("{} - {}", self.display_name(), self.display_artist())
    }

    pub fn video_link(&self) -> Option<&str> {
        self.song_link
            .as_deref()
            .or(self.link.as_deref())
            .filter(|l| !l.is_empty())
    }

    /// A recognizable video link wins; otherwise a local audio file under
    /// `songs_dir`. `None` means the song cannot be played at all.
    pub fn playback_kind(&self, songs_dir: &Path) -> Option<PlaybackKind> {
        if let Some(video_id) = self.video_link().and_then(youtube_video_id) {
            return Some(PlaybackKind::RemoteVideo { video_id });
        }
        self.local_audio_path(songs_dir)
            .map(|path| PlaybackKind::LocalFile { path })
    }

    pub fn local_audio_path(&self, songs_dir: &Path) -> Option<PathBuf> {
        self.filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .map(|f| songs_dir.join(f))
    }
}

/// Extracts the 11-character video id from the usual YouTube link shapes.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let re = YOUTUBE_LINK.as_ref()?;
    let id = re.captures(url)?.get(2)?.as_str();
    (id.len() == YOUTUBE_ID_LEN).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_video_ids_from_common_links() {
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_video_id("https://youtu.be/dQw4w9WgXcQ?t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_video_id("https://youtu.be/short"), None);
        assert_eq!(youtube_video_id("not a link"), None);
    }

    #[test]
    fn video_link_takes_precedence_over_local_file() {
        let meta = SongMeta {
            name: "Void".into(),
            song_link: Some("https://youtu.be/dQw4w9WgXcQ".into()),
            filename: Some("void.mp3".into()),
            ..SongMeta::default()
        };
        assert_eq!(
            meta.playback_kind(Path::new("songs")),
            Some(PlaybackKind::RemoteVideo {
                video_id: "dQw4w9WgXcQ".into()
            })
        );

        let local = SongMeta {
            link: Some("https://example.com/not-a-video".into()),
            filename: Some("void.mp3".into()),
            ..SongMeta::default()
        };
        assert_eq!(
            local.playback_kind(Path::new("songs")),
            Some(PlaybackKind::LocalFile {
                path: PathBuf::from("songs").join("void.mp3")
            })
        );

        assert_eq!(SongMeta::default().playback_kind(Path::new("songs")), None);
    }

    #[test]
    fn display_fallbacks() {
        let meta = SongMeta::default();
        assert_eq!(meta.title_line(), "Unknown - Unknown");
        assert_eq!(meta.difficulty(), "Easy");
        assert!(!meta.is_hard());
        let hard = SongMeta {
            difficulty: Some("HARD".into()),
            ..SongMeta::default()
        };
        assert!(hard.is_hard());
    }
}
