use serde::Deserialize;

use super::{ReleaseInfo, event_is};

/// Sonarr "Webhook" connection payload (TV series).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SonarrWebhook {
    /// `Grab`, `Download`, `EpisodeFileDelete`, `SeriesDelete`, `Test`, ...
    pub event_type: Option<String>,
    pub series: Option<Series>,
    pub episodes: Vec<Episode>,
    pub release: Option<ReleaseInfo>,
    pub download_id: Option<String>,
    pub is_upgrade: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Series {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub path: Option<String>,
    pub tvdb_id: Option<i64>,
    pub tv_maze_id: Option<i64>,
    pub imdb_id: Option<String>,
    #[serde(rename = "type")]
    pub series_type: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Episode {
    pub id: Option<i64>,
    pub episode_number: Option<i32>,
    pub season_number: Option<i32>,
    pub title: Option<String>,
    pub air_date: Option<String>,
    pub air_date_utc: Option<String>,
    pub quality: Option<String>,
    pub quality_version: Option<i64>,
    pub release_group: Option<String>,
    pub scene_name: Option<String>,
}

impl SonarrWebhook {
    pub fn is_grab(&self) -> bool {
        event_is(self.event_type.as_deref(), "Grab")
    }

    pub fn is_download(&self) -> bool {
        event_is(self.event_type.as_deref(), "Download")
    }

    pub fn is_test(&self) -> bool {
        event_is(self.event_type.as_deref(), "Test")
    }

    pub fn series_title(&self) -> &str {
        self.series
            .as_ref()
            .and_then(|s| s.title.as_deref())
            .unwrap_or("Unknown Series")
    }

    /// `S01E02 - Title` for a single episode, a count for a batch.
    pub fn episodes_description(&self) -> String {
        match self.episodes.as_slice() {
            [] => "Unknown Episode".into(),
            [ep] => format!(
                "S{:02}E{:02} - {}",
                ep.season_number.unwrap_or(0),
                ep.episode_number.unwrap_or(0),
                ep.title.as_deref().unwrap_or("TBA")
            ),
            many => format!("{} episodes", many.len()),
        }
    }

    /// Release quality, else the first episode's.
    pub fn quality(&self) -> &str {
        self.release
            .as_ref()
            .and_then(|r| r.quality.as_deref())
            .or_else(|| self.episodes.first().and_then(|e| e.quality.as_deref()))
            .unwrap_or("Unknown")
    }

    pub fn release_group(&self) -> &str {
        self.release
            .as_ref()
            .and_then(|r| r.release_group.as_deref())
            .or_else(|| {
                self.episodes
                    .first()
                    .and_then(|e| e.release_group.as_deref())
            })
            .unwrap_or("Unknown Group")
    }

    pub fn imdb_id(&self) -> Option<&str> {
        self.series.as_ref().and_then(|s| s.imdb_id.as_deref())
    }

    pub fn is_upgrade(&self) -> bool {
        self.is_upgrade.unwrap_or(false)
    }
}
