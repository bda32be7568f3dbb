use serde::Deserialize;

use super::{ReleaseInfo, event_is};

/// Radarr "Webhook" connection payload (movies).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RadarrWebhook {
    /// `Grab`, `Download`, `Rename`, `MovieDelete`, `Test`, ...
    pub event_type: Option<String>,
    pub movie: Option<Movie>,
    pub remote_movie: Option<RemoteMovie>,
    pub release: Option<ReleaseInfo>,
    pub download_id: Option<String>,
    pub is_upgrade: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Movie {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub release_date: Option<String>,
    pub folder_path: Option<String>,
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub overview: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteMovie {
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
}

impl RadarrWebhook {
    pub fn is_grab(&self) -> bool {
        event_is(self.event_type.as_deref(), "Grab")
    }

    pub fn is_download(&self) -> bool {
        event_is(self.event_type.as_deref(), "Download")
    }

    pub fn is_test(&self) -> bool {
        event_is(self.event_type.as_deref(), "Test")
    }

    /// `Title (Year)` from the library movie, else from the remote match.
    pub fn movie_title(&self) -> String {
        let (title, year) = match (&self.movie, &self.remote_movie) {
            (Some(m), _) => (m.title.as_deref(), m.year),
            (None, Some(r)) => (r.title.as_deref(), r.year),
            (None, None) => return "Unknown Movie".into(),
        };
        let title = title.unwrap_or("Unknown Movie");
        match year {
            Some(year) => format!("{title} ({year})"),
            None => title.to_string(),
        }
    }

    pub fn quality(&self) -> &str {
        self.release
            .as_ref()
            .and_then(|r| r.quality.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn release_group(&self) -> &str {
        self.release
            .as_ref()
            .and_then(|r| r.release_group.as_deref())
            .unwrap_or("Unknown Group")
    }

    pub fn tmdb_id(&self) -> Option<i64> {
        self.movie.as_ref().and_then(|m| m.tmdb_id)
    }

    pub fn imdb_id(&self) -> Option<&str> {
        self.movie.as_ref().and_then(|m| m.imdb_id.as_deref())
    }

    pub fn is_upgrade(&self) -> bool {
        self.is_upgrade.unwrap_or(false)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn parses_grab_and_ignores_unknown_fields() {
        let hook: RadarrWebhook = serde_json::from_value(json!({
            "eventType": "Grab",
            "instanceName": "Radarr",
            "movie": {
                "id": 1,
                "title": "Dune",
                "year": 2021,
                "tmdbId": 438631,
                "imdbId": "tt1160419",
                "tags": ["4k"]
            },
            "release": { "quality": "Bluray-2160p", "releaseGroup": "FLUX", "size": 1 },
            "isUpgrade": true
        }))
        .unwrap();

        assert!(hook.is_grab());
        assert!(!hook.is_test());
        assert_eq!(hook.movie_title(), "Dune (2021)");
        assert_eq!(hook.quality(), "Bluray-2160p");
        assert_eq!(hook.release_group(), "FLUX");
        assert_eq!(hook.tmdb_id(), Some(438631));
        assert_eq!(hook.imdb_id(), Some("tt1160419"));
        assert!(hook.is_upgrade());
    }

    #[test]
    fn falls_back_to_remote_movie_and_defaults() {
        let hook: RadarrWebhook = serde_json::from_value(json!({
            "eventType": "Test",
            "remoteMovie": { "title": "Test Title", "year": 1970 }
        }))
        .unwrap();

        assert!(hook.is_test());
        assert_eq!(hook.movie_title(), "Test Title (1970)");
        assert_eq!(hook.quality(), "Unknown");
        assert_eq!(hook.release_group(), "Unknown Group");
        assert_eq!(hook.tmdb_id(), None);
        assert!(!hook.is_upgrade());
    }

    #[test]
    fn empty_payload_is_unknown_movie() {
        let hook: RadarrWebhook = serde_json::from_value(json!({})).unwrap();
        assert_eq!(hook.movie_title(), "Unknown Movie");
        assert!(hook.event_type.is_none());
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let err = serde_json::from_value::<RadarrWebhook>(json!({
            "movie": { "year": "last year" }
        }));
        assert!(err.is_err());
    }
}
