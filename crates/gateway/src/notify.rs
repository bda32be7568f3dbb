//! Turning webhook payloads into chat notifications.
//!
//! Media events go to the media channel through the media bot; TrueNAS
//! alerts go to the operator chat through the admin bot. Messages use the
//! Telegram HTML subset and every interpolated value is escaped.

use std::{fmt::Write as _, sync::Arc};

use {
    anyhow::{Context as _, Result},
    botdeck_channels::{Outbound, TextFormat},
    botdeck_common::text::escape_html,
    tracing::{info, warn},
};

use crate::webhook::{RadarrWebhook, SonarrWebhook, TrueNasAlert};

/// A bot plus the chat it posts notifications to.
#[derive(Clone)]
pub struct ChatTarget {
    pub bot_name: String,
    pub chat_id: i64,
    pub outbound: Arc<dyn Outbound>,
}

/// Result of a notification attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Sent as text after the poster could not be attached.
    SentWithoutPoster,
    /// Nothing to send (test events).
    Skipped,
}

pub struct Notifier {
    media: Option<ChatTarget>,
    admin: Option<ChatTarget>,
    poster_base_url: String,
}

impl Notifier {
    pub fn new(
        media: Option<ChatTarget>,
        admin: Option<ChatTarget>,
        poster_base_url: impl Into<String>,
    ) -> Self {
        Self {
            media,
            admin,
            poster_base_url: poster_base_url.into(),
        }
    }

    pub fn media_target(&self) -> Option<&ChatTarget> {
        self.media.as_ref()
    }

    pub fn admin_target(&self) -> Option<&ChatTarget> {
        self.admin.as_ref()
    }

    pub async fn radarr(&self, hook: &RadarrWebhook) -> Result<Delivery> {
        if hook.is_test() {
            info!("radarr test webhook received, no notification sent");
            return Ok(Delivery::Skipped);
        }
        let target = self.media.as_ref().context("no media bot is configured")?;
        let text = format_radarr(hook);

        let delivery = match hook.tmdb_id() {
            Some(tmdb_id) => {
                let poster = poster_url(&self.poster_base_url, tmdb_id);
                publish_with_poster(target, &poster, &text).await?
            },
            None => {
                send(target, &text).await?;
                Delivery::Sent
            },
        };
        info!(title = %hook.movie_title(), ?delivery, "radarr notification published");
        Ok(delivery)
    }

    pub async fn sonarr(&self, hook: &SonarrWebhook) -> Result<Delivery> {
        if hook.is_test() {
            info!("sonarr test webhook received, no notification sent");
            return Ok(Delivery::Skipped);
        }
        let target = self.media.as_ref().context("no media bot is configured")?;
        send(target, &format_sonarr(hook)).await?;
        info!(series = %hook.series_title(), "sonarr notification published");
        Ok(Delivery::Sent)
    }

    pub async fn truenas(&self, alert: &TrueNasAlert) -> Result<Delivery> {
        let target = self
            .admin
            .as_ref()
            .context("no admin bot or operator chat is configured")?;
        send(target, &format_truenas(alert)).await?;
        warn!(
            level = %alert.level(),
            alert_type = %alert.alert_type(),
            "truenas alert delivered to operator"
        );
        Ok(Delivery::Sent)
    }
}

async fn send(target: &ChatTarget, text: &str) -> Result<()> {
    target
        .outbound
        .send_text(target.chat_id, text, TextFormat::Html)
        .await
        .with_context(|| format!("{} failed to send to chat {}", target.bot_name, target.chat_id))
}

/// Send a photo with `caption`; if the platform refuses the photo, send the
/// caption as text with a marker instead.
async fn publish_with_poster(target: &ChatTarget, poster: &str, caption: &str) -> Result<Delivery> {
    match target
        .outbound
        .send_photo(target.chat_id, poster, caption, TextFormat::Html)
        .await
    {
        Ok(()) => Ok(Delivery::Sent),
        Err(e) => {
            warn!(
                account_id = %target.bot_name,
                chat_id = target.chat_id,
                poster,
                error = %e,
                "poster send failed, falling back to text"
            );
            send(target, &format!("{caption}\n\n<i>Poster unavailable</i>")).await?;
            Ok(Delivery::SentWithoutPoster)
        },
    }
}

pub fn poster_url(base: &str, tmdb_id: i64) -> String {
    format!("{}/{tmdb_id}.jpg", base.trim_end_matches('/'))
}

fn imdb_link(out: &mut String, imdb_id: Option<&str>) {
    if let Some(id) = imdb_id.filter(|id| !id.is_empty()) {
        let _ = writeln!(
            out,
            "🔗 <a href=\"https://www.imdb.com/title/{0}/\">IMDb</a>",
            escape_html(id)
        );
    }
}

pub fn format_radarr(hook: &RadarrWebhook) -> String {
    let mut out = String::new();
    if hook.is_grab() {
        out.push_str("🎬 <b>Movie grabbed</b>\n\n");
    } else if hook.is_download() {
        out.push_str("✅ <b>Movie downloaded</b>\n\n");
    } else {
        let _ = write!(
            out,
            "🎬 <b>Radarr event: {}</b>\n\n",
            escape_html(hook.event_type.as_deref().unwrap_or("Unknown"))
        );
    }

    let _ = writeln!(out, "📽 <b>Title:</b> {}", escape_html(&hook.movie_title()));
    let _ = writeln!(out, "🎞 <b>Quality:</b> <code>{}</code>", escape_html(hook.quality()));
    let _ = writeln!(
        out,
        "🏷 <b>Release group:</b> <code>{}</code>",
        escape_html(hook.release_group())
    );
    imdb_link(&mut out, hook.imdb_id());
    if hook.is_upgrade() {
        out.push_str("\n⬆️ <b>Quality upgrade</b>");
    }
    out
}

pub fn format_sonarr(hook: &SonarrWebhook) -> String {
    let mut out = String::new();
    if hook.is_grab() {
        out.push_str("📺 <b>Episode grabbed</b>\n\n");
    } else if hook.is_download() {
        out.push_str("✅ <b>Episode downloaded</b>\n\n");
    } else {
        let _ = write!(
            out,
            "📺 <b>Sonarr event: {}</b>\n\n",
            escape_html(hook.event_type.as_deref().unwrap_or("Unknown"))
        );
    }

    let _ = writeln!(out, "🎬 <b>Series:</b> {}", escape_html(hook.series_title()));
    let _ = writeln!(
        out,
        "📺 <b>Episode:</b> {}",
        escape_html(&hook.episodes_description())
    );
    let _ = writeln!(out, "🎞 <b>Quality:</b> <code>{}</code>", escape_html(hook.quality()));
    let _ = writeln!(
        out,
        "🏷 <b>Release group:</b> <code>{}</code>",
        escape_html(hook.release_group())
    );
    imdb_link(&mut out, hook.imdb_id());
    if hook.is_upgrade() {
        out.push_str("\n⬆️ <b>Quality upgrade</b>");
    }
    out
}

pub fn format_truenas(alert: &TrueNasAlert) -> String {
    let mut out = format!("{} <b>TrueNAS alert</b>\n\n", alert.severity().emoji());
    let _ = writeln!(out, "🔴 <b>Level:</b> <code>{}</code>", escape_html(alert.level()));
    let _ = writeln!(out, "🖥 <b>Node:</b> <code>{}</code>", escape_html(alert.node_name()));
    let _ = write!(
        out,
        "📊 <b>Type:</b> <code>{}</code>\n\n",
        escape_html(alert.alert_type())
    );
    let _ = writeln!(out, "📝 <b>Message:</b>\n{}", escape_html(alert.alert_message()));
    if let Some(at) = alert.datetime.as_deref() {
        let _ = write!(out, "\n🕐 <b>Time:</b> {}", escape_html(at));
    }
    out
}
