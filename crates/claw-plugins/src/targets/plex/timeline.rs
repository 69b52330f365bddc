// ── Timeline polling ──
//
// A player reports what it is showing through `/player/timeline/poll`. The
// poller keeps the latest report in a shared slot so playback commands can
// carry the media type the player is actually on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use regex::Regex;
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::gdm::PlexClient;
use super::{Slot, player_get};
use crate::error::Error;

pub const TIMELINE: &str = "timeline";

const POLL_PATH: &str = "/player/timeline/poll";

/// Media type named in the `type` query of playback requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MediaType {
    #[default]
    Video,
    Music,
    Photo,
}

/// One timeline report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    /// `navigation`, `fullScreenVideo`, `fullScreenMusic`, ...
    pub location: String,
    /// Type of the first timeline that is not stopped.
    pub active: Option<MediaType>,
}

impl Timeline {
    pub fn media_type(&self) -> MediaType {
        self.active
            .or(match self.location.as_str() {
                "fullScreenMusic" => Some(MediaType::Music),
                "fullScreenPhoto" => Some(MediaType::Photo),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Pulls the attributes this module cares about out of a timeline reply.
#[derive(Debug)]
pub struct TimelineParser {
    element: Regex,
    attribute: Regex,
}

impl TimelineParser {
    pub fn new() -> Result<Self, Error> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| Error::Protocol(e.to_string()));
        Ok(Self {
            element: compile(r"<(MediaContainer|Timeline)\b([^>]*)>")?,
            attribute: compile(r#"([A-Za-z]+)="([^"]*)""#)?,
        })
    }

    pub fn parse(&self, body: &str) -> Result<Timeline, Error> {
        let mut location = None;
        let mut active = None;
        for element in self.element.captures_iter(body) {
            let attr = |name: &str| {
                self.attribute
                    .captures_iter(&element[2])
                    .find(|a| &a[1] == name)
                    .map(|a| a[2].to_owned())
            };
            if &element[1] == "MediaContainer" {
                if location.is_none() {
                    location = Some(attr("location").unwrap_or_default());
                }
            } else if active.is_none() && attr("state").is_some_and(|s| s != "stopped") {
                active = attr("type").and_then(|t| t.parse().ok());
            }
        }
        let location =
            location.ok_or_else(|| Error::Protocol("timeline reply has no MediaContainer".into()))?;
        Ok(Timeline { location, active })
    }
}

// ── Poller ───────────────────────────────────────────────────────────

pub(crate) struct Poller {
    pub name: String,
    pub http: reqwest::Client,
    pub client: Slot<PlexClient>,
    pub timeline: Slot<Timeline>,
    pub command_id: Arc<AtomicU64>,
    pub parser: TimelineParser,
    pub interval: Duration,
}

impl Poller {
    /// Poll every interval until cancelled. A failed poll clears the slot.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.tick() => {}
            }
        }
        debug!(target = %self.name, "timeline poller exiting");
    }

    async fn tick(&self) {
        let name = &self.name;
        tokio::time::sleep(self.interval).await;
        let Some(client) = self.client.read().await.clone() else {
            return;
        };
        if !client.supports(TIMELINE) {
            return;
        }
        let report = self.fetch(&client).await;
        let mut slot = self.timeline.write().await;
        match report {
            Ok(timeline) => {
                if slot.as_ref() != Some(&timeline) {
                    debug!(
                        target = %name,
                        location = %timeline.location,
                        media = %timeline.media_type(),
                        "plex timeline changed"
                    );
                }
                *slot = Some(timeline);
            }
            Err(e) => {
                trace!(target = %name, error = %e, "timeline poll failed");
                *slot = None;
            }
        }
    }

    async fn fetch(&self, client: &PlexClient) -> Result<Timeline, Error> {
        let mut url = client.url.join(POLL_PATH)?;
        url.query_pairs_mut()
            .append_pair("wait", "0")
            .append_pair(
                "commandID",
                &self.command_id.fetch_add(1, Ordering::Relaxed).to_string(),
            );
        let body = player_get(&self.http, client, url).await?.text().await?;
        self.parser.parse(&body)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    const MUSIC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MediaContainer commandID="4" location="fullScreenMusic">
  <Timeline type="photo" state="stopped" />
  <Timeline type="video" state="stopped" />
  <Timeline type="music" state="playing" time="1200" duration="180000" />
</MediaContainer>"#;

    #[test]
    fn playing_timeline_wins() {
        let timeline = TimelineParser::new().unwrap().parse(MUSIC).unwrap();
        assert_eq!(timeline.location, "fullScreenMusic");
        assert_eq!(timeline.active, Some(MediaType::Music));
        assert_eq!(timeline.media_type().to_string(), "music");
    }

    #[test]
    fn location_decides_when_everything_is_stopped() {
        let parser = TimelineParser::new().unwrap();
        let photo = parser
            .parse(r#"<MediaContainer location="fullScreenPhoto"><Timeline type="photo" state="stopped"/></MediaContainer>"#)
            .unwrap();
        assert_eq!(photo.active, None);
        assert_eq!(photo.media_type(), MediaType::Photo);

        let idle = parser.parse(r#"<MediaContainer location="navigation"/>"#).unwrap();
        assert_eq!(idle.media_type(), MediaType::Video);
    }

    #[test]
    fn unknown_type_falls_back_to_video() {
        let timeline = TimelineParser::new()
            .unwrap()
            .parse(r#"<MediaContainer location="navigation"><Timeline type="game" state="playing"/></MediaContainer>"#)
            .unwrap();
        assert_eq!(timeline.media_type(), MediaType::Video);
    }

    #[test]
    fn reply_without_container_is_rejected() {
        let err = TimelineParser::new().unwrap().parse("<html></html>").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
