//! Media playback events.
//!
//! The player is responsible for signaling every event at the right time.
//! Playback events are accepted only once the session is running and the
//! impression was recorded.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::protocol::{Arg, InteractionType, VideoPlayerState};
use crate::session::{AdSession, FacadeKind, Registration};
use crate::validate::{assert_number, assert_number_between};

// ============================================================================
// MediaEvents
// ============================================================================

/// Signals media playback events to every verification provider.
///
/// At most one per session.
#[derive(Debug, Clone)]
pub struct MediaEvents {
    session: AdSession,
}

impl MediaEvents {
    /// Binds media events to `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] if the session already has media
    /// events.
    pub fn new(session: &AdSession) -> Result<Self> {
        match session.register_facade(FacadeKind::MediaEvents) {
            Registration::Registered => Ok(Self {
                session: session.clone(),
            }),
            Registration::AlreadyRegistered => {
                Err(Error::already_registered(FacadeKind::MediaEvents))
            }
        }
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Playback started.
    ///
    /// `duration` is in seconds, `volume` in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for a non-finite duration or a volume
    ///   outside `[0, 1]`
    /// - A state error before the impression
    pub fn start(&self, duration: f64, volume: f64) -> Result<()> {
        assert_number("MediaEvents.start.duration", duration)?;
        assert_number_between("MediaEvents.start.mediaPlayerVolume", volume, 0.0, 1.0)?;
        self.playback("start", vec![Arg::from(duration), Arg::from(volume)])
    }

    /// Playback reached the first quartile.
    pub fn first_quartile(&self) -> Result<()> {
        self.playback("firstQuartile", vec![])
    }

    /// Playback reached the midpoint.
    pub fn midpoint(&self) -> Result<()> {
        self.playback("midpoint", vec![])
    }

    /// Playback reached the third quartile.
    pub fn third_quartile(&self) -> Result<()> {
        self.playback("thirdQuartile", vec![])
    }

    /// Playback completed.
    pub fn complete(&self) -> Result<()> {
        self.playback("complete", vec![])
    }

    /// Playback paused by the user.
    pub fn pause(&self) -> Result<()> {
        self.playback("pause", vec![])
    }

    /// Playback resumed by the user.
    pub fn resume(&self) -> Result<()> {
        self.playback("resume", vec![])
    }

    /// Playback stalled for buffering.
    pub fn buffer_start(&self) -> Result<()> {
        self.playback("bufferStart", vec![])
    }

    /// Buffering finished and playback resumed.
    pub fn buffer_finish(&self) -> Result<()> {
        self.playback("bufferFinish", vec![])
    }

    /// The user skipped the ad. Playback cannot resume afterwards.
    pub fn skipped(&self) -> Result<()> {
        self.playback("skipped", vec![])
    }

    fn playback(&self, method: &str, args: Vec<Arg>) -> Result<()> {
        self.session.assert_running()?;
        if !self.session.has_impression_occurred() {
            return Err(Error::ImpressionNotOccurred);
        }
        self.session.send_one_way(method, args)
    }

    // ========================================================================
    // Player
    // ========================================================================

    /// The player volume changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a volume outside `[0, 1]`.
    pub fn volume_change(&self, volume: f64) -> Result<()> {
        assert_number_between("MediaEvents.volumeChange.mediaPlayerVolume", volume, 0.0, 1.0)?;
        self.session.send_one_way("volumeChange", vec![Arg::from(volume)])
    }

    /// The player state changed.
    pub fn player_state_change(&self, state: VideoPlayerState) -> Result<()> {
        self.session
            .send_one_way("playerStateChange", vec![Arg::Json(serde_json::to_value(state)?)])
    }

    /// The user interacted with the ad.
    pub fn ad_user_interaction(&self, interaction: InteractionType) -> Result<()> {
        self.session.send_one_way(
            "adUserInteraction",
            vec![Arg::Json(serde_json::to_value(interaction)?)],
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AdEvents;
    use crate::protocol::Payload;
    use crate::session::{Partner, SessionContext};
    use crate::testing::FakeService;
    use serde_json::json;

    fn session(service: &FakeService) -> AdSession {
        AdSession::builder()
            .context(SessionContext::new(Partner::new("Partner", "1.0.0").expect("partner")))
            .transport(service.client_transport())
            .build()
            .expect("session")
    }

    #[test]
    fn test_second_instance_rejected() {
        let service = FakeService::new();
        let session = session(&service);

        let _first = MediaEvents::new(&session).expect("first");
        let err = MediaEvents::new(&session).unwrap_err();
        assert_eq!(
            err.to_string(),
            "AdSession already has a media events instance registered"
        );
        assert!(AdEvents::new(&session).is_ok());
    }

    #[test]
    fn test_playback_requires_impression() {
        let service = FakeService::new();
        let session = session(&service);
        let ad = AdEvents::new(&session).expect("ad events");
        let media = MediaEvents::new(&session).expect("media events");

        assert!(matches!(media.first_quartile(), Err(Error::SessionNotRunning)));

        service.start_session();
        assert!(matches!(media.first_quartile(), Err(Error::ImpressionNotOccurred)));

        ad.impression_occurred().expect("impression");
        media.first_quartile().expect("first quartile");
        media.midpoint().expect("midpoint");
        media.complete().expect("complete");
        assert_eq!(service.count("SessionService.firstQuartile"), 1);
        assert_eq!(service.count("SessionService.complete"), 1);
    }

    #[test]
    fn test_start_validates_arguments() {
        let service = FakeService::new();
        let session = session(&service);
        let ad = AdEvents::new(&session).expect("ad events");
        let media = MediaEvents::new(&session).expect("media events");
        service.start_session();
        ad.impression_occurred().expect("impression");

        assert!(matches!(media.start(f64::NAN, 0.5), Err(Error::InvalidArgument { .. })));
        assert!(matches!(media.start(30.0, 1.5), Err(Error::InvalidArgument { .. })));
        assert_eq!(service.count("SessionService.start"), 0);

        media.start(30.0, 0.5).expect("start");
        let (message, _) = service.find("SessionService.start");
        assert_eq!(
            message.args,
            Payload::Structured(vec![Arg::from(30.0), Arg::from(0.5)])
        );
    }

    #[test]
    fn test_player_events_forward_without_session_checks() {
        let service = FakeService::new();
        let session = session(&service);
        let media = MediaEvents::new(&session).expect("media events");

        assert!(media.volume_change(-0.1).is_err());
        media.volume_change(0.0).expect("volume");
        media
            .player_state_change(VideoPlayerState::Fullscreen)
            .expect("state");
        media
            .ad_user_interaction(InteractionType::InvitationAccept)
            .expect("interaction");

        let (message, _) = service.find("SessionService.playerStateChange");
        assert_eq!(message.args, Payload::Structured(vec![Arg::from(json!("fullscreen"))]));
        let (message, _) = service.find("SessionService.adUserInteraction");
        assert_eq!(
            message.args,
            Payload::Structured(vec![Arg::from(json!("invitationAccept"))])
        );
    }
}
