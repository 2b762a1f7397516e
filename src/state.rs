//! Playback state machine
//!
//! Idle → Starting → Playing → Stopping → Idle. Starting can fall straight
//! back to Idle when there is nothing audible to play.

use crate::catalog::SoundId;

/// State of the playback session
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PlaybackState {
    /// No session
    #[default]
    Idle,

    /// Resource being acquired
    Starting { sound: SoundId },

    /// Steady state, possibly mid fade-in
    Playing { sound: SoundId },

    /// Fade-out or immediate stop in progress
    Stopping { sound: SoundId },
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackState::Idle)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            PlaybackState::Starting { .. } | PlaybackState::Stopping { .. }
        )
    }

    /// Sound the state refers to, if any
    pub fn sound(&self) -> Option<SoundId> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Starting { sound }
            | PlaybackState::Playing { sound }
            | PlaybackState::Stopping { sound } => Some(*sound),
        }
    }
}

/// Rejected state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// A session is already live
    AlreadyActive,

    /// Nothing to stop
    AlreadyIdle,

    /// Another transition is in progress
    InTransition,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::AlreadyActive => write!(f, "A sound is already playing"),
            TransitionError::AlreadyIdle => write!(f, "No sound is playing"),
            TransitionError::InTransition => {
                write!(f, "Cannot perform action during state transition")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Guards playback transitions
#[derive(Debug, Default)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Idle → Starting
    pub fn begin_start(&mut self, sound: SoundId) -> Result<(), TransitionError> {
        match self.state {
            PlaybackState::Idle => {
                self.state = PlaybackState::Starting { sound };
                Ok(())
            }
            PlaybackState::Playing { .. } => Err(TransitionError::AlreadyActive),
            _ => Err(TransitionError::InTransition),
        }
    }

    /// Starting → Playing
    pub fn mark_playing(&mut self) -> Result<(), TransitionError> {
        match self.state {
            PlaybackState::Starting { sound } => {
                self.state = PlaybackState::Playing { sound };
                Ok(())
            }
            _ => Err(TransitionError::InTransition),
        }
    }

    /// Playing → Stopping
    pub fn begin_stop(&mut self) -> Result<(), TransitionError> {
        match self.state {
            PlaybackState::Playing { sound } => {
                self.state = PlaybackState::Stopping { sound };
                Ok(())
            }
            PlaybackState::Idle => Err(TransitionError::AlreadyIdle),
            _ => Err(TransitionError::InTransition),
        }
    }

    /// Stopping → Idle, or Starting → Idle when nothing became audible
    pub fn mark_idle(&mut self) -> Result<(), TransitionError> {
        match self.state {
            PlaybackState::Stopping { .. } | PlaybackState::Starting { .. } => {
                self.state = PlaybackState::Idle;
                Ok(())
            }
            PlaybackState::Idle => Err(TransitionError::AlreadyIdle),
            PlaybackState::Playing { .. } => Err(TransitionError::InTransition),
        }
    }

    /// Force idle (for error recovery)
    pub fn force_idle(&mut self) {
        self.state = PlaybackState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        let idle = PlaybackState::Idle;
        assert!(idle.is_idle());
        assert!(!idle.is_playing());
        assert_eq!(idle.sound(), None);

        let playing = PlaybackState::Playing {
            sound: SoundId::OceanWaves,
        };
        assert!(playing.is_playing());
        assert!(!playing.is_transitioning());
        assert_eq!(playing.sound(), Some(SoundId::OceanWaves));

        let stopping = PlaybackState::Stopping {
            sound: SoundId::OceanWaves,
        };
        assert!(stopping.is_transitioning());
        assert_eq!(stopping.sound(), Some(SoundId::OceanWaves));
    }

    #[test]
    fn test_full_cycle() {
        let mut sm = PlaybackStateMachine::new();
        assert_eq!(sm.state(), PlaybackState::Idle);

        sm.begin_start(SoundId::GentleRain).unwrap();
        assert!(sm.begin_start(SoundId::GentleRain).is_err());

        sm.mark_playing().unwrap();
        assert_eq!(
            sm.begin_start(SoundId::LunarTide),
            Err(TransitionError::AlreadyActive)
        );

        sm.begin_stop().unwrap();
        assert_eq!(
            sm.state(),
            PlaybackState::Stopping {
                sound: SoundId::GentleRain
            }
        );

        sm.mark_idle().unwrap();
        assert_eq!(sm.begin_stop(), Err(TransitionError::AlreadyIdle));
    }

    #[test]
    fn test_starting_can_fall_back_to_idle() {
        let mut sm = PlaybackStateMachine::new();
        sm.begin_start(SoundId::TempleBells).unwrap();
        sm.mark_idle().unwrap();
        assert!(sm.state().is_idle());
    }

    #[test]
    fn test_force_idle() {
        let mut sm = PlaybackStateMachine::new();
        sm.begin_start(SoundId::NebulaHum).unwrap();
        sm.mark_playing().unwrap();

        sm.force_idle();
        assert_eq!(sm.state(), PlaybackState::Idle);
    }
}
