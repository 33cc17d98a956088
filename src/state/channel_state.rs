/// Channel phase definitions for tracking crawl progress
///
/// A channel moves through `Selected -> MessagesWalked -> [FilesWalked] -> Done`.
/// The files phase only happens when file crawling is enabled.
use std::fmt;

/// Where a channel is in its crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelPhase {
    /// Channel was picked for crawling; nothing walked yet
    Selected,

    /// Message history and thread replies have been walked
    MessagesWalked,

    /// File listing has been walked
    FilesWalked,

    /// All work for the channel has been dispatched
    Done,
}

impl ChannelPhase {
    /// Returns true if `next` may follow this phase
    pub fn can_transition_to(&self, next: ChannelPhase) -> bool {
        matches!(
            (self, next),
            (Self::Selected, Self::MessagesWalked)
                | (Self::MessagesWalked, Self::FilesWalked)
                | (Self::MessagesWalked, Self::Done)
                | (Self::FilesWalked, Self::Done)
        )
    }

    /// The phase after this one for a crawl with or without files
    pub fn next(&self, files_enabled: bool) -> Option<ChannelPhase> {
        match self {
            Self::Selected => Some(Self::MessagesWalked),
            Self::MessagesWalked if files_enabled => Some(Self::FilesWalked),
            Self::MessagesWalked | Self::FilesWalked => Some(Self::Done),
            Self::Done => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::MessagesWalked => "messages_walked",
            Self::FilesWalked => "files_walked",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ChannelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Phase tracker for one channel
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    channel_id: String,
    files_enabled: bool,
    phase: ChannelPhase,
}

impl ChannelProgress {
    pub fn new(channel_id: impl Into<String>, files_enabled: bool) -> Self {
        Self {
            channel_id: channel_id.into(),
            files_enabled,
            phase: ChannelPhase::Selected,
        }
    }

    pub fn phase(&self) -> ChannelPhase {
        self.phase
    }

    /// Moves to the next phase, returning it
    pub fn advance(&mut self) -> ChannelPhase {
        if let Some(next) = self.phase.next(self.files_enabled) {
            tracing::debug!(
                channel = %self.channel_id,
                from = %self.phase,
                to = %next,
                "Channel phase change"
            );
            self.phase = next;
        }
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(ChannelPhase::Selected.can_transition_to(ChannelPhase::MessagesWalked));
        assert!(ChannelPhase::MessagesWalked.can_transition_to(ChannelPhase::FilesWalked));
        assert!(ChannelPhase::MessagesWalked.can_transition_to(ChannelPhase::Done));
        assert!(ChannelPhase::FilesWalked.can_transition_to(ChannelPhase::Done));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!ChannelPhase::Selected.can_transition_to(ChannelPhase::Done));
        assert!(!ChannelPhase::Selected.can_transition_to(ChannelPhase::FilesWalked));
        assert!(!ChannelPhase::FilesWalked.can_transition_to(ChannelPhase::MessagesWalked));
        assert!(!ChannelPhase::Done.can_transition_to(ChannelPhase::Selected));
    }

    #[test]
    fn test_next_respects_every_transition() {
        for files_enabled in [true, false] {
            let mut phase = ChannelPhase::Selected;
            while let Some(next) = phase.next(files_enabled) {
                assert!(phase.can_transition_to(next));
                phase = next;
            }
            assert!(phase.is_terminal());
        }
    }

    #[test]
    fn test_progress_skips_files_when_disabled() {
        let mut progress = ChannelProgress::new("C1", false);
        assert_eq!(progress.advance(), ChannelPhase::MessagesWalked);
        assert_eq!(progress.advance(), ChannelPhase::Done);
        assert_eq!(progress.advance(), ChannelPhase::Done);
    }

    #[test]
    fn test_progress_with_files() {
        let mut progress = ChannelProgress::new("C1", true);
        progress.advance();
        assert_eq!(progress.advance(), ChannelPhase::FilesWalked);
        assert_eq!(progress.advance(), ChannelPhase::Done);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ChannelPhase::MessagesWalked), "messages_walked");
        assert_eq!(ChannelPhase::Done.to_string(), "done");
    }
}
