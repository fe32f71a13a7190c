//! Active-session guard
//!
//! Keeps files that are being played right now out of the migration batch.

use std::collections::HashMap;

use tracing::info;

use crate::app::models::{MediaId, Session};
use crate::app::mover::{MigrationTask, SkipReason};

/// A task held back by the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    pub task: MigrationTask,
    pub reason: SkipReason,
}

/// Tasks split into safe-to-move and held back
#[derive(Debug, Clone, Default)]
pub struct GuardOutcome {
    pub kept: Vec<MigrationTask>,
    pub skipped: Vec<SkippedTask>,
}

/// Filters migration tasks against active playback sessions
pub struct SessionGuard;

impl SessionGuard {
    /// Split `tasks`: those whose media id is playing are skipped
    pub fn filter(tasks: Vec<MigrationTask>, sessions: &[Session]) -> GuardOutcome {
        let playing: HashMap<&MediaId, &Session> =
            sessions.iter().map(|s| (&s.media_id, s)).collect();

        let mut outcome = GuardOutcome::default();
        for task in tasks {
            match playing.get(&task.media_id) {
                Some(session) => {
                    info!(
                        "Holding back {}: playing for {} on {}",
                        task.title, session.user, session.device
                    );
                    outcome.skipped.push(SkippedTask {
                        task,
                        reason: SkipReason::ActiveSession {
                            user: session.user.clone(),
                            device: session.device.clone(),
                        },
                    });
                }
                None => outcome.kept.push(task),
            }
        }
        outcome
    }

    /// Hold back every task for the same reason
    pub fn skip_all(tasks: Vec<MigrationTask>, reason: SkipReason) -> GuardOutcome {
        GuardOutcome {
            kept: Vec::new(),
            skipped: tasks
                .into_iter()
                .map(|task| SkippedTask {
                    task,
                    reason: reason.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mover::TransferDirection;
    use std::path::PathBuf;

    fn task(id: &str) -> MigrationTask {
        MigrationTask {
            media_id: MediaId::new(id),
            title: id.to_string(),
            direction: TransferDirection::ToArray,
            source: PathBuf::from(format!("/cache/{}.mkv", id)),
            destination: PathBuf::from(format!("/array/{}.mkv", id)),
            subtitles: Vec::new(),
            size_hint: None,
            priority: 0,
        }
    }

    /// Test session guard
    ///
    /// A task whose media id is playing is skipped with the user and device,
    /// never kept.
    #[test]
    fn test_playing_item_is_skipped() {
        let sessions = vec![Session {
            media_id: MediaId::new("m1"),
            user: "alice".to_string(),
            device: "Living Room".to_string(),
        }];

        let outcome = SessionGuard::filter(vec![task("m1"), task("m2")], &sessions);

        assert_eq!(outcome.kept, vec![task("m2")]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::ActiveSession {
                user: "alice".to_string(),
                device: "Living Room".to_string(),
            }
        );
    }

    #[test]
    fn test_skip_all() {
        let outcome = SessionGuard::skip_all(
            vec![task("m1"), task("m2")],
            SkipReason::SessionsUnavailable,
        );
        assert!(outcome.kept.is_empty());
        assert_eq!(outcome.skipped.len(), 2);
    }
}
