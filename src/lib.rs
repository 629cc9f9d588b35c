//! # Pose Coach
//!
//! Real-time exercise form analysis. Each frame of 33 body keypoints is
//! scored against the active exercise, classified into a movement phase,
//! checked for form violations and turned into coaching feedback. On
//! completion a session is reduced to a report.
//!
//! [`PoseCoach`] is the multi-session entry point. Sessions are independent
//! and can be driven from different threads; frames within one session must
//! be submitted in timestamp order.

pub mod analyzers;
pub mod calories;
pub mod config;
pub mod error;
pub mod feedback;
pub mod geometry;
pub mod report;
pub mod session;
pub mod types;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use report::SessionReport;
pub use session::{Session, SessionState};
pub use types::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use rayon::prelude::*;

/// Coordinates all live sessions and forwards results to the collaborators
pub struct PoseCoach {
    config: Arc<EngineConfig>,
    sessions: DashMap<SessionId, Arc<Mutex<Session>>>,
    /// Ids of completed sessions, kept for the lifetime of the coach so late
    /// frames and repeat completions get `SessionCompleted`. Grows by one id
    /// per completed session.
    completed: DashSet<SessionId>,
    sessions_started: AtomicU64,
    result_tx: Option<Sender<FrameRecord>>,
    cue_tx: Option<Sender<LiveCue>>,
}

impl Default for PoseCoach {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PoseCoach {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            sessions: DashMap::new(),
            completed: DashSet::new(),
            sessions_started: AtomicU64::new(0),
            result_tx: None,
            cue_tx: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forward every analyzed frame to a persistence layer
    pub fn connect_result_sink(&mut self, tx: Sender<FrameRecord>) {
        log::info!("Connecting frame result sink");
        self.result_tx = Some(tx);
    }

    /// Forward instant feedback and voice cues to a live client
    pub fn connect_cue_sink(&mut self, tx: Sender<LiveCue>) {
        log::info!("Connecting live cue sink");
        self.cue_tx = Some(tx);
    }

    /// Create a bounded result channel sized from the config and connect it
    pub fn result_channel(&mut self) -> Receiver<FrameRecord> {
        let (tx, rx) = crossbeam_channel::bounded(self.config.channel_capacity);
        self.connect_result_sink(tx);
        rx
    }

    /// Create a bounded live-cue channel sized from the config and connect it
    pub fn cue_channel(&mut self) -> Receiver<LiveCue> {
        let (tx, rx) = crossbeam_channel::bounded(self.config.channel_capacity);
        self.connect_cue_sink(tx);
        rx
    }

    /// Start a session. Without a profile the configured default is used.
    pub fn start_session(&self, exercise_id: &str, profile: Option<BodyProfile>) -> Result<SessionId> {
        let profile = profile.unwrap_or(self.config.default_profile);
        let id = SessionId::new();
        let n = self.sessions_started.fetch_add(1, Ordering::Relaxed);
        let seed = self.config.feedback_seed.map(|seed| seed.wrapping_add(n));

        let session = Session::new(id, exercise_id, profile, Arc::clone(&self.config), seed)?;
        log::info!(
            "Session {id} started: {} ({:.1} kg, {:.0} cm, {})",
            session.state().exercise,
            profile.weight_kg,
            profile.height_cm,
            profile.fitness_level.as_str()
        );
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        Ok(id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn process_frame(
        &self,
        session_id: SessionId,
        landmarks: &[Landmark],
        exercise_id: &str,
        timestamp: f64,
    ) -> Result<AnalysisResult> {
        let session = self.session(session_id)?;
        let result = session.lock().process_frame(landmarks, exercise_id, timestamp)?;
        self.publish(session_id, &result);
        Ok(result)
    }

    /// Process frames for many sessions at once.
    ///
    /// Frames are grouped per session in submission order and the groups run
    /// in parallel. Results come back in submission order.
    pub fn process_batch(&self, frames: Vec<BatchFrame>) -> Vec<Result<AnalysisResult>> {
        let total = frames.len();
        let mut groups: HashMap<SessionId, Vec<(usize, BatchFrame)>> = HashMap::new();
        for (index, frame) in frames.into_iter().enumerate() {
            groups.entry(frame.session_id).or_default().push((index, frame));
        }

        let mut indexed: Vec<(usize, Result<AnalysisResult>)> = groups
            .into_par_iter()
            .flat_map_iter(|(_, group)| {
                group.into_iter().map(|(index, frame)| {
                    let result =
                        self.process_frame(frame.session_id, &frame.landmarks, &frame.exercise_id, frame.timestamp);
                    (index, result)
                })
            })
            .collect();

        indexed.sort_by_key(|(index, _)| *index);
        debug_assert_eq!(indexed.len(), total);
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    /// End a session and summarize it. A session can be completed once.
    pub fn complete_session(&self, session_id: SessionId) -> Result<SessionReport> {
        // Claim the id first so a racing completion sees SessionCompleted
        if !self.completed.insert(session_id) {
            return Err(EngineError::SessionCompleted(session_id));
        }
        let session = match self.sessions.remove(&session_id) {
            Some((_, session)) => session,
            None => {
                self.completed.remove(&session_id);
                return Err(EngineError::UnknownSession(session_id));
            }
        };

        let state = match Arc::try_unwrap(session) {
            Ok(mutex) => mutex.into_inner().into_state(),
            // a concurrent frame still holds a handle
            Err(shared) => shared.lock().state().clone(),
        };
        let report = SessionReport::from_state(&state);
        log::info!(
            "Session {session_id} completed: {} frames, avg score {:.1}, {} reps, {:.1} kcal",
            report.frames_processed,
            report.average_score,
            report.total_reps,
            report.total_calories
        );
        Ok(report)
    }

    fn session(&self, session_id: SessionId) -> Result<Arc<Mutex<Session>>> {
        match self.sessions.get(&session_id) {
            Some(entry) => Ok(Arc::clone(entry.value())),
            None if self.completed.contains(&session_id) => Err(EngineError::SessionCompleted(session_id)),
            None => Err(EngineError::UnknownSession(session_id)),
        }
    }

    /// Fire-and-forget delivery to the collaborators; never blocks the frame
    fn publish(&self, session_id: SessionId, result: &AnalysisResult) {
        if let Some(tx) = &self.result_tx {
            let record = FrameRecord {
                session_id,
                frame_index: result.frame_index,
                result: result.clone(),
            };
            if let Err(e) = tx.try_send(record) {
                log::warn!("Dropping frame {} of session {session_id}: {e}", result.frame_index);
            }
        }

        if let (Some(tx), Some(coaching)) = (&self.cue_tx, &result.coaching) {
            let cue = LiveCue {
                session_id,
                frame_index: result.frame_index,
                instant_feedback: coaching.instant_feedback.clone(),
                voice_cue: coaching.voice_cue.clone(),
            };
            if let Err(e) = tx.try_send(cue) {
                log::warn!("Dropping live cue for session {session_id}: {e}");
            }
        }
    }
}
