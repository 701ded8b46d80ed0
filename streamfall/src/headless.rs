//! Media engine stand-in for the command line
//!
//! Nothing is decoded; commands are logged and the playhead is tracked so
//! the session controller has something to drive.

use parking_lot::Mutex;
use streamfall_core::{LoadRequest, MediaEngine};
use tracing::info;

#[derive(Debug, Default)]
struct Playhead {
    url: Option<String>,
    position: f64,
    playing: bool,
    level: Option<usize>,
}

#[derive(Debug, Default)]
pub struct HeadlessEngine {
    state: Mutex<Playhead>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position worth persisting: a source is loaded and the playhead moved
    pub fn progress(&self) -> Option<f64> {
        let state = self.state.lock();
        state.url.as_ref()?;
        (state.position > 0.0).then_some(state.position)
    }
}

impl MediaEngine for HeadlessEngine {
    fn load(&self, request: &LoadRequest) {
        info!(url = %request.url, start = ?request.start_position, language = ?request.language, "engine: load");
        let mut state = self.state.lock();
        state.url = Some(request.url.clone());
        state.position = request.start_position.unwrap_or(0.0);
        state.playing = true;
        state.level = None;
    }

    fn play(&self) {
        info!("engine: play");
        self.state.lock().playing = true;
    }

    fn pause(&self) {
        info!("engine: pause");
        self.state.lock().playing = false;
    }

    fn seek(&self, position: f64) {
        info!(position, "engine: seek");
        self.state.lock().position = position;
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn recover_media_error(&self) {
        info!("engine: recover media error");
    }

    fn set_level(&self, level: Option<usize>) {
        info!(?level, "engine: set level");
        self.state.lock().level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start_position: Option<f64>) -> LoadRequest {
        LoadRequest {
            url: "https://cdn.test/master.m3u8".to_string(),
            start_position,
            language: None,
        }
    }

    #[test]
    fn test_progress_needs_a_moved_playhead() {
        let engine = HeadlessEngine::new();
        assert_eq!(engine.progress(), None);

        engine.seek(30.0);
        assert_eq!(engine.progress(), None);

        engine.load(&request(None));
        assert_eq!(engine.progress(), None);

        engine.seek(95.5);
        assert_eq!(engine.progress(), Some(95.5));

        engine.load(&request(Some(120.0)));
        assert_eq!(engine.progress(), Some(120.0));
    }
}
