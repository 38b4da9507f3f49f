use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use log::{debug, warn};

use crate::activity::{PlayerState, Slot};
use crate::feed::FeedEvent;
use crate::resolve;

pub const URL_PLACEHOLDER: &str = "%URL%";

/// Expands the configured player command for one video.
pub fn build_command(template: &[String], url: &str) -> Result<(String, Vec<String>)> {
    let (program, rest) = template
        .split_first()
        .ok_or_else(|| anyhow!("player command is empty"))?;
    let mut saw_placeholder = false;
    let mut args: Vec<String> = rest
        .iter()
        .map(|arg| {
            if arg.contains(URL_PLACEHOLDER) {
                saw_placeholder = true;
                arg.replace(URL_PLACEHOLDER, url)
            } else {
                arg.clone()
            }
        })
        .collect();
    if !saw_placeholder {
        args.push(url.to_string());
    }
    Ok((program.clone(), args))
}

/// A running external player for one feed position.
pub struct Session {
    index: usize,
    video_id: String,
    kill_tx: Sender<()>,
    status_rx: Receiver<Result<ExitStatus>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Session {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// The exit result, once the player has finished on its own.
    pub fn try_status(&mut self) -> Option<Result<ExitStatus>> {
        match self.status_rx.try_recv() {
            Ok(res) => {
                self.finalize();
                Some(res)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finalize();
                Some(Err(anyhow!("player session closed")))
            }
        }
    }

    fn finalize(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn stop(mut self) {
        let _ = self.kill_tx.send(());
        self.finalize();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.kill_tx.send(());
            self.finalize();
        }
    }
}

/// Launches the player and reports how it exits on `events`. A clean exit is
/// reported as `Ended`, anything else as `Error`. Sessions stopped through
/// `stop` or drop report nothing.
pub fn spawn(
    template: &[String],
    index: usize,
    video_id: &str,
    events: Sender<FeedEvent>,
) -> Result<Session> {
    let url = resolve::watch_url(video_id);
    let (program, args) = build_command(template, &url)?;
    debug!("spawning player for position {index}: {program} {args:?}");

    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("launch {program} to play {url}"))?;

    let (kill_tx, kill_rx) = bounded::<()>(1);
    let (status_tx, status_rx) = bounded::<Result<ExitStatus>>(1);

    let handle = thread::spawn(move || {
        let result = loop {
            if kill_rx.try_recv().is_ok() {
                let _ = child.kill();
                let _ = child.wait();
                return;
            }
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => thread::sleep(Duration::from_millis(50)),
                Err(err) => break Err(anyhow!(err)).context("poll player status"),
            }
        };

        let state = match &result {
            Ok(status) if status.success() => PlayerState::Ended,
            Ok(status) => {
                warn!("player for position {index} exited with {status}");
                PlayerState::Error
            }
            Err(err) => {
                warn!("player for position {index} failed: {err:#}");
                PlayerState::Error
            }
        };
        let _ = status_tx.send(result);
        let _ = events.send(FeedEvent::Player { index, state });
    });

    Ok(Session {
        index,
        video_id: video_id.to_string(),
        kill_tx,
        status_rx,
        handle: Some(handle),
    })
}

/// Keeps at most one external player running, matching the slot marked
/// `play`.
pub struct Director {
    template: Vec<String>,
    current: Option<Session>,
}

impl Director {
    pub fn new(template: Vec<String>) -> Self {
        Self {
            template,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn sync(&mut self, slots: &[Slot], events: &Sender<FeedEvent>) -> Result<()> {
        let wanted = slots
            .iter()
            .find(|slot| slot.play)
            .and_then(|slot| slot.video_id.as_deref().map(|id| (slot.index, id)));

        if let Some(session) = &self.current {
            let keep = matches!(wanted, Some((index, id)) if session.index == index && session.video_id == id);
            if keep {
                return Ok(());
            }
        }
        if let Some(session) = self.current.take() {
            session.stop();
        }
        if let Some((index, id)) = wanted {
            self.current = Some(spawn(&self.template, index, id, events.clone())?);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(session) = self.current.take() {
            session.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn substitutes_url_placeholder() {
        let (program, args) =
            build_command(&template(&["mpv", "--fs", "%URL%"]), "https://y/watch?v=abc123").unwrap();
        assert_eq!(program, "mpv");
        assert_eq!(args, vec!["--fs", "https://y/watch?v=abc123"]);
    }

    #[test]
    fn appends_url_without_placeholder() {
        let (_, args) = build_command(&template(&["vlc"]), "https://y/watch?v=abc123").unwrap();
        assert_eq!(args, vec!["https://y/watch?v=abc123"]);
    }

    #[test]
    fn empty_command_is_an_error() {
        assert!(build_command(&[], "https://y").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn clean_exit_reports_ended() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut session = spawn(&template(&["true"]), 3, "abc123", tx).unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            event,
            FeedEvent::Player {
                index: 3,
                state: PlayerState::Ended
            }
        ));
        assert_eq!(session.index(), 3);
        let status = session.try_status().expect("status after exit").unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_reports_error() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let _session = spawn(&template(&["false"]), 0, "abc123", tx).unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            event,
            FeedEvent::Player {
                state: PlayerState::Error,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn stopped_session_reports_nothing() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let session = spawn(&template(&["sh", "-c", "sleep 30", "%URL%"]), 0, "abc123", tx).unwrap();
        session.stop();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
