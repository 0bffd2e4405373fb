//! Minute-aligned refresh loop.
//!
//! The scheduler task owns the [`Panel`]. Every wall-clock minute it runs a
//! cycle and pushes the frame to the display when the minute is a multiple
//! of `display_every_min`. Other tasks talk to it through [`PanelCommand`]s.

use crate::canvas::RenderError;
use crate::image_proc::PreparedBackground;
use crate::panel::{CycleError, CycleOutcome, Panel};
use chrono::{DateTime, Local, TimeZone, Timelike};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Pause after each pushed frame
const SETTLE: Duration = Duration::from_secs(1);

/// Requests for the panel owner
#[derive(Debug)]
pub enum PanelCommand {
    /// Use a prepared photo and redraw right away
    SetBackground {
        background: PreparedBackground,
        reply: oneshot::Sender<Result<(), RenderError>>,
    },
    /// Back to the solid fill and redraw right away
    ClearBackground { reply: oneshot::Sender<()> },
}

/// Scheduler for the continuous mode
pub struct Scheduler {
    panel: Panel,
    display_every_min: u32,
    commands: mpsc::Receiver<PanelCommand>,
}

impl Scheduler {
    /// Create a scheduler and the sender other tasks use to reach it
    pub fn new(panel: Panel, display_every_min: u32) -> (Self, mpsc::Sender<PanelCommand>) {
        let (tx, commands) = mpsc::channel(4);
        let scheduler = Self {
            panel,
            display_every_min: display_every_min.max(1),
            commands,
        };
        (scheduler, tx)
    }

    /// Run until shutdown; a failed cycle ends the loop with its error
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), CycleError> {
        tracing::info!(
            "Scheduler started, pushing to {} every {} min",
            self.panel.display_name(),
            self.display_every_min
        );

        self.cycle(Local::now(), true).await?;

        loop {
            let wait = until_next_minute(&Local::now());
            tracing::debug!("Next cycle in {:?}", wait);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.cycle(Local::now(), false).await?;
                }
                Some(command) = self.commands.recv() => {
                    self.handle(command).await?;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle(&mut self, command: PanelCommand) -> Result<(), CycleError> {
        match command {
            PanelCommand::SetBackground { background, reply } => {
                let result = self.panel.set_background(background);
                let accepted = result.is_ok();
                if reply.send(result).is_err() {
                    tracing::debug!("Background requester went away");
                }
                if accepted {
                    self.cycle(Local::now(), true).await?;
                }
            }
            PanelCommand::ClearBackground { reply } => {
                self.panel.clear_background();
                let _ = reply.send(());
                self.cycle(Local::now(), true).await?;
            }
        }
        Ok(())
    }

    async fn cycle(&mut self, now: DateTime<Local>, force: bool) -> Result<(), CycleError> {
        let outcome = self.panel.refresh(now).await?;
        tracing::debug!("Cycle at {} finished: {:?}", now.format("%H:%M:%S"), outcome);

        if force || should_show(now.minute(), self.display_every_min) {
            self.panel.show().await?;
        }
        tokio::time::sleep(SETTLE).await;
        Ok(())
    }
}

/// Single cycle for the one-shot mode; the frame is always pushed
pub async fn run_once(panel: &mut Panel) -> Result<CycleOutcome, CycleError> {
    let outcome = panel.refresh(Local::now()).await?;
    panel.show().await?;
    Ok(outcome)
}

/// Whether a cycle at `minute` goes to the display
pub fn should_show(minute: u32, display_every_min: u32) -> bool {
    minute % display_every_min.max(1) == 0
}

/// Time left until the next full minute
pub fn until_next_minute<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let elapsed = Duration::from_secs(now.second() as u64)
        + Duration::from_nanos(now.nanosecond().min(999_999_999) as u64);
    Duration::from_secs(60).saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Color, IndexedImage};
    use crate::display::{DisplayController, PreviewSink};
    use crate::solar::Theme;
    use crate::weather::{Coordinates, FixedLocation, GeolocationSource};
    use crate::weather::{DataUnavailable, WeatherDataSource, WeatherFacts};
    use async_trait::async_trait;
    use chrono::Utc;
    use tempfile::tempdir;

    struct NoWeather;

    #[async_trait]
    impl WeatherDataSource for NoWeather {
        async fn lookup(&self, _at: Coordinates) -> Result<WeatherFacts, DataUnavailable> {
            Err(DataUnavailable::new())
        }
    }

    fn panel(dir: &std::path::Path) -> Panel {
        let location: Box<dyn GeolocationSource> =
            Box::new(FixedLocation(Coordinates::new(52.23, 21.01)));
        Panel::new(
            Box::new(NoWeather),
            location,
            DisplayController::new(Box::new(PreviewSink::new(dir.join("panel.png")))),
        )
    }

    #[test]
    fn test_until_next_minute() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 42).unwrap();
        assert_eq!(until_next_minute(&now), Duration::from_secs(18));

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap();
        assert_eq!(until_next_minute(&now), Duration::from_secs(60));

        let now = now + chrono::TimeDelta::milliseconds(59_500);
        assert_eq!(until_next_minute(&now), Duration::from_millis(500));
    }

    #[test]
    fn test_should_show() {
        assert!(should_show(0, 2));
        assert!(!should_show(1, 2));
        assert!(should_show(58, 2));
        assert!(should_show(7, 1));
        assert!(should_show(7, 0));
        assert!(should_show(45, 15));
        assert!(!should_show(50, 15));
    }

    #[tokio::test]
    async fn test_run_once_writes_frame() {
        let dir = tempdir().unwrap();
        let mut panel = panel(dir.path());

        let outcome = run_once(&mut panel).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Unavailable(_)));
        assert!(dir.path().join("panel.png").exists());
    }

    #[tokio::test]
    async fn test_skipped_minute_still_settles() {
        let dir = tempdir().unwrap();
        let (mut scheduler, _commands) = Scheduler::new(panel(dir.path()), 2);
        let odd_minute = Local.with_ymd_and_hms(2024, 1, 1, 10, 1, 0).unwrap();

        let start = tokio::time::Instant::now();
        scheduler.cycle(odd_minute, false).await.unwrap();
        assert!(start.elapsed() >= SETTLE);
        assert!(!dir.path().join("panel.png").exists());
    }

    #[tokio::test]
    async fn test_commands_reach_the_panel() {
        let dir = tempdir().unwrap();
        let (scheduler, commands) = Scheduler::new(panel(dir.path()), 2);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(scheduler.run(shutdown_rx));

        let (reply, answer) = oneshot::channel();
        commands
            .send(PanelCommand::SetBackground {
                background: PreparedBackground {
                    image: IndexedImage::panel(Color::Red),
                    theme: Theme::Dark,
                    input_brightness: 120.0,
                    achieved_brightness: 12.0,
                },
                reply,
            })
            .await
            .unwrap();
        assert_eq!(answer.await.unwrap(), Ok(()));

        let (reply, answer) = oneshot::channel();
        commands
            .send(PanelCommand::SetBackground {
                background: PreparedBackground {
                    image: IndexedImage::filled(10, 10, Color::Red),
                    theme: Theme::Dark,
                    input_brightness: 120.0,
                    achieved_brightness: 12.0,
                },
                reply,
            })
            .await
            .unwrap();
        assert!(matches!(
            answer.await.unwrap(),
            Err(RenderError::BackgroundSize { .. })
        ));

        let (reply, answer) = oneshot::channel();
        commands
            .send(PanelCommand::ClearBackground { reply })
            .await
            .unwrap();
        answer.await.unwrap();

        shutdown_tx.send(()).unwrap();
        task.await.unwrap().unwrap();
    }
}
