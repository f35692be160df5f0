//! Event loop that drives a [`FeedController`].
//!
//! Multiplexes presentation inputs, store completions and the controller's
//! own debounce deadlines on a single task, so controller state is never
//! touched concurrently.

use super::controller::{Effect, FeedController, FeedEvent};
use super::cursor::KindFilter;
use super::pagination::ScrollProximity;
use super::selection::Direction;
use anyhow::Result;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Inputs from the presentation layer and the host.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedInput {
    SetFilter { keyword: String, kind: KindFilter },
    FocusRegained,
    Scrolled(ScrollProximity),
    LoadMore,
    Press(i64),
    Select(i64),
    Move(Direction),
    First,
    Last,
    ToggleFavorite(i64),
    ToggleFavoriteSelected,
    Activate(i64),
    ActivateSelected,
    Cancel,
    HistoryCleared,
    Quit,
}

/// Whether the loop keeps running after an input or a presentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Renders controller state and carries out its effects.
pub trait Presenter {
    fn present(&mut self, controller: &FeedController, effects: Vec<Effect>) -> Result<Action>;
}

/// Run until the presenter or an input asks to quit, the input channel
/// closes, or the process is signalled.
pub async fn run<P: Presenter>(
    controller: &mut FeedController,
    mut events: mpsc::Receiver<FeedEvent>,
    mut inputs: mpsc::Receiver<FeedInput>,
    presenter: &mut P,
) -> Result<()> {
    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    controller.start();

    loop {
        let effects = controller.drain_effects();
        if presenter.present(controller, effects)? == Action::Quit {
            break;
        }

        // Apply completions that are already queued before taking more input.
        while let Ok(event) = events.try_recv() {
            controller.handle_event(event);
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        let deadline = controller.next_deadline();
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            input = inputs.recv() => {
                match input {
                    Some(input) => {
                        if apply_input(controller, input) == Action::Quit {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("Input channel closed, stopping feed loop");
                        break;
                    }
                }
            }

            Some(event) = events.recv() => {
                controller.handle_event(event);
            }

            _ = timer => {
                controller.tick();
            }
        }
    }

    // Flush whatever the last input produced.
    let effects = controller.drain_effects();
    if !effects.is_empty() {
        presenter.present(controller, effects)?;
    }
    Ok(())
}

/// Dispatch a single input onto the controller.
pub fn apply_input(controller: &mut FeedController, input: FeedInput) -> Action {
    match input {
        FeedInput::SetFilter { keyword, kind } => controller.set_filter(&keyword, kind),
        FeedInput::FocusRegained => controller.focus_regained(),
        FeedInput::Scrolled(proximity) => controller.scrolled(proximity),
        FeedInput::LoadMore => controller.load_more_now(),
        FeedInput::Press(id) => controller.press(id),
        FeedInput::Select(id) => controller.select(id),
        FeedInput::Move(direction) => controller.move_selection(direction),
        FeedInput::First => controller.select_first(),
        FeedInput::Last => controller.select_last(),
        FeedInput::ToggleFavorite(id) => controller.toggle_favorite(id),
        FeedInput::ToggleFavoriteSelected => controller.toggle_favorite_selected(),
        FeedInput::Activate(id) => controller.activate(id),
        FeedInput::ActivateSelected => controller.activate_selected(),
        FeedInput::Cancel => controller.cancel(),
        FeedInput::HistoryCleared => controller.history_cleared(),
        FeedInput::Quit => return Action::Quit,
    }
    Action::Continue
}
