use crate::tui::{TuiActor, TuiMsg};
use quill_actors::actor::Addr;
use quill_actors::system::ShutdownHandle;
use std::time::Duration;
use tokio::{sync::broadcast::error::TryRecvError, time};

const INPUT_POLL: Duration = Duration::from_millis(200);
const TICK: Duration = Duration::from_millis(80);

/// Feed terminal input and redraw ticks into the UI actor until shutdown.
///
/// Input is read on one blocking thread that polls, so it notices shutdown
/// within [`INPUT_POLL`] instead of parking in `read` forever.
pub fn spawn_tui_feeders(tui: Addr<TuiActor>, shutdown: ShutdownHandle) {
    let tui_in = tui.clone();
    let mut shutdown_input = shutdown.subscribe();
    tokio::task::spawn_blocking(move || {
        loop {
            match shutdown_input.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }
            let msg = match crossterm::event::poll(INPUT_POLL) {
                Ok(false) => continue,
                Ok(true) => match crossterm::event::read() {
                    Ok(ev) => TuiMsg::InputEvent(ev),
                    Err(e) => TuiMsg::OpError(format!("input: {e}")),
                },
                Err(e) => {
                    let _ = tui_in.blocking_send(TuiMsg::OpError(format!("input: {e}")));
                    break;
                }
            };
            if tui_in.blocking_send(msg).is_err() {
                break;
            }
        }
        tracing::debug!("tui.input.stopped");
    });

    let tui_tick = tui;
    let mut shutdown_tick = shutdown.subscribe();
    tokio::spawn(async move {
        let mut interval = time::interval(TICK);
        loop {
            tokio::select! {
                _ = shutdown_tick.recv() => break,
                _ = interval.tick() => {
                    let _ = tui_tick.try_send(TuiMsg::Tick);
                }
            }
        }
    });
}
