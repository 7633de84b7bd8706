// Shutdown signal for the acquisition loop
// Return, q or Esc on the terminal, or Ctrl-C, flips a watch channel to true.
// The loop only looks at it between cycles.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const KEY_POLL: Duration = Duration::from_millis(100);

pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Keys that end the session
pub fn is_quit_key(key: &KeyEvent) -> bool {
    let pressed = key.kind == KeyEventKind::Press || key.kind == KeyEventKind::Repeat;
    pressed && matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q'))
}

/// Watch the terminal on a background thread
///
/// Works without raw mode: in cooked mode the line arrives once Return is
/// pressed and the newline is reported as Enter.
pub fn spawn_keyboard_watcher(shutdown: watch::Sender<bool>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("keyboard".to_string())
        .spawn(move || {
            while !shutdown.is_closed() && !*shutdown.borrow() {
                match event::poll(KEY_POLL) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) if is_quit_key(&key) => {
                            info!("Key pressed, shutting down");
                            let _ = shutdown.send(true);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Failed to read keyboard input: {}", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Keyboard input unavailable: {}", e);
                        break;
                    }
                }
            }
        })
}

/// Flip the signal on Ctrl-C
pub fn spawn_ctrl_c(shutdown: watch::Sender<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            let _ = shutdown.send(true);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn test_quit_keys() {
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(!is_quit_key(&KeyEvent::new(KeyCode::Char('w'), KeyModifiers::NONE)));

        let mut release = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(!is_quit_key(&release));
    }

    #[test]
    fn test_signal_starts_clear() {
        let (tx, rx) = channel();
        assert!(!*rx.borrow());
        tx.send(true).unwrap();
        assert!(*rx.borrow());
    }
}
