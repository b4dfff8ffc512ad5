// Single-threaded event loop: terminal input, transport events, redraw
//
// Each event is handled to completion before the next is polled, so the
// panel needs no locking.

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, Show},
    event::{
        DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
        EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
        MouseEventKind,
    },
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PanelConfig, REDRAW_INTERVAL};
use crate::messages::OutboundFrame;
use crate::panel::Panel;
use crate::surface::Surface;
use crate::transport::{ConnectionState, Transport, TransportEvent};

/// How long shutdown waits for the close handshake
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("Terminal IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
}

enum Flow {
    Continue,
    Quit,
}

pub async fn run(config: PanelConfig) -> Result<(), PanelError> {
    let url = config.endpoint.url();
    info!("Connecting to {} ({:?} mode)", url, config.command_mode);

    let (transport, mut events) = Transport::connect(url);
    let surface = Surface::new(config.cell_aspect);
    let mut panel = Panel::new(config);
    let mut stdout = io::stdout();

    terminal::enable_raw_mode()?;
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange,
        Hide
    )?;

    let result = event_loop(&surface, &mut panel, &transport, &mut events, &mut stdout).await;

    shutdown(&mut panel, &transport);

    execute!(
        stdout,
        Show,
        DisableFocusChange,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal::disable_raw_mode()?;

    if timeout(CLOSE_GRACE, transport.closed()).await.is_err() {
        warn!("Connection did not close within {:?}", CLOSE_GRACE);
    }
    info!("Panel stopped");

    result
}

async fn event_loop(
    surface: &Surface,
    panel: &mut Panel,
    transport: &Transport,
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    stdout: &mut Stdout,
) -> Result<(), PanelError> {
    let mut input = EventStream::new();
    let mut redraw = interval(REDRAW_INTERVAL);
    let mut transport_done = false;

    let (mut columns, mut rows) = terminal::size()?;
    let (width, height) = surface.container(columns, rows);
    transport.send(&panel.resize(width, height));

    loop {
        tokio::select! {
            maybe_event = input.next() => match maybe_event {
                Some(Ok(Event::Resize(c, r))) => {
                    (columns, rows) = (c, r);
                    let (width, height) = surface.container(columns, rows);
                    transport.send(&panel.resize(width, height));
                }
                Some(Ok(event)) => {
                    if let Flow::Quit = on_terminal_event(surface, panel, transport, event) {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            event = events.recv(), if !transport_done => match event {
                Some(event) => on_transport_event(panel, transport, event),
                None => transport_done = true,
            },
            _ = redraw.tick() => {}
        }

        surface.draw(stdout, panel, columns, rows)?;
    }
}

fn on_transport_event(panel: &mut Panel, transport: &Transport, event: TransportEvent) {
    match event {
        TransportEvent::State(state) => {
            panel.set_connection(state);
            // Anything sent before the socket opened was dropped
            if state == ConnectionState::Open {
                transport.send(&panel.current_frame());
            }
        }
        TransportEvent::Frame(text) => {
            if let Some(reading) = panel.on_frame(&text) {
                debug!(
                    "Telemetry: {}",
                    serde_json::to_string(&reading).unwrap_or_default()
                );
            }
        }
    }
}

/// Leave the vehicle idling, like the device does when a client drops
fn shutdown(panel: &mut Panel, transport: &Transport) {
    transport.send(&panel.release());
    transport.close();
}

fn on_terminal_event(
    surface: &Surface,
    panel: &mut Panel,
    transport: &Transport,
    event: Event,
) -> Flow {
    match event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) => match code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Flow::Quit,
            _ => {}
        },
        Event::Mouse(mouse) => {
            if let Some(frame) = on_mouse(surface, panel, mouse) {
                send_command(transport, panel, &frame);
            }
        }
        Event::FocusLost => {
            let frame = panel.release();
            send_command(transport, panel, &frame);
        }
        _ => {}
    }
    Flow::Continue
}

fn on_mouse(surface: &Surface, panel: &mut Panel, mouse: MouseEvent) -> Option<OutboundFrame> {
    let (x, y) = surface.pointer(mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => Some(panel.press(x, y)),
        MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => panel.drag(x, y),
        MouseEventKind::Up(MouseButton::Left) => Some(panel.release()),
        _ => None,
    }
}

fn send_command(transport: &Transport, panel: &Panel, frame: &OutboundFrame) {
    debug!(
        "Drive command: {}",
        serde_json::to_string(panel.command()).unwrap_or_default()
    );
    transport.send(frame);
}
