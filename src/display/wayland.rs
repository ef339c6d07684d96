//! Display device for compositors implementing wlr-gamma-control-unstable-v1.
//!
//! Covers most wlroots-based compositors (Sway, river, Wayfire, labwc,
//! Hyprland, niri). One device context is one `zwlr_gamma_control_v1` object
//! bound to an output. Ramps are resampled to the output's gamma size and
//! handed to the compositor as a planar table through an anonymous file.
//!
//! The protocol has no way to read the current table back, and destroying a
//! gamma control makes the compositor restore the output's original ramp.

use std::collections::HashMap;
use std::io::{Seek, SeekFrom, Write};
use std::os::fd::AsFd;
use std::sync::{Mutex, MutexGuard};

use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
    protocol::{wl_output::WlOutput, wl_registry::WlRegistry},
};
use wayland_protocols_wlr::gamma_control::v1::client::{
    zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1,
    zwlr_gamma_control_v1::{Event as GammaControlEvent, ZwlrGammaControlV1},
};

use crate::color::GammaRamp;
use crate::display::{DisplayDevice, MonitorId, RawContext};
use crate::error::DisplayError;

#[derive(Debug, Clone)]
struct OutputInfo {
    output: WlOutput,
    name: String,
    // Registry name doubles as the monitor id
    registry_name: u32,
}

#[derive(Debug)]
struct ControlInfo {
    monitor: MonitorId,
    control: ZwlrGammaControlV1,
    gamma_size: Option<usize>,
    failed: bool,
}

#[derive(Debug, Default)]
struct State {
    gamma_manager: Option<ZwlrGammaControlManagerV1>,
    outputs: Vec<OutputInfo>,
    controls: HashMap<u64, ControlInfo>,
    next_context: u64,
}

struct Inner {
    connection: Connection,
    event_queue: EventQueue<State>,
    state: State,
}

impl Inner {
    fn roundtrip(&mut self) -> Result<(), DisplayError> {
        self.event_queue
            .roundtrip(&mut self.state)
            .map(|_| ())
            .map_err(|e| DisplayError::Connection(e.to_string()))
    }
}

pub struct WaylandDisplay {
    inner: Mutex<Inner>,
}

impl WaylandDisplay {
    /// Connect to the compositor named by `WAYLAND_DISPLAY` and bind the gamma manager.
    pub fn connect() -> Result<Self, DisplayError> {
        if std::env::var("WAYLAND_DISPLAY").is_err() {
            return Err(DisplayError::Connection(
                "WAYLAND_DISPLAY is not set. Are you running on Wayland?".into(),
            ));
        }

        let connection =
            Connection::connect_to_env().map_err(|e| DisplayError::Connection(e.to_string()))?;
        let mut event_queue = connection.new_event_queue();
        let qh = event_queue.handle();
        let mut state = State {
            next_context: 1,
            ..State::default()
        };

        let _registry = connection.display().get_registry(&qh, ());

        // Globals can arrive over several rounds
        for _ in 0..10 {
            event_queue
                .roundtrip(&mut state)
                .map_err(|e| DisplayError::Connection(e.to_string()))?;
            if state.gamma_manager.is_some() && !state.outputs.is_empty() {
                break;
            }
        }

        if state.gamma_manager.is_none() {
            return Err(DisplayError::Unsupported("wlr-gamma-control-unstable-v1"));
        }

        log_debug!(
            "Found wlr-gamma-control-unstable-v1 with {} output(s)",
            state.outputs.len()
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                connection,
                event_queue,
                state,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DisplayDevice for WaylandDisplay {
    fn name(&self) -> &'static str {
        "Wayland"
    }

    fn monitors(&self) -> Vec<MonitorId> {
        let mut inner = self.lock();
        // Picks up hotplugged and removed outputs
        if let Err(e) = inner.roundtrip() {
            log_warning!("Wayland roundtrip failed while listing outputs: {e}");
        }
        inner
            .state
            .outputs
            .iter()
            .map(|o| MonitorId(o.registry_name))
            .collect()
    }

    fn open_context(&self, monitor: MonitorId) -> Result<RawContext, DisplayError> {
        let mut inner = self.lock();
        let qh = inner.event_queue.handle();

        let output = inner
            .state
            .outputs
            .iter()
            .find(|o| o.registry_name == monitor.0)
            .map(|o| o.output.clone())
            .ok_or(DisplayError::UnknownMonitor(monitor))?;
        let control = match inner.state.gamma_manager {
            Some(ref manager) => manager.get_gamma_control(&output, &qh, ()),
            None => return Err(DisplayError::Unsupported("wlr-gamma-control-unstable-v1")),
        };

        let id = inner.state.next_context;
        inner.state.next_context += 1;
        inner.state.controls.insert(
            id,
            ControlInfo {
                monitor,
                control,
                gamma_size: None,
                failed: false,
            },
        );

        // gamma_size or failed arrives right after creation
        inner.roundtrip()?;

        let refused = match inner.state.controls.get(&id) {
            Some(info) => info.failed || info.gamma_size.is_none(),
            None => true,
        };
        if refused {
            if let Some(info) = inner.state.controls.remove(&id) {
                info.control.destroy();
            }
            return Err(DisplayError::Refused(format!(
                "compositor rejected gamma control for output {monitor}"
            )));
        }
        Ok(RawContext(id))
    }

    fn close_context(&self, context: RawContext) {
        let mut inner = self.lock();
        if let Some(info) = inner.state.controls.remove(&context.0) {
            info.control.destroy();
            if let Err(e) = inner.connection.flush() {
                log_debug!("Wayland flush after closing context failed: {e}");
            }
        }
    }

    fn read_ramp(&self, _context: RawContext) -> Result<GammaRamp, DisplayError> {
        Err(DisplayError::Unsupported("gamma read-back"))
    }

    fn write_ramp(&self, context: RawContext, ramp: &GammaRamp) -> Result<(), DisplayError> {
        let mut inner = self.lock();

        let (control, gamma_size) = match inner.state.controls.get(&context.0) {
            Some(info) if info.failed => {
                return Err(DisplayError::Refused(format!(
                    "gamma control for output {} failed",
                    info.monitor
                )));
            }
            Some(info) => (
                info.control.clone(),
                info.gamma_size.ok_or(DisplayError::UnknownContext(context.0))?,
            ),
            None => return Err(DisplayError::UnknownContext(context.0)),
        };

        let table = ramp.to_planar_bytes(gamma_size);
        let io_error = |e: std::io::Error| DisplayError::Refused(e.to_string());

        let mut file = tempfile::tempfile().map_err(io_error)?;
        file.write_all(&table).map_err(io_error)?;
        file.flush().map_err(io_error)?;
        // The compositor reads from the current offset
        file.seek(SeekFrom::Start(0)).map_err(io_error)?;

        control.set_gamma(file.as_fd());

        // The file must outlive the roundtrip
        inner.roundtrip()?;
        drop(file);

        match inner.state.controls.get(&context.0) {
            Some(info) if !info.failed => Ok(()),
            _ => Err(DisplayError::Refused(
                "compositor rejected the gamma table".into(),
            )),
        }
    }
}

impl Dispatch<WlRegistry, ()> for State {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: <WlRegistry as Proxy>::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        use wayland_client::protocol::wl_registry::Event;

        match event {
            Event::Global {
                name,
                interface,
                version,
            } => match interface.as_str() {
                "zwlr_gamma_control_manager_v1" => {
                    let manager =
                        registry.bind::<ZwlrGammaControlManagerV1, _, _>(name, version, qh, ());
                    state.gamma_manager = Some(manager);
                }
                "wl_output" => {
                    let output = registry.bind::<WlOutput, _, _>(name, version.min(4), qh, ());
                    state.outputs.push(OutputInfo {
                        output,
                        name: format!("output-{name}"),
                        registry_name: name,
                    });
                }
                _ => {}
            },
            Event::GlobalRemove { name } => {
                if let Some(pos) = state.outputs.iter().position(|o| o.registry_name == name) {
                    let removed = state.outputs.remove(pos);
                    log_debug!("Output removed: {}", removed.name);
                    // Contexts of a vanished output can only fail from now on
                    for info in state.controls.values_mut() {
                        if info.monitor.0 == name {
                            info.failed = true;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrGammaControlManagerV1, ()> for State {
    fn event(
        _: &mut Self,
        _: &ZwlrGammaControlManagerV1,
        _: <ZwlrGammaControlManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        // No events for the manager
    }
}

impl Dispatch<ZwlrGammaControlV1, ()> for State {
    fn event(
        state: &mut Self,
        gamma_control: &ZwlrGammaControlV1,
        event: GammaControlEvent,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(info) = state
            .controls
            .values_mut()
            .find(|info| &info.control == gamma_control)
        else {
            return;
        };

        match event {
            GammaControlEvent::GammaSize { size } => {
                info.gamma_size = Some(size as usize);
                log_debug!("Output {} gamma size: {size}", info.monitor);
            }
            GammaControlEvent::Failed => {
                // Another client owns the output, or the output went away
                log_warning!("Gamma control failed for output {}", info.monitor);
                info.failed = true;
            }
            _ => {
                log_debug!("Unknown gamma control event: {event:?}");
            }
        }
    }
}

impl Dispatch<WlOutput, ()> for State {
    fn event(
        state: &mut Self,
        output: &WlOutput,
        event: <WlOutput as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use wayland_client::protocol::wl_output::Event;

        if let Event::Name { name } = event
            && let Some(info) = state.outputs.iter_mut().find(|o| &o.output == output)
        {
            log_debug!("Output {} identified as {name}", info.registry_name);
            info.name = name;
        }
    }
}
