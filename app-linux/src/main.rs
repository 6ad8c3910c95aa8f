//! Linux tray shell for the agent monitor.
//! Shows the agent service state and the agent's own status in a status icon.

mod app;
mod menu;
mod notify;
mod paths;

use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use agent_monitor_core::platform::{AppPaths, Notifier, SurfaceUpdate};
use agent_monitor_core::process::{quiet_command, spawn_reaped};
use agent_monitor_core::service::ServiceAction;
use agent_monitor_core::ticker::Ticker;
use gtk::glib;
use log::{error, info, warn};
use tray_icon::menu::MenuEvent;
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::app::{AppState, control_service};
use crate::menu::{MenuAction, MenuHandles, build_id_lookup, build_menu};

fn main() {
    env_logger::init();
    info!("starting agent monitor (linux tray)");

    gtk::init().expect("failed to init GTK"); // required for tray-icon on Linux

    let app_state = match AppState::new() {
        Ok(state) => state,
        Err(e) => {
            error!("cannot start transport: {e}");
            notify::DesktopNotifier.error("Agent Monitor", &format!("Cannot start: {e}"));
            std::process::exit(1);
        }
    };
    let running = Arc::new(AtomicBool::new(true));

    let (ok_icon, error_icon) = build_icons();
    let (menu, handles) = build_menu(&app_state.config, &app_state.agent);
    let id_lookup = build_id_lookup(&handles);

    // Health starts raised; the first reconciliation lowers it if needed.
    let tray_icon = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_icon(ok_icon.clone())
        .with_tooltip(tooltip(&app_state.config.service_name, true))
        .build()
        .expect("failed to create tray icon");

    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("received signal, exiting");
            running.store(false, Ordering::SeqCst);
        })
        .expect("Error setting Ctrl-C handler");
    }

    let mut looper = EventLoop {
        service_ticker: Ticker::new(app_state.config.service_interval()),
        status_ticker: Ticker::new(app_state.config.status_interval()),
        tray_icon,
        handles,
        id_lookup,
        app_state,
        ok_icon,
        error_icon,
        running,
        action: None,
    };

    looper.run();
}

struct EventLoop {
    tray_icon: TrayIcon,
    handles: MenuHandles,
    id_lookup: HashMap<muda::MenuId, MenuAction>,
    app_state: AppState,
    ok_icon: Icon,
    error_icon: Icon,
    running: Arc<AtomicBool>,
    service_ticker: Ticker,
    status_ticker: Ticker,
    /// What the service action item does right now, if enabled.
    action: Option<ServiceAction>,
}

impl EventLoop {
    fn run(&mut self) {
        info!("tray icon ready; entering event loop");

        while self.running.load(Ordering::SeqCst) {
            while let Ok(event) = MenuEvent::receiver().try_recv() {
                self.handle_menu_event(event.id);
            }

            let now = Instant::now();
            if self.service_ticker.due(now) {
                self.app_state.monitor.reconcile();
            }
            if self.status_ticker.due(now) {
                self.app_state.monitor.refresh_status();
            }

            while let Ok(update) = self.app_state.updates.try_recv() {
                self.apply(update);
            }

            glib::idle_add_local_once(|| {}); // allow GTK to process pending work
            while gtk::events_pending() {
                gtk::main_iteration_do(false);
            }

            thread::sleep(Duration::from_millis(50));
        }

        info!("exiting event loop; cleaning up");
        self.app_state.cleanup();
    }

    fn apply(&mut self, update: SurfaceUpdate) {
        match update {
            SurfaceUpdate::Service(display) => {
                menu::show_service(
                    &self.handles,
                    self.app_state.monitor.service_name(),
                    &display,
                );
                self.action = display.action_enabled.then_some(display.action);
                menu::show_start_type(&self.handles, self.app_state.monitor.start_type());
            }
            SurfaceUpdate::AgentStatus { text, at } => {
                menu::show_agent_status(&self.handles, &text, at);
            }
            SurfaceUpdate::Health(healthy) => self.update_icon(healthy),
        }
    }

    fn handle_menu_event(&mut self, id: muda::MenuId) {
        let Some(action) = self.id_lookup.get(&id).copied() else {
            return;
        };
        match action {
            MenuAction::ServiceAction => self.run_service_action(),
            MenuAction::ForceInventory => self.force_inventory(),
            MenuAction::ViewLogs => {
                if let Some(logfile) = self.app_state.config.logfile.as_deref() {
                    xdg_open(logfile);
                }
            }
            MenuAction::NewTicket => self.new_ticket(),
            MenuAction::OpenConfig => open_config(&self.app_state.paths),
            MenuAction::Quit => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn run_service_action(&mut self) {
        let Some(action) = self.action else {
            return;
        };
        let name = self.app_state.monitor.service_name().to_string();
        if let Err(e) = control_service(&name, action) {
            self.app_state
                .notifier
                .error("Service", &format!("{} failed: {e}", action.label()));
        }
        // Pick up the pending state on the next pass.
        self.service_ticker.reset();
    }

    fn force_inventory(&mut self) {
        // Blocks the UI until the agent answers.
        match self.app_state.monitor.force_inventory() {
            Ok(()) => self
                .app_state
                .notifier
                .info("Inventory", "The agent is running an inventory."),
            Err(e) => self.app_state.notifier.error("Inventory", e.user_message()),
        }
    }

    fn new_ticket(&mut self) {
        if self.app_state.config.new_ticket_screenshot {
            info!("screenshot capture is not available on Linux; opening ticket form only");
        }
        match self.app_state.config.new_ticket_url() {
            Some(url) => xdg_open(&url),
            None => warn!("no management server known; cannot open a ticket form"),
        }
    }

    fn update_icon(&mut self, healthy: bool) {
        let icon = if healthy {
            self.ok_icon.clone()
        } else {
            self.error_icon.clone()
        };
        if let Err(e) = self.tray_icon.set_icon(Some(icon)) {
            warn!("failed to update tray icon: {e}");
        }
        let text = tooltip(self.app_state.monitor.service_name(), healthy);
        if let Err(e) = self.tray_icon.set_tooltip(Some(text)) {
            warn!("failed to update tooltip: {e}");
        }
    }
}

fn tooltip(service_name: &str, healthy: bool) -> String {
    if healthy {
        format!("{service_name}: running")
    } else {
        format!("{service_name}: needs attention")
    }
}

fn xdg_open(target: &str) {
    info!("opening {target}");
    let mut cmd = quiet_command("xdg-open");
    cmd.arg(target);
    if let Err(e) = spawn_reaped(cmd) {
        warn!("xdg-open failed: {e}");
    }
}

fn open_config(paths: &Arc<crate::paths::LinuxPaths>) {
    let config_path = paths.config_path();
    let parent = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or(config_path);

    info!("opening config folder at {:?}", parent);
    let mut cmd = quiet_command("xdg-open");
    cmd.arg(&parent);
    if let Err(e) = spawn_reaped(cmd) {
        warn!("xdg-open failed: {e}");
    }
}

fn build_icons() -> (Icon, Icon) {
    // Simple 16x16 solid dots; avoid extra assets on Linux
    let ok = solid_icon([0x43, 0xa0, 0x47, 0xff]); // green
    let error = solid_icon([0xe5, 0x39, 0x35, 0xff]); // red
    (ok, error)
}

fn solid_icon(color: [u8; 4]) -> Icon {
    let (width, height) = (16, 16);
    let mut data = Vec::with_capacity(width * height * 4);
    for _ in 0..(width * height) {
        data.extend_from_slice(&color);
    }
    Icon::from_rgba(data, width as u32, height as u32).expect("failed to build icon")
}
