//! Windows tray shell for the agent monitor.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
#[path = "../../app-linux/src/menu.rs"]
mod menu;
mod paths;
mod win32;

use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use agent_monitor_core::platform::{AppPaths, Notifier, SurfaceUpdate};
use agent_monitor_core::service::ServiceAction;
use agent_monitor_core::ticker::Ticker;
use log::{error, info, warn};
use tray_icon::menu::{MenuEvent, MenuId};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::app::{AppState, control_service, shell_open};
use crate::menu::{MenuAction, MenuHandles, build_id_lookup, build_menu};
use crate::win32::MessageBoxNotifier;

fn main() {
    env_logger::init();
    info!("starting agent monitor (windows tray)");

    let app_state = match AppState::new() {
        Ok(state) => state,
        Err(e) => {
            error!("cannot start transport: {e}");
            MessageBoxNotifier.error("Agent Monitor", &format!("Cannot start: {e}"));
            std::process::exit(1);
        }
    };
    let running = Arc::new(AtomicBool::new(true));

    let (ok_icon, error_icon) = build_icons();
    let (menu, handles) = build_menu(&app_state.config, &app_state.agent);
    let id_lookup = build_id_lookup(&handles);

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
    id_lookup: HashMap<MenuId, MenuAction>,
    app_state: AppState,
    ok_icon: Icon,
    error_icon: Icon,
    running: Arc<AtomicBool>,
    service_ticker: Ticker,
    status_ticker: Ticker,
    action: Option<ServiceAction>,
}

impl EventLoop {
    fn run(&mut self) {
        info!("tray icon ready; entering event loop");

        while self.running.load(Ordering::SeqCst) {
            win32::pump_messages();

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

    fn handle_menu_event(&mut self, id: MenuId) {
        let Some(action) = self.id_lookup.get(&id).copied() else {
            return;
        };
        match action {
            MenuAction::ServiceAction => {
                let Some(action) = self.action else {
                    return;
                };
                let name = self.app_state.monitor.service_name().to_string();
                if let Err(e) = control_service(&name, action) {
                    self.app_state
                        .notifier
                        .error("Service", &format!("{} failed: {e}", action.label()));
                }
                self.service_ticker.reset();
            }
            MenuAction::ForceInventory => match self.app_state.monitor.force_inventory() {
                Ok(()) => self
                    .app_state
                    .notifier
                    .info("Inventory", "The agent is running an inventory."),
                Err(e) => self.app_state.notifier.error("Inventory", e.user_message()),
            },
            MenuAction::ViewLogs => {
                if let Some(logfile) = self.app_state.config.logfile.as_deref() {
                    shell_open(logfile);
                }
            }
            MenuAction::NewTicket => self.new_ticket(),
            MenuAction::OpenConfig => open_config(&self.app_state.paths),
            MenuAction::Quit => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn new_ticket(&mut self) {
        let Some(url) = self.app_state.config.new_ticket_url() else {
            warn!("no management server known; cannot open a ticket form");
            return;
        };
        let captured = self.app_state.config.new_ticket_screenshot
            && win32::capture_screen_to_clipboard();
        shell_open(&url);
        if captured {
            self.app_state.notifier.info(
                "New ticket",
                "A screenshot is in the clipboard. Paste it into the ticket description.",
            );
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

fn open_config(paths: &Arc<crate::paths::WindowsPaths>) {
    let config_path = paths.config_path();
    let parent = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or(config_path);

    shell_open(&parent.to_string_lossy());
}

fn build_icons() -> (Icon, Icon) {
    let ok = solid_icon([0x43, 0xa0, 0x47, 0xff]);
    let error = solid_icon([0xe5, 0x39, 0x35, 0xff]);
    (ok, error)
}

fn solid_icon(color: [u8; 4]) -> Icon {
    let (width, height) = (16, 16);
    let data = color.repeat(width * height);
    Icon::from_rgba(data, width as u32, height as u32).expect("failed to build icon")
}
