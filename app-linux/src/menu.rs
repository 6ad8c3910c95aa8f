use std::collections::HashMap;

use agent_monitor_core::agent::AgentSettings;
use agent_monitor_core::config::Config;
use agent_monitor_core::display::{AGENT_WAITING, Marker, ServiceDisplay};
use agent_monitor_core::service::StartType;
use chrono::{DateTime, Local};
use log::debug;
use tray_icon::menu::{Menu, MenuId, MenuItem, PredefinedMenuItem};

pub struct MenuHandles {
    pub service_label: MenuItem,
    pub agent_label: MenuItem,
    pub start_type_label: MenuItem,
    pub service_action: MenuItem,
    pub service_action_id: MenuId,
    pub force_inventory_id: MenuId,
    pub view_logs_id: MenuId,
    pub new_ticket_id: MenuId,
    pub open_config_id: MenuId,
    pub quit_id: MenuId,
}

pub fn build_menu(config: &Config, agent: &AgentSettings) -> (Menu, MenuHandles) {
    let menu = Menu::new();

    let version = MenuItem::new(version_text(agent), false, None);
    append(&menu, &version, "agent version");
    let service_label = MenuItem::new(format!("{}: ...", config.service_name), false, None);
    append(&menu, &service_label, "service label");
    let start_type_label = MenuItem::new(start_type_text(StartType::Unknown), false, None);
    append(&menu, &start_type_label, "start type");
    let agent_label = MenuItem::new(format!("Agent: {AGENT_WAITING}"), false, None);
    append(&menu, &agent_label, "agent label");
    separator(&menu);

    let service_action = MenuItem::new("Start service", false, None);
    let service_action_id = service_action.id().clone();
    append(&menu, &service_action, "service action");

    let force_inventory = MenuItem::new("Force inventory", true, None);
    let force_inventory_id = force_inventory.id().clone();
    append(&menu, &force_inventory, "force-inventory");

    let has_logfile = config.logfile.as_deref().is_some_and(|f| !f.is_empty());
    let view_logs = MenuItem::new("View logs", has_logfile, None);
    let view_logs_id = view_logs.id().clone();
    append(&menu, &view_logs, "view-logs");

    let new_ticket = MenuItem::new("New ticket", config.new_ticket_url().is_some(), None);
    let new_ticket_id = new_ticket.id().clone();
    append(&menu, &new_ticket, "new-ticket");
    separator(&menu);

    let open_config = MenuItem::new("Open config folder", true, None);
    let open_config_id = open_config.id().clone();
    append(&menu, &open_config, "open-config");

    let quit = MenuItem::new("Quit", true, None);
    let quit_id = quit.id().clone();
    append(&menu, &quit, "quit");

    (
        menu,
        MenuHandles {
            service_label,
            agent_label,
            start_type_label,
            service_action,
            service_action_id,
            force_inventory_id,
            view_logs_id,
            new_ticket_id,
            open_config_id,
            quit_id,
        },
    )
}

fn append(menu: &Menu, item: &MenuItem, what: &str) {
    if let Err(e) = menu.append(item) {
        debug!("failed to append {what} item: {e}");
    }
}

fn separator(menu: &Menu) {
    if let Err(e) = menu.append(&PredefinedMenuItem::separator()) {
        debug!("failed to append separator: {e}");
    }
}

fn version_text(agent: &AgentSettings) -> String {
    match (agent.installed, agent.version.as_deref()) {
        (false, _) => "GLPI Agent not installed".to_string(),
        (true, Some(version)) => format!("GLPI Agent {version}"),
        (true, None) => "GLPI Agent".to_string(),
    }
}

fn start_type_text(start_type: StartType) -> String {
    format!("Startup: {}", start_type.label())
}

fn marker_glyph(marker: Marker) -> &'static str {
    match marker {
        Marker::Positive => "🟢",
        Marker::Attention => "🟠",
        Marker::Critical => "🔴",
    }
}

pub fn show_service(handles: &MenuHandles, service_name: &str, display: &ServiceDisplay) {
    handles.service_label.set_text(format!(
        "{} {service_name}: {}",
        marker_glyph(display.marker),
        display.label
    ));
    handles.service_action.set_text(display.action_label());
    handles.service_action.set_enabled(display.action_enabled);
}

pub fn show_start_type(handles: &MenuHandles, start_type: StartType) {
    handles.start_type_label.set_text(start_type_text(start_type));
}

pub fn show_agent_status(handles: &MenuHandles, text: &str, at: DateTime<Local>) {
    handles
        .agent_label
        .set_text(format!("Agent: {text} ({})", at.format("%H:%M:%S")));
}

pub fn build_id_lookup(handles: &MenuHandles) -> HashMap<MenuId, MenuAction> {
    let mut map = HashMap::new();
    map.insert(handles.service_action_id.clone(), MenuAction::ServiceAction);
    map.insert(handles.force_inventory_id.clone(), MenuAction::ForceInventory);
    map.insert(handles.view_logs_id.clone(), MenuAction::ViewLogs);
    map.insert(handles.new_ticket_id.clone(), MenuAction::NewTicket);
    map.insert(handles.open_config_id.clone(), MenuAction::OpenConfig);
    map.insert(handles.quit_id.clone(), MenuAction::Quit);
    map
}

#[derive(Clone, Copy, Debug)]
pub enum MenuAction {
    ServiceAction,
    ForceInventory,
    ViewLogs,
    NewTicket,
    OpenConfig,
    Quit,
}
