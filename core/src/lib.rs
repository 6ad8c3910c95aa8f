pub mod agent;
pub mod config;
pub mod display;
pub mod error;
pub mod inventory;
pub mod monitor;
pub mod process;
pub mod probe;
pub mod reconciler;
pub mod service;
pub mod ticker;
pub mod transport;

/// Interfaces that platform shells implement to adapt the core library
/// without pulling in platform-specific dependencies.
pub mod platform {
    use std::sync::mpsc::Sender;

    use chrono::{DateTime, Local};

    use crate::display::ServiceDisplay;

    /// Presentation surface fed by the monitor.
    ///
    /// Probe results arrive from a transport worker thread, so implementors
    /// must funnel updates back to the thread that owns the widgets.
    pub trait StatusSurface: Send + Sync {
        /// Decoded agent status text, or a fixed classification on failure.
        fn set_agent_status(&self, text: &str, at: DateTime<Local>);
        /// Service label, action button and marker after a service transition.
        fn set_service_display(&self, display: &ServiceDisplay);
        /// Tray icon and tooltip swap. Called once per health flip.
        fn set_health(&self, healthy: bool);
    }

    /// Trait for dispatching user-visible notifications.
    pub trait Notifier {
        fn info(&self, title: &str, body: &str);
        fn warn(&self, title: &str, body: &str);
        fn error(&self, title: &str, body: &str);
    }

    /// Trait for platform-correct config paths.
    pub trait AppPaths {
        fn config_path(&self) -> std::path::PathBuf;
    }

    /// A single update produced by the core for the presentation thread.
    #[derive(Debug, Clone, PartialEq)]
    pub enum SurfaceUpdate {
        AgentStatus { text: String, at: DateTime<Local> },
        Service(ServiceDisplay),
        Health(bool),
    }

    /// [`StatusSurface`] that forwards every update over a channel.
    ///
    /// Shells drain the receiving end on their UI thread, which makes that
    /// thread the only writer of widget state.
    #[derive(Clone)]
    pub struct ChannelSurface {
        tx: Sender<SurfaceUpdate>,
    }

    impl ChannelSurface {
        pub fn new(tx: Sender<SurfaceUpdate>) -> Self {
            Self { tx }
        }

        fn send(&self, update: SurfaceUpdate) {
            if self.tx.send(update).is_err() {
                log::debug!("surface receiver dropped; discarding update");
            }
        }
    }

    impl StatusSurface for ChannelSurface {
        fn set_agent_status(&self, text: &str, at: DateTime<Local>) {
            self.send(SurfaceUpdate::AgentStatus {
                text: text.to_owned(),
                at,
            });
        }

        fn set_service_display(&self, display: &ServiceDisplay) {
            self.send(SurfaceUpdate::Service(display.clone()));
        }

        fn set_health(&self, healthy: bool) {
            self.send(SurfaceUpdate::Health(healthy));
        }
    }
}
