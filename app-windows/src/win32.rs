//! Thin Win32 layer: message pump, message boxes, and the PrintScreen key.
//! Other targets get logging stand-ins so the crate builds everywhere.

use agent_monitor_core::platform::Notifier;
use log::{info, warn};

#[cfg(windows)]
mod sys {
    use std::ptr;

    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        KEYEVENTF_KEYUP, VK_SNAPSHOT, keybd_event,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, MB_ICONERROR, MB_ICONINFORMATION, MB_ICONWARNING, MB_OK,
        MESSAGEBOX_STYLE, MSG, MessageBoxW, PM_REMOVE, PeekMessageW, TranslateMessage,
    };

    pub const INFO: MESSAGEBOX_STYLE = MB_OK | MB_ICONINFORMATION;
    pub const WARN: MESSAGEBOX_STYLE = MB_OK | MB_ICONWARNING;
    pub const ERROR: MESSAGEBOX_STYLE = MB_OK | MB_ICONERROR;

    fn wide(text: &str) -> Vec<u16> {
        text.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Dispatch queued window messages; the tray icon lives on them.
    pub fn pump_messages() {
        // SAFETY: MSG is plain data and only touched by the calls below.
        unsafe {
            let mut msg: MSG = std::mem::zeroed();
            while PeekMessageW(&mut msg, ptr::null_mut(), 0, 0, PM_REMOVE) != 0 {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    pub fn message_box(style: MESSAGEBOX_STYLE, title: &str, body: &str) {
        let title = wide(title);
        let body = wide(body);
        // SAFETY: both buffers are NUL-terminated and outlive the call.
        unsafe {
            MessageBoxW(ptr::null_mut(), body.as_ptr(), title.as_ptr(), style);
        }
    }

    pub fn press_print_screen() {
        // SAFETY: synthesises a key press and release; no pointers involved.
        unsafe {
            keybd_event(VK_SNAPSHOT as u8, 0, 0, 0);
            keybd_event(VK_SNAPSHOT as u8, 0, KEYEVENTF_KEYUP, 0);
        }
    }
}

pub fn pump_messages() {
    #[cfg(windows)]
    sys::pump_messages();
}

/// Copy the screen to the clipboard. Returns whether it was attempted.
pub fn capture_screen_to_clipboard() -> bool {
    #[cfg(windows)]
    {
        // Let the tray menu close first.
        std::thread::sleep(std::time::Duration::from_millis(300));
        sys::press_print_screen();
        true
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Modal message boxes.
#[derive(Default)]
pub struct MessageBoxNotifier;

impl Notifier for MessageBoxNotifier {
    fn info(&self, title: &str, body: &str) {
        info!("{title}: {body}");
        #[cfg(windows)]
        sys::message_box(sys::INFO, title, body);
    }

    fn warn(&self, title: &str, body: &str) {
        warn!("{title}: {body}");
        #[cfg(windows)]
        sys::message_box(sys::WARN, title, body);
    }

    fn error(&self, title: &str, body: &str) {
        log::error!("{title}: {body}");
        #[cfg(windows)]
        sys::message_box(sys::ERROR, title, body);
    }
}
