use serde::Serialize;
use tracing::{error, warn};

/// Operator-facing notices. Everything else is logged only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Notice {
    SaveFailed { reason: String },
    Fatal,
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::SaveFailed { .. } => "Save failed",
            Notice::Fatal => "Critical error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::SaveFailed { .. } => {
                "Error: Could not save state. Storage might be full.".to_string()
            }
            Notice::Fatal => "A critical error occurred. Please restart the editor. If the problem persists, check the log folder for details.".to_string(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the log. Used headless and as the fallback before the
/// window exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::SaveFailed { reason } => warn!("{}: {} ({reason})", notice.title(), notice.message()),
            Notice::Fatal => error!("{}: {}", notice.title(), notice.message()),
        }
    }
}

#[cfg(feature = "desktop")]
pub use dialog::DialogNotifier;

#[cfg(feature = "desktop")]
mod dialog {
    use super::{Notice, Notifier};
    use tauri::AppHandle;
    use tauri_plugin_dialog::{DialogExt, MessageDialogKind};

    /// Shows notices as native message dialogs.
    pub struct DialogNotifier {
        app: AppHandle,
    }

    impl DialogNotifier {
        pub fn new(app: AppHandle) -> Self {
            DialogNotifier { app }
        }
    }

    impl Notifier for DialogNotifier {
        fn notify(&self, notice: &Notice) {
            super::LogNotifier.notify(notice);
            let dialog = self
                .app
                .dialog()
                .message(notice.message())
                .title(notice.title())
                .kind(MessageDialogKind::Error);
            // A fatal notice is raised from the panic hook while the process
            // unwinds; wait for the operator unless that would block the event
            // loop that has to draw the dialog.
            let on_main_thread = std::thread::current().name() == Some("main");
            if *notice == Notice::Fatal && !on_main_thread {
                dialog.blocking_show();
            } else {
                dialog.show(|_| {});
            }
        }
    }
}
