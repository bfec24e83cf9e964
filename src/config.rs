use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Registro de Visitas Médicas";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed file name handed to the save collaborator.
pub const EXPORT_FILENAME: &str = "registro-visita-medica.pdf";

/// MIME type of the assembled document.
pub const EXPORT_MIME: &str = "application/pdf";

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "registro_visitas=info,warn"
}

/// Directory the export sink writes to when the UI does not choose one.
/// ~/Documents when the platform has one, else the home directory.
pub fn default_export_dir() -> Option<PathBuf> {
    dirs::document_dir().or_else(dirs::home_dir)
}
