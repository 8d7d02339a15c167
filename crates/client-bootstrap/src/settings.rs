//! Persisted connection settings remembered between app launches.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Non-secret connection metadata; the credential itself lives in the
/// platform credential store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Normalized address of the last connected server.
    pub server_address: String,
    /// Whether unattended reconnection may use the remembered credential.
    pub remember_credential: bool,
}

/// Load settings JSON from disk when available.
pub fn load_settings(path: &Path) -> Result<Option<ConnectionSettings>, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(format!(
                "failed reading connection settings {}: {err}",
                path.display()
            ));
        }
    };

    let settings = serde_json::from_str::<ConnectionSettings>(&raw)
        .map_err(|err| format!("failed parsing connection settings {}: {err}", path.display()))?;
    Ok(Some(settings))
}

/// Persist settings JSON to disk, creating parent directories when needed.
pub fn save_settings(path: &Path, settings: &ConnectionSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "failed creating settings directory {}: {err}",
                parent.display()
            )
        })?;
    }

    let encoded = serde_json::to_vec(settings).map_err(|err| err.to_string())?;
    let temp_path = settings_temp_path(path);
    fs::write(&temp_path, encoded).map_err(|err| {
        format!(
            "failed writing temp settings file {}: {err}",
            temp_path.display()
        )
    })?;

    if let Err(rename_err) = fs::rename(&temp_path, path) {
        // Windows does not allow replacing existing files via rename.
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                let _ = fs::remove_file(&temp_path);
                return Err(format!(
                    "failed replacing settings {} after rename error ({rename_err}): {err}",
                    path.display()
                ));
            }
        }
        fs::rename(&temp_path, path).map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            format!(
                "failed writing settings {} after temp write: {err}",
                path.display()
            )
        })?;
    }

    Ok(())
}

/// Remove settings JSON from disk.
pub fn clear_settings(path: &Path) -> Result<(), String> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(format!(
            "failed deleting connection settings {}: {err}",
            path.display()
        )),
    }
}

fn settings_temp_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("connection-settings.json");
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    parent.join(format!(".{file_name}.{now_nanos}.tmp"))
}
