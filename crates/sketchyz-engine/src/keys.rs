use anyhow::Result;

use crate::config::{load_dotenv, resolve_api_key};

/// Host hook for choosing the hosted-API key.
pub trait KeySelector: Send + Sync {
    fn has_selected_key(&self) -> bool;
    /// Lets the user pick a key. Completion is optimistic: the caller treats
    /// the key as present afterwards even if nothing changed.
    fn open_select_key(&self) -> Result<()>;
}

/// Reads the key from the process environment, reloading `.env` on selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvKeySelector;

impl KeySelector for EnvKeySelector {
    fn has_selected_key(&self) -> bool {
        resolve_api_key().is_some()
    }

    fn open_select_key(&self) -> Result<()> {
        load_dotenv();
        if !self.has_selected_key() {
            tracing::warn!("no API key found in the environment or .env");
        }
        Ok(())
    }
}

/// Always reports a key; used with the offline transport, which needs none.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineKeySelector;

impl KeySelector for OfflineKeySelector {
    fn has_selected_key(&self) -> bool {
        true
    }

    fn open_select_key(&self) -> Result<()> {
        Ok(())
    }
}
