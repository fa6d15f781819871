use crate::error::RegistryError;
use std::any::Any;

/// Renders a recovered panic payload for logs and errors.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(err) = payload.downcast_ref::<RegistryError>() {
        err.to_string()
    } else {
        "unknown panic payload".to_string()
    }
}
