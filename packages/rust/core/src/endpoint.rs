//! Start/completion logging shared by the endpoint modules.

use serde::Serialize;
use tracing::info;

use crate::identity::Identity;

/// Serialize a value for a log field. Never fails.
pub(crate) fn to_log_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

pub(crate) fn log_started(namespace: &str, identity: &Identity, function: &str, input: &str) {
    info!(
        user_id = identity.user_id().unwrap_or_default(),
        function,
        input,
        "[{namespace}] Starting endpoint"
    );
}

/// `result` is omitted for reads whose payload is too large to be worth logging.
pub(crate) fn log_completed(
    namespace: &str,
    identity: &Identity,
    function: &str,
    input: &str,
    result: Option<&str>,
) {
    match result {
        Some(result) => info!(
            user_id = identity.user_id().unwrap_or_default(),
            function,
            input,
            result,
            "[{namespace}] Completed endpoint"
        ),
        None => info!(
            user_id = identity.user_id().unwrap_or_default(),
            function,
            input,
            "[{namespace}] Completed endpoint"
        ),
    }
}
