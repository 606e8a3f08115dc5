use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};
use kube::Client;

use crate::error::LookupError;

/// Fetches the last `tail_lines` lines of a pod's log (first container).
pub async fn get_pod_logs(
    client: &Client,
    namespace: &str,
    name: &str,
    tail_lines: i64,
) -> Result<String, LookupError> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let params = LogParams {
        tail_lines: Some(tail_lines),
        ..LogParams::default()
    };
    let text = api.logs(name, &params).await?;
    log::debug!("logs: {} byte(s) from {namespace}/{name}", text.len());
    Ok(text)
}
