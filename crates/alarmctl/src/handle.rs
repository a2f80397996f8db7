use super::{ConfigArgs, PublishArgs};
use models::Fragment;
use serde::{Deserialize, Serialize};

/// Event of a macro invocation. Fields other than these are ignored.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub request_id: String,
    pub fragment: Fragment,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Success,
    Failure,
}

/// Response to a macro invocation.
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request_id: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Fragment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Handle a macro invocation `event`. Failures are mapped into a
/// failure Response, and never leave a partially transformed fragment.
pub async fn handle(event: Event, config: &ConfigArgs, publish: &PublishArgs) -> Response {
    let Event {
        request_id,
        fragment,
    } = event;

    tracing::debug!(%request_id, "received invocation event...");

    let result = async {
        let (defaults, overrides) = config.load()?;
        publish.transform(&fragment, &defaults, &overrides).await
    }
    .await;

    match result {
        Ok(fragment) => {
            tracing::debug!(%request_id, "transformed parent stack");
            Response {
                request_id,
                status: Status::Success,
                fragment: Some(fragment),
                error_message: None,
            }
        }
        Err(err) => {
            tracing::error!(%request_id, error = ?err, "failed to transform parent stack");
            Response {
                request_id,
                status: Status::Failure,
                fragment: None,
                error_message: Some(format!("{err:#}")),
            }
        }
    }
}
