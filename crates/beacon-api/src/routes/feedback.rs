//! Device feedback intake and history listing.

use prost::Message as _;
use serde::Serialize;

use beacon_common::interchange::{FeedbackKind, FeedbackMessage, ReportMessage};
use beacon_common::{BeaconError, MAX_FEEDBACK};
use beacon_store::{DeviceIndex, FeedbackStore};

use crate::context::RequestContext;
use crate::render::{HandlerReply, Rendered};

const FEEDBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// `POST /device-feedback` — persist one serialized feedback message.
pub async fn create_feedback(ctx: RequestContext) -> HandlerReply {
    match ctx.content_type() {
        Some(FEEDBACK_CONTENT_TYPE) => (),
        other => {
            tracing::warn!(content_type = ?other, "feedback with wrong content type");
            return Rendered::error(BeaconError::InvalidContentType(
                other.unwrap_or("missing").to_string(),
            ))
            .into();
        }
    }

    let message = match FeedbackMessage::decode(ctx.body()) {
        Ok(message) => message,
        Err(error) => {
            tracing::warn!(%error, "undecodable feedback body");
            return Rendered::error(BeaconError::InvalidRequest("undecodable body".into()))
                .into();
        }
    };

    let device_id = match message.authentication.as_ref() {
        Some(auth) if !auth.device_id.is_empty() => auth.device_id.clone(),
        _ => {
            tracing::warn!("feedback without an authentication envelope");
            return Rendered::error(BeaconError::InterchangeAuth).into();
        }
    };

    match ctx.state.registry.log_feedback(message).await {
        Ok(()) => {
            tracing::info!(device = %device_id, "logged device feedback");
            Rendered::empty().into()
        }
        Err(BeaconError::NotFound) => Rendered::error(BeaconError::NotFound).into(),
        Err(error) => {
            tracing::error!(device = %device_id, %error, "unable to log feedback");
            Rendered::error(error).into()
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ReportEntry {
    red: u32,
    green: u32,
    blue: u32,
}

/// `GET /device-feedback?device_id=&count=` — newest first; `REPORT`
/// entries decode into channel values, `ERROR` and empty entries list as
/// null.
pub async fn list_feedback(ctx: RequestContext) -> HandlerReply {
    let query = ctx.query("device_id").unwrap_or_default();

    let count = ctx
        .query("count")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_FEEDBACK);

    let device = match ctx.state.registry.find_device(query).await {
        Ok(device) => device,
        Err(_) => {
            tracing::warn!(device = query, "feedback listing for unknown device");
            return Rendered::error(BeaconError::NotFound).into();
        }
    };

    let entries = match ctx
        .state
        .registry
        .list_feedback(&device.device_id, count)
        .await
    {
        Ok(entries) => entries,
        Err(error) => {
            tracing::error!(device = %device.device_id, %error, "unable to list feedback");
            return Rendered::error(error).into();
        }
    };

    let mut results: Vec<Option<ReportEntry>> = Vec::with_capacity(entries.len());

    for entry in &entries {
        if entry.payload.is_empty() || entry.kind() == FeedbackKind::Error {
            results.push(None);
            continue;
        }

        match ReportMessage::decode(entry.payload.as_slice()) {
            Ok(report) => results.push(Some(ReportEntry {
                red: report.red,
                green: report.green,
                blue: report.blue,
            })),
            Err(error) => {
                tracing::error!(device = %device.device_id, %error, "undecodable report payload");
                return Rendered::error(BeaconError::Interchange(error)).into();
            }
        }
    }

    Rendered::results(results).into()
}
