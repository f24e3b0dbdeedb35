//! Business request construction, submission, and response interpretation.

use serde::Serialize;
use setdata_core::names::{fields, message_types};
use setdata_core::{
    BusinessRequestPayload, CorrelationId, DataPoint, FieldError, Message, RequestHeader,
};

use super::context::FlowContext;
use super::correlation::PendingOperation;
use crate::config::RequestTemplate;
use crate::error::FlowError;
use crate::traits::Identity;

// ---------------------------------------------------------------------------
// RequestBuilder
// ---------------------------------------------------------------------------

/// Reasons a business request fails validation before it is sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("channel id is empty")]
    EmptyChannelId,
    #[error("primary key is empty")]
    EmptyPrimaryKey,
    #[error("primary key type is empty")]
    EmptyPrimaryKeyType,
    #[error("request has no data points")]
    NoDataPoints,
    #[error("data point {index} has an empty key")]
    EmptyDataPointKey { index: usize },
}

/// Collects a header and data points into a validated `BusinessRequestPayload`.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    header: RequestHeader,
    data_points: Vec<DataPoint>,
}

impl RequestBuilder {
    #[must_use]
    pub fn new(header: RequestHeader) -> Self {
        Self {
            header,
            data_points: Vec::new(),
        }
    }

    /// Seeds a builder from a configured template.
    #[must_use]
    pub fn from_template(template: &RequestTemplate) -> Self {
        Self {
            header: template.header.clone(),
            data_points: template.data_points.clone(),
        }
    }

    /// Appends a data point; order is preserved on the wire.
    #[must_use]
    pub fn data_point(mut self, point: DataPoint) -> Self {
        self.data_points.push(point);
        self
    }

    /// Validates presence of required fields and produces the payload.
    ///
    /// # Errors
    ///
    /// Returns the first `BuildError` found.
    pub fn build(self) -> Result<BusinessRequestPayload, BuildError> {
        if self.header.channel_id.trim().is_empty() {
            return Err(BuildError::EmptyChannelId);
        }
        if self.header.primary_key.trim().is_empty() {
            return Err(BuildError::EmptyPrimaryKey);
        }
        if self.header.primary_key_type.trim().is_empty() {
            return Err(BuildError::EmptyPrimaryKeyType);
        }
        if self.data_points.is_empty() {
            return Err(BuildError::NoDataPoints);
        }
        if let Some(index) = self.data_points.iter().position(|p| p.key.trim().is_empty()) {
            return Err(BuildError::EmptyDataPointKey { index });
        }
        Ok(BusinessRequestPayload::from_parts(self.header, self.data_points))
    }
}

/// Registers a fresh id as `BusinessRequest` and submits the payload.
///
/// A submission failure unregisters the id before returning.
///
/// # Errors
///
/// Returns `FlowError::SubmissionFailure` if the transport refuses the call.
pub async fn send_business_request(
    ctx: &FlowContext,
    payload: &BusinessRequestPayload,
    identity: &Identity,
) -> Result<CorrelationId, FlowError> {
    let id = ctx.track(PendingOperation::BusinessRequest)?;
    let request = payload.to_element();
    tracing::info!(correlation_id = %id, request = %request, "sending business request");

    if let Err(err) = ctx.transport.send_request(&request, identity, id).await {
        ctx.registry.resolve(id);
        return Err(FlowError::submission("send_request")(err));
    }
    Ok(id)
}

// ---------------------------------------------------------------------------
// ResponseInterpreter
// ---------------------------------------------------------------------------

/// Decoded result of a business response message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponseOutcome {
    Success {
        channel_id: String,
        sequence_number: i64,
        status_code: String,
    },
    Error {
        code: i32,
        message: String,
    },
    /// Unrecognised type or shape; `raw` is the rendered message.
    Unexpected { raw: String },
}

impl ResponseOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Classifies a response message. Total: never panics, never errors.
#[must_use]
pub fn interpret(msg: &Message) -> ResponseOutcome {
    let decoded = if msg.is(message_types::ERROR_INFO) {
        read_error_info(msg)
    } else if msg.is(message_types::DATA_OPERATION_RESPONSE) {
        read_data_operation_response(msg)
    } else {
        return ResponseOutcome::Unexpected { raw: msg.to_string() };
    };

    decoded.unwrap_or_else(|err| {
        tracing::warn!(error = %err, message_type = %msg.message_type, "malformed response");
        ResponseOutcome::Unexpected {
            raw: msg.to_string(),
        }
    })
}

fn read_error_info(msg: &Message) -> Result<ResponseOutcome, FieldError> {
    Ok(ResponseOutcome::Error {
        code: msg.body.get_i32(fields::ERROR_CODE)?,
        message: msg.body.get_str(fields::ERROR_MESSAGE)?.to_string(),
    })
}

fn read_data_operation_response(msg: &Message) -> Result<ResponseOutcome, FieldError> {
    let status = msg.body.get_element(fields::STATUS)?;
    Ok(ResponseOutcome::Success {
        channel_id: msg.body.get_str(fields::CHANNEL_ID)?.to_string(),
        sequence_number: msg.body.get_i64(fields::SEQUENCE_NUMBER)?,
        status_code: status.get_str(fields::STATUS_CODE)?.to_string(),
    })
}
