//! Business request payload for the `setDataRequest` update call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::{Element, Value};
use crate::names::{fields, requests};

/// Visualization hint attached to a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "POSITIVE",
            Self::Negative => "NEGATIVE",
            Self::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header fields identifying the channel and the keyed record being updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeader {
    pub channel_id: String,
    pub sequence_number: i64,
    pub primary_key: String,
    pub primary_key_type: String,
}

/// One key/value entry in the payload list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub key: String,
    pub value: String,
    pub value_description: String,
    /// ISO-8601 expiry, passed through verbatim.
    pub expire_time: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub visualization: Option<Polarity>,
}

impl DataPoint {
    fn to_element(&self) -> Element {
        let mut entry = Element::new(requests::PAYLOAD_ENTRY)
            .with(fields::KEY, self.key.as_str())
            .with(fields::VALUE, self.value.as_str())
            .with(fields::VALUE_DESCRIPTION, self.value_description.as_str())
            .with(fields::EXPIRE_TIME, self.expire_time.as_str());
        if let Some(polarity) = self.visualization {
            let choice = Value::Choice {
                selected: fields::TEXT_VISUALIZATION_OPTION.to_string(),
                value: Box::new(Value::from(polarity.as_str())),
            };
            entry.set(fields::VISUALIZATION_OPTION, choice);
        }
        entry
    }
}

/// The complete, validated business request. Immutable once built; construct
/// through `RequestBuilder` in the client crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRequestPayload {
    header: RequestHeader,
    data_points: Vec<DataPoint>,
}

impl BusinessRequestPayload {
    /// Assembles a payload from parts that the caller has already validated.
    #[must_use]
    pub fn from_parts(header: RequestHeader, data_points: Vec<DataPoint>) -> Self {
        Self {
            header,
            data_points,
        }
    }

    #[must_use]
    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    #[must_use]
    pub fn data_points(&self) -> &[DataPoint] {
        &self.data_points
    }

    /// Renders the `setDataRequest` element tree sent over the session.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let header = Element::new(fields::HEADER)
            .with(fields::CHANNEL_ID, self.header.channel_id.as_str())
            .with(fields::SEQUENCE_NUMBER, self.header.sequence_number)
            .with(fields::PRIMARY_KEY, self.header.primary_key.as_str())
            .with(fields::PRIMARY_KEY_TYPE, self.header.primary_key_type.as_str());
        let payload_list: Vec<Element> = self.data_points.iter().map(DataPoint::to_element).collect();
        Element::new(requests::SET_DATA_REQUEST)
            .with(fields::HEADER, header)
            .with(fields::PAYLOAD_LIST, payload_list)
    }
}
