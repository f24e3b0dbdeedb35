use std::time::Duration;

use setdata_core::{DataPoint, Polarity, RequestHeader};

/// Client-level configuration: where to connect, which services to open, and
/// what to send.
///
/// Defaults are the fixed parameters of the order-analytics sample channel.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote endpoint host.
    pub host: String,
    /// Remote endpoint port.
    pub port: u16,
    /// Registered application name used for application-only authentication.
    pub app_name: String,
    /// Name of the authorization service.
    pub auth_service: String,
    /// Name of the business service receiving the update.
    pub business_service: String,
    /// Time allowed for the transport to connect.
    pub connect_timeout: Duration,
    /// Maximum silence on the event channel before the session is declared stalled.
    pub response_timeout: Duration,
    /// Bounded capacity of the inbound event channel.
    pub event_channel_capacity: usize,
    /// The business request to issue once authorized.
    pub request: RequestTemplate,
}

impl ClientConfig {
    /// `host:port` of the remote endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Authentication option string handed to the transport at session start.
    #[must_use]
    pub fn authentication_options(&self) -> String {
        format!(
            "AuthenticationMode=APPLICATION_ONLY;\
             ApplicationAuthenticationType=APPNAME_AND_KEY;\
             ApplicationName={};",
            self.app_name
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "bpipe-ny-beta.bdns.bloomberg.com".to_string(),
            port: 8196,
            app_name: "blp-test:orderanalytics-testcli".to_string(),
            auth_service: "//blp/apiauth".to_string(),
            business_service: "//blp-test/orderanalytics".to_string(),
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(30),
            event_channel_capacity: 64,
            request: RequestTemplate::default(),
        }
    }
}

/// Header and data points for the business request.
///
/// Validated by `RequestBuilder` when the router is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub header: RequestHeader,
    pub data_points: Vec<DataPoint>,
}

const SAMPLE_EXPIRY: &str = "2017-02-20T00:00:00.000+00:00";

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            header: RequestHeader {
                channel_id: "chnlid2".to_string(),
                sequence_number: 7_867_672,
                primary_key: "VOD LN Equity".to_string(),
                primary_key_type: "PKEY".to_string(),
            },
            data_points: vec![
                DataPoint {
                    key: "DATA_POINT_1".to_string(),
                    value: "BUY".to_string(),
                    value_description: "side".to_string(),
                    expire_time: SAMPLE_EXPIRY.to_string(),
                    visualization: Some(Polarity::Positive),
                },
                DataPoint {
                    key: "DATA_POINT_2".to_string(),
                    value: "123.56".to_string(),
                    value_description: "targetprice".to_string(),
                    expire_time: SAMPLE_EXPIRY.to_string(),
                    visualization: Some(Polarity::Negative),
                },
            ],
        }
    }
}
