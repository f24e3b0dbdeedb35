//! Well-known message-type and field names.
//!
//! Message types are compared by value against these constants.

/// Message types carried by inbound events.
pub mod message_types {
    pub const SESSION_STARTED: &str = "SessionStarted";
    pub const SESSION_STARTUP_FAILURE: &str = "SessionStartupFailure";
    pub const SESSION_TERMINATED: &str = "SessionTerminated";
    pub const SESSION_CONNECTION_UP: &str = "SessionConnectionUp";
    pub const SESSION_CONNECTION_DOWN: &str = "SessionConnectionDown";

    pub const SERVICE_OPENED: &str = "ServiceOpened";
    pub const SERVICE_OPEN_FAILURE: &str = "ServiceOpenFailure";

    pub const TOKEN_SUCCESS: &str = "TokenGenerationSuccess";
    pub const TOKEN_FAILURE: &str = "TokenGenerationFailure";

    pub const AUTHORIZATION_SUCCESS: &str = "AuthorizationSuccess";
    pub const AUTHORIZATION_FAILURE: &str = "AuthorizationFailure";

    pub const ERROR_INFO: &str = "ErrorInfo";
    pub const DATA_OPERATION_RESPONSE: &str = "dataOperationResponse";
}

/// Field names read from or written to element trees.
pub mod fields {
    pub const SERVICE_NAME: &str = "serviceName";
    pub const TOKEN: &str = "token";
    pub const REASON: &str = "reason";
    pub const MESSAGE: &str = "message";
    pub const DESCRIPTION: &str = "description";

    pub const ERROR_CODE: &str = "ERROR_CODE";
    pub const ERROR_MESSAGE: &str = "ERROR_MESSAGE";

    pub const HEADER: &str = "header";
    pub const CHANNEL_ID: &str = "channelId";
    pub const SEQUENCE_NUMBER: &str = "sequenceNumber";
    pub const PRIMARY_KEY: &str = "primaryKey";
    pub const PRIMARY_KEY_TYPE: &str = "primaryKeyType";
    pub const PAYLOAD_LIST: &str = "payloadList";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
    pub const VALUE_DESCRIPTION: &str = "valueDescription";
    pub const EXPIRE_TIME: &str = "expireTime";
    pub const VISUALIZATION_OPTION: &str = "visualizationOption";
    pub const TEXT_VISUALIZATION_OPTION: &str = "textVisualizationOption";
    pub const STATUS: &str = "status";
    pub const STATUS_CODE: &str = "statusCode";
}

/// Request schema names.
pub mod requests {
    pub const SET_DATA_REQUEST: &str = "setDataRequest";
    pub const AUTHORIZATION_REQUEST: &str = "AuthorizationRequest";
    pub const PAYLOAD_ENTRY: &str = "payload";
}
