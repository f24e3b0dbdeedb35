//! Event classification: maps an `EventCategory` onto the handler that owns it.

use setdata_core::EventCategory;

/// Handler selected for an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SessionStatus,
    ServiceStatus,
    TokenStatus,
    /// `partial` responses do not end the correlated operation.
    Response { partial: bool },
    AuthorizationStatus,
    Other,
}

impl Route {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SessionStatus => "session_status",
            Self::ServiceStatus => "service_status",
            Self::TokenStatus => "token_status",
            Self::Response { partial: false } => "response",
            Self::Response { partial: true } => "partial_response",
            Self::AuthorizationStatus => "authorization_status",
            Self::Other => "other",
        }
    }
}

/// Classifies an event category. Total over every category.
#[must_use]
pub fn classify(category: EventCategory) -> Route {
    match category {
        EventCategory::SessionStatus => Route::SessionStatus,
        EventCategory::ServiceStatus => Route::ServiceStatus,
        EventCategory::TokenStatus => Route::TokenStatus,
        EventCategory::Response => Route::Response { partial: false },
        EventCategory::PartialResponse => Route::Response { partial: true },
        EventCategory::AuthorizationStatus => Route::AuthorizationStatus,
        EventCategory::RequestStatus | EventCategory::Admin | EventCategory::Timeout => {
            Route::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_and_partial_share_handler() {
        assert_eq!(
            classify(EventCategory::Response),
            Route::Response { partial: false }
        );
        assert_eq!(
            classify(EventCategory::PartialResponse),
            Route::Response { partial: true }
        );
    }

    #[test]
    fn status_categories_route_to_their_handlers() {
        assert_eq!(classify(EventCategory::SessionStatus), Route::SessionStatus);
        assert_eq!(classify(EventCategory::ServiceStatus), Route::ServiceStatus);
        assert_eq!(classify(EventCategory::TokenStatus), Route::TokenStatus);
        assert_eq!(
            classify(EventCategory::AuthorizationStatus),
            Route::AuthorizationStatus
        );
    }

    #[test]
    fn remaining_categories_are_other() {
        for category in [
            EventCategory::RequestStatus,
            EventCategory::Admin,
            EventCategory::Timeout,
        ] {
            assert_eq!(classify(category), Route::Other);
        }
    }
}
