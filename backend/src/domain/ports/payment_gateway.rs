//! Port for the payment provider: hosted checkout and signed event delivery.

use async_trait::async_trait;

use crate::domain::{CheckoutRequest, CheckoutSession, PaymentEvent};

use super::define_port_error;

define_port_error! {
    /// Errors raised by payment gateway adapters.
    pub enum PaymentGatewayError {
        /// The gateway has no credentials configured.
        NotConfigured => "payment provider is not configured",
        /// Transport-level failure or timeout.
        Transport { message: String } => "payment provider unreachable: {message}",
        /// The provider rejected the request.
        Rejected { status: u16, message: String } =>
            "payment provider returned {status}: {message}",
        /// The event signature header is missing, malformed, stale or wrong.
        InvalidSignature { message: String } =>
            "webhook signature rejected: {message}",
        /// The event body could not be decoded.
        MalformedEvent { message: String } => "webhook payload invalid: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout page.
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError>;

    /// Verify the signature over the raw body and decode the event.
    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentGatewayError>;
}

/// Gateway used when no provider credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredPaymentGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredPaymentGateway {
    async fn create_checkout(
        &self,
        _request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        Err(PaymentGatewayError::not_configured())
    }

    fn verify_event(
        &self,
        _payload: &[u8],
        _signature: &str,
    ) -> Result<PaymentEvent, PaymentGatewayError> {
        Err(PaymentGatewayError::not_configured())
    }
}
