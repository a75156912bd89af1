//! Port for the downstream mail API.

use std::future::Future;

use mailstep_types::credential::AccessToken;
use mailstep_types::error::DeliveryError;
use mailstep_types::execution::{DeliveryReceipt, DeliveryRequest};

/// Issues authenticated calls against the mail API.
///
/// Implementations perform exactly one HTTP request per call and classify
/// the result into [`DeliveryError`]; retrying is the dispatcher's job.
pub trait MailClient: Send + Sync + 'static {
    /// Send one templated message.
    fn send(
        &self,
        token: &AccessToken,
        request: &DeliveryRequest,
    ) -> impl Future<Output = Result<DeliveryReceipt, DeliveryError>> + Send;

    /// Resolve a template reference to the provider's external key.
    ///
    /// `Ok(None)` means the template does not exist.
    fn template_key(
        &self,
        token: &AccessToken,
        template: &str,
    ) -> impl Future<Output = Result<Option<String>, DeliveryError>> + Send;
}
