//---------------------------------------------   Payment webhook  ---------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use retail_order_engine::{traits::{OrderFlowDatabase, OrderFlowError}, OrderFlowApi};

use crate::data_objects::{BankTransferNotification, JsonResponse, WebhookAck};

/// Route handler for inbound bank-transfer notifications from the payment gateway.
///
/// The gateway interprets any non-2xx response as "retry later", so every terminal outcome — settled, already
/// settled, unattributed, order not found, amount short — is answered with 200 and a JSON body describing what
/// happened. The only non-success response is a genuine infrastructure failure (database unreachable), where a
/// retry actually can help.
pub async fn payment_webhook<B>(
    req: HttpRequest,
    body: web::Json<BankTransferNotification>,
    api: web::Data<OrderFlowApi<B>>,
) -> HttpResponse
where
    B: OrderFlowDatabase,
{
    trace!("🏦️ Received payment webhook request: {}", req.uri());
    let notification = body.into_inner();
    let txid = notification.transaction_id.clone();
    match api.reconcile(notification.into()).await {
        Ok(outcome) => {
            debug!("🏦️ Payment [{txid}] processed with outcome {}", outcome.label());
            HttpResponse::Ok().json(WebhookAck::from(outcome))
        },
        Err(OrderFlowError::DatabaseError(e)) => {
            // Transient infrastructure failure: this is the one case where we *want* the gateway to retry.
            warn!("🏦️ Could not process payment [{txid}]. {e}");
            HttpResponse::InternalServerError().json(JsonResponse::failure("Temporary storage failure."))
        },
        Err(e) => {
            warn!("🏦️ Unexpected error while handling payment notification [{txid}]. {e}");
            HttpResponse::Ok().json(JsonResponse::failure("Unexpected error handling payment."))
        },
    }
}
