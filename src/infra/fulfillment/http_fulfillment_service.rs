use crate::domain::models::closeout::{FulfillmentTicket, TicketReceipt};
use crate::domain::ports::FulfillmentService;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use tracing::error;

pub struct HttpFulfillmentService {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpFulfillmentService {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl FulfillmentService for HttpFulfillmentService {
    async fn submit_ticket(&self, ticket: &FulfillmentTicket) -> Result<TicketReceipt, AppError> {
        let res = self.client.post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Idempotency-Key", &ticket.participant_order_id)
            .json(ticket)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Fulfillment service connection error: {}", e);
                error!("{}", msg);
                AppError::Upstream(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let msg = format!("Fulfillment service failed. Status: {}, Body: {}", status, text);
            error!("{}", msg);
            return Err(AppError::Upstream(msg));
        }

        res.json::<TicketReceipt>().await.map_err(|e| {
            AppError::Upstream(format!("Fulfillment service returned an unreadable receipt: {}", e))
        })
    }
}
