use crate::domain::models::closeout::{AggregateChargeRequest, ChargeReceipt, IndividualChargeRequest};
use crate::domain::ports::PaymentCoordinator;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::error;

pub struct HttpPaymentCoordinator {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpPaymentCoordinator {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, idempotency_key: &str, payload: &T) -> Result<ChargeReceipt, AppError> {
        let url = format!("{}/{}", self.api_url, path);

        let res = self.client.post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Idempotency-Key", idempotency_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Payment service connection error: {}", e);
                error!("{}", msg);
                AppError::Upstream(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let msg = format!("Payment service failed. Status: {}, Body: {}", status, text);
            error!("{}", msg);
            return Err(AppError::Upstream(msg));
        }

        res.json::<ChargeReceipt>().await.map_err(|e| {
            AppError::Upstream(format!("Payment service returned an unreadable receipt: {}", e))
        })
    }
}

#[async_trait]
impl PaymentCoordinator for HttpPaymentCoordinator {
    async fn charge_individual(&self, request: &IndividualChargeRequest) -> Result<ChargeReceipt, AppError> {
        self.post("charges/individual", &request.participant_order_id, request).await
    }

    async fn charge_aggregate(&self, request: &AggregateChargeRequest) -> Result<ChargeReceipt, AppError> {
        let key = format!("sponsor:{}", request.session_code);
        self.post("charges/aggregate", &key, request).await
    }
}
