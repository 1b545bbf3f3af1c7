use std::sync::Arc;

use tokio::{runtime::Handle, task::JoinHandle};

use crate::{
    codec::encode_batch,
    config::Config,
    exporter::{DeliveryClient, DeliveryError},
    MetricInstance,
};

/// Sends batches to the Insights endpoint of one account.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Arc<DeliveryClient>,
    api_key: Arc<str>,
    endpoint: Arc<str>,
    runtime: Handle,
}
impl Dispatcher {
    pub fn new(config: &Config, runtime: Handle) -> Result<Self, DeliveryError> {
        let client = DeliveryClient::new(&config.client_options())?;
        Ok(Self {
            client: Arc::new(client),
            api_key: config.api_key.as_str().into(),
            endpoint: config.endpoint().into(),
            runtime,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Encodes `batch` on the calling thread, then posts it from a blocking
    /// task without waiting for it. The outcome is logged by that task.
    pub fn dispatch(&self, batch: &[MetricInstance]) -> serde_json::Result<Delivery> {
        let payload = encode_batch(batch)?;
        log::info!("{}", String::from_utf8_lossy(&payload));

        let client = Arc::clone(&self.client);
        let api_key = Arc::clone(&self.api_key);
        let endpoint = Arc::clone(&self.endpoint);
        let handle = self.runtime.spawn_blocking(move || {
            let outcome = client.send("POST", &api_key, &endpoint, &payload);
            match &outcome {
                Ok(feedback) => log::info!("{feedback}"),
                Err(e) => log::error!("err: send to backend {e}"),
            }
            outcome
        });
        Ok(Delivery { handle })
    }
}

/// Handle to one background delivery. Dropping it detaches the delivery;
/// nothing cancels it and nothing orders it against other deliveries.
#[derive(Debug)]
pub struct Delivery {
    handle: JoinHandle<Result<String, DeliveryError>>,
}
impl Delivery {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn outcome(self) -> Result<String, DeliveryError> {
        self.handle.await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> Config {
        let mut config = Config::new("key".into(), "42".into());
        config.base_url = base_url.into();
        config
    }

    #[tokio::test]
    async fn test_endpoint() {
        let dispatcher =
            Dispatcher::new(&config("http://127.0.0.1:9"), Handle::current()).unwrap();
        assert_eq!(dispatcher.endpoint(), "http://127.0.0.1:9/v1/accounts/42/events");
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported_not_raised() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dispatcher =
            Dispatcher::new(&config(&format!("http://{addr}")), Handle::current()).unwrap();
        let delivery = dispatcher.dispatch(&[]).unwrap();
        let err = delivery.outcome().await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
