//! Periodic backend health probe

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use log::{debug, info, warn};

use crate::service::CompareService;

/// One probe. Any failure counts as unhealthy.
pub async fn probe(service: &dyn CompareService) -> bool
{   match service.check_health().await
    {   Ok(healthy) => healthy
      , Err(e) => {
          warn!("Health probe failed: {}", e);
          false
        }
    }
}

/// Fire-and-forget poller; stops when dropped or when
/// nobody listens for reports any more
pub struct HealthMonitor
{   task: tokio::task::JoinHandle<()>
}

impl HealthMonitor
{   /// Probe now, then every `every`, sending each result on `report_tx`
    pub fn spawn(
      service: Arc<dyn CompareService>
    , every: Duration
    , report_tx: mpsc::UnboundedSender<bool>
    ) -> Self
    {   debug!("Starting health monitor every {:?}", every);
        let task = tokio::spawn(async move {
          let mut ticker = tokio::time::interval(every);
          loop
          {   ticker.tick().await;
              let healthy = probe(service.as_ref()).await;
              debug!("Health probe result: {}", healthy);
              if report_tx.send(healthy).is_err()
              {   info!("Health listener gone, stopping monitor");
                  break;
              }
          }
        });
        HealthMonitor { task }
    }
}

impl Drop for HealthMonitor
{   fn drop(&mut self)
    {   self.task.abort();
    }
}
