use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use log::{debug, trace, error, info, warn};
use crate::CompareFoot;
use crate::reconcile;
use crate::service::CompareService;

/// A finished query round trip on its way back to the loop
pub struct QueryOutcome
{   pub outcome: Result<serde_json::Value, crate::error::Error>
  , pub reply: crate::SubmitReplySender
}

/// A finished model listing on its way back to the loop
pub struct ListingOutcome
{   pub listed: Result<Vec<crate::ModelDescriptor>, crate::error::Error>
  , pub reply: crate::LoadModelsReplySender
}

/// State owned by the backend loop.
/// Replaced wholesale by each command, never shared.
pub struct CompareState
{   pub config: crate::config::CompareConfig
  , pub service: Arc<dyn CompareService>
  , pub available: Vec<crate::ModelDescriptor>
  , pub selected: Vec<crate::ModelDescriptor>
  , pub records: Vec<crate::ResponseRecord>
  , pub healthy: Option<bool>
  , pub current_prompt: Option<String>
  , pub in_flight: usize
}

impl CompareState
{   /// Create a new state with nothing loaded yet
    pub fn new(
      service: Arc<dyn CompareService>
    , config: crate::config::CompareConfig
    ) -> Self
    {   debug!("Initializing CompareState");
        CompareState
        {   config
          , service
          , available: vec![]
          , selected: vec![]
          , records: vec![]
          , healthy: None
          , current_prompt: None
          , in_flight: 0
        }
    }

    /// Install a model list and select the leading models
    pub fn install_models(
      &mut self
    , listed: Result<Vec<crate::ModelDescriptor>, crate::error::Error>
    )
    {   self.available = reconcile::available_or_fallback(listed);
        self.selected = reconcile::initial_selection(
          &self.available,
          self.config.initial_selection
        );
        self.records = self.selected.iter()
          .map(crate::ResponseRecord::blank)
          .collect();
        debug!(
          "Installed {} models, {} selected",
          self.available.len(),
          self.selected.len()
        );
    }

    /// Change the selection; records are discarded and rebuilt
    pub fn reselect(&mut self, selected_ids: &[String])
    {   self.selected = reconcile::select_descriptors(
          selected_ids,
          &self.available
        );
        self.records = reconcile::reselect(selected_ids, &self.available);
    }

    /// Start a submission: records go pending and the ids to
    /// query are returned
    pub fn begin_submission(&mut self, prompt: &str) -> Vec<String>
    {   self.current_prompt = Some(prompt.to_string());
        self.records = reconcile::mark_pending(&self.records);
        self.in_flight += 1;
        reconcile::query_model_ids(&self.selected, &self.available)
    }

    /// Apply a finished round trip; the last one to arrive wins
    pub fn finish_submission(
      &mut self
    , outcome: &Result<serde_json::Value, crate::error::Error>
    ) -> Vec<crate::ResponseRecord>
    {   self.in_flight = self.in_flight.saturating_sub(1);
        let settled = reconcile::settle(
          &self.records,
          outcome,
          &reconcile::capture_time()
        );
        self.records = settled.records;
        self.healthy = Some(settled.healthy);
        self.records.clone()
    }

    pub fn snapshot(&self) -> crate::Snapshot
    {   crate::Snapshot
        {   available: self.available.clone()
          , selected: self.selected.clone()
          , records: self.records.clone()
          , healthy: self.healthy
          , current_prompt: self.current_prompt.clone()
          , is_loading: self.in_flight > 0
        }
    }
}

/// Public API for the comparison backend - owns the task
pub struct CompareBackend
{   hand: crate::CompareHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl CompareBackend
{   /// Create and spawn a new comparison backend
    /// Returns immediately - spawns background task
    pub fn new(
      service: Arc<dyn CompareService>
    , config: crate::config::CompareConfig
    ) -> Self
    {   debug!("Creating CompareBackend with task ownership");

        let (load_models_tx, load_models_rx)
          = mpsc::unbounded_channel();
        let (reselect_tx, reselect_rx)
          = mpsc::unbounded_channel();
        let (submit_tx, submit_rx)
          = mpsc::unbounded_channel();
        let (get_snapshot_tx, get_snapshot_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::CompareHand
        {   load_models_tx
          , reselect_tx
          , submit_tx
          , get_snapshot_tx
          , kill_process_tx
        };

        let foot = crate::CompareFoot
        {   load_models_rx
          , reselect_rx
          , submit_rx
          , get_snapshot_rx
          , kill_process_rx
        };

        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, service, config).await
        });

        CompareBackend
        {   hand
          , _task_handle
        }
    }

    /// Fetch the model list - returns almost immediately
    pub async fn load_models(
      &self
    ) -> Result<
        mpsc::UnboundedReceiver<crate::LoadModelsReply>,
        crate::error::Error
      >
    {   debug!("load_models queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::LoadModelsArgs
        {   reply: reply_tx
        };

        self.hand.load_models_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Change the selected models - returns almost immediately
    pub async fn reselect(
      &self
    , selected_ids: Vec<String>
    ) -> Result<
        mpsc::UnboundedReceiver<crate::ReselectReply>,
        crate::error::Error
      >
    {   debug!("reselect queuing {} ids", selected_ids.len());
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::ReselectArgs
        {   selected_ids
          , reply: reply_tx
        };

        self.hand.reselect_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Submit a prompt - returns almost immediately.
    /// The receiver yields the records of this round trip.
    pub async fn submit(
      &self
    , prompt: String
    ) -> Result<
        mpsc::UnboundedReceiver<crate::SubmitReply>,
        crate::error::Error
      >
    {   debug!("submit queuing prompt ({} chars)", prompt.len());
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::SubmitArgs
        {   prompt
          , reply: reply_tx
        };

        self.hand.submit_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Copy of the current state - returns almost immediately
    pub async fn snapshot(
      &self
    ) -> Result<
        mpsc::UnboundedReceiver<crate::GetSnapshotReply>,
        crate::error::Error
      >
    {   trace!("snapshot queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::GetSnapshotArgs
        {   reply: reply_tx
        };

        self.hand.get_snapshot_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down CompareBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::KillProcessArgs
        {   reply: reply_tx
        };

        self.hand.kill_process_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Other(
              "Backend already shutdown".to_string()
            )
          })?;

        // Wait for shutdown confirmation
        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend shutdown timeout");
            Err(crate::error::Error::Timeout)
        }
    }
}

/// Wait for the single reply of a queued command
pub async fn await_reply<T>(
  mut rx: mpsc::UnboundedReceiver<Result<T, crate::error::Error>>
) -> Result<T, crate::error::Error>
{   rx.recv().await.unwrap_or_else(|| Err(disconnected()))
}

fn disconnected() -> crate::error::Error
{   error!("Backend channel closed");
    crate::error::Error::Other("Backend disconnected".to_string())
}

/// Main backend event loop
///
/// tokio::select! is ONLY for fast queueing. Listings and
/// queries are spawned and come back through `listed_rx` and
/// `done_rx`, so no round trip waits on another.
async fn run_backend_loop(
  foot: CompareFoot
, service: Arc<dyn CompareService>
, config: crate::config::CompareConfig
)
{   debug!("Starting CompareBackend event loop");
    let (done_tx, mut done_rx)
      = mpsc::unbounded_channel::<QueryOutcome>();
    let (listed_tx, mut listed_rx)
      = mpsc::unbounded_channel::<ListingOutcome>();
    let (health_tx, mut health_rx)
      = mpsc::unbounded_channel::<bool>();

    if config.health_interval_secs == Some(0)
    {   warn!("Zero health interval, polling disabled");
    }
    let _monitor = config.health_interval_secs
      .filter(|secs| *secs > 0)
      .map(|secs| {
        crate::health::HealthMonitor::spawn(
          service.clone(),
          Duration::from_secs(secs),
          health_tx
        )
      });

    let mut state = CompareState::new(service, config);
    let CompareFoot
    {   mut load_models_rx
      , mut reselect_rx
      , mut submit_rx
      , mut get_snapshot_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = load_models_rx.recv() => {
          debug!("Received LoadModels");
          let service = state.service.clone();
          let listed_tx = listed_tx.clone();
          tokio::spawn(async move {
            let listed = service.list_models().await;
            let _ = listed_tx.send(ListingOutcome
            {   listed
              , reply: cmd.reply
            });
          });
        }
      , Some(done) = listed_rx.recv() => {
          debug!("Model listing finished");
          state.install_models(done.listed);
          let _ = done.reply.send(Ok(state.available.clone()));
        }
      , Some(cmd) = reselect_rx.recv() => {
          debug!("Received Reselect: {:?}", cmd.selected_ids);
          state.reselect(&cmd.selected_ids);
          let _ = cmd.reply.send(Ok(state.records.clone()));
        }
      , Some(cmd) = submit_rx.recv() => {
          debug!("Received Submit");
          if let Err(e) = reconcile::check_prompt(&cmd.prompt)
          {   let _ = cmd.reply.send(Err(e));
              continue;
          }

          let model_ids = state.begin_submission(&cmd.prompt);
          info!(
            "Querying {} models ({} in flight)",
            model_ids.len(),
            state.in_flight
          );
          let service = state.service.clone();
          let done_tx = done_tx.clone();
          tokio::spawn(async move {
            let outcome = service
              .query(&cmd.prompt, &model_ids)
              .await;
            let _ = done_tx.send(QueryOutcome
            {   outcome
              , reply: cmd.reply
            });
          });
        }
      , Some(done) = done_rx.recv() => {
          debug!("Query round trip finished");
          let records = state.finish_submission(&done.outcome);
          let _ = done.reply.send(Ok(records));
        }
      , Some(healthy) = health_rx.recv() => {
          trace!("Health report: {}", healthy);
          state.healthy = Some(healthy);
        }
      , Some(cmd) = get_snapshot_rx.recv() => {
          trace!("Received GetSnapshot");
          let _ = cmd.reply.send(Ok(state.snapshot()));
        }
      , cmd = kill_process_rx.recv() => {
          if let Some(cmd) = cmd
          {   debug!("Received KillProcess");
              let _ = cmd.reply.send(Ok(()));
          }
          info!("CompareBackend shutting down");
          break;
        }
      }
    }
}
