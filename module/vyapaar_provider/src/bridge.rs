//! Persistent sub-process bridge to the payment provider's RPC binary.
//!
//! Grounded on `ingress/razorpay_bridge.py`'s MCP-over-stdio protocol, but
//! redesigned from the original, which spawns a fresh subprocess per call;
//! this keeps one long-lived child, a bounded request queue, and automatic
//! respawn on exit instead.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// How the bridge should spawn and reach the provider RPC binary.
#[derive(Debug, Clone)]
pub struct BridgeConfig
{
  /// Path to the provider RPC binary.
  pub binary_path: String,
  /// Arguments passed to the binary on spawn.
  pub args: Vec<String>,
  /// Extra environment variables set on the child process.
  pub env: Vec<(String, String)>,
  /// How long `call` waits for a response before timing out.
  pub request_timeout: Duration,
  /// Bound on in-flight plus queued requests.
  pub queue_capacity: usize,
}

impl Default for BridgeConfig
{
  fn default() -> Self
  {
    Self
    {
      binary_path: "razorpay-mcp-server".to_string(),
      args: vec!["stdio".to_string()],
      env: Vec::new(),
      request_timeout: Duration::from_secs(30),
      queue_capacity: 256,
    }
  }
}

#[derive(Serialize)]
struct RpcRequest<'a>
{
  id: u64,
  tool: &'a str,
  args: Value,
}

#[derive(Deserialize)]
struct RpcResponse
{
  id: u64,
  #[serde(default)]
  result: Option<Value>,
  #[serde(default)]
  error: Option<String>,
}

enum Command_
{
  Call { tool: String, args: Value, respond_to: oneshot::Sender<Result<Value, String>> },
  HealthCheck { respond_to: oneshot::Sender<bool> },
}

/// Handle to the bridge's background supervisor task. Cloning shares the
/// same child process and request queue.
#[derive(Clone)]
pub struct ProviderBridge
{
  tx: mpsc::Sender<Command_>,
  request_timeout: Duration,
}

impl ProviderBridge
{
  /// Spawn the supervisor task, which owns the child process for the life
  /// of the returned handle's last clone being dropped.
  #[must_use]
  pub fn spawn(config: BridgeConfig) -> Self
  {
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let request_timeout = config.request_timeout;
    tokio::spawn(supervisor_loop(config, rx));
    Self { tx, request_timeout }
  }

  /// Call a named tool on the provider binary and await its JSON result.
  pub async fn call(&self, tool: &str, args: Value) -> Result<Value, String>
  {
    let (respond_to, rx) = oneshot::channel();
    self
      .tx
      .send(Command_::Call { tool: tool.to_string(), args, respond_to })
      .await
      .map_err(|_| "provider bridge supervisor has shut down".to_string())?;

    match timeout(self.request_timeout, rx).await
    {
      Ok(Ok(result)) => result,
      Ok(Err(_)) => Err("provider bridge dropped the request before responding".to_string()),
      Err(_) => Err(format!("provider bridge call timed out after {:?}", self.request_timeout)),
    }
  }

  /// True iff the supervisor currently has a live child process.
  pub async fn is_healthy(&self) -> bool
  {
    let (respond_to, rx) = oneshot::channel();
    if self.tx.send(Command_::HealthCheck { respond_to }).await.is_err()
    {
      return false;
    }
    rx.await.unwrap_or(false)
  }
}

const RESPAWN_BACKOFF_BASE: Duration = Duration::from_secs(1);
const RESPAWN_BACKOFF_CAP: Duration = Duration::from_secs(30);

async fn supervisor_loop(config: BridgeConfig, mut rx: mpsc::Receiver<Command_>)
{
  let mut backoff = RESPAWN_BACKOFF_BASE;

  loop
  {
    let child = match spawn_child(&config)
    {
      Ok(child) => child,
      Err(err) =>
      {
        tracing::error!(error = %err, binary = %config.binary_path, "failed to spawn provider bridge binary, retrying");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(RESPAWN_BACKOFF_CAP);
        continue;
      }
    };
    backoff = RESPAWN_BACKOFF_BASE;

    if !run_session(child, &mut rx).await
    {
      // Receiver channel closed: every handle was dropped, shut down.
      return;
    }
    tracing::warn!(binary = %config.binary_path, "provider bridge child exited, respawning");
  }
}

fn spawn_child(config: &BridgeConfig) -> std::io::Result<Child>
{
  let mut cmd = Command::new(&config.binary_path);
  cmd.args(&config.args).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null()).kill_on_drop(true);
  for (k, v) in &config.env
  {
    cmd.env(k, v);
  }
  cmd.spawn()
}

/// Runs one child process session until it exits or the receiver channel
/// is closed. Returns `false` to signal the supervisor to stop entirely.
async fn run_session(mut child: Child, rx: &mut mpsc::Receiver<Command_>) -> bool
{
  let Some(stdin) = child.stdin.take()
  else
  {
    return true;
  };
  let Some(stdout) = child.stdout.take()
  else
  {
    return true;
  };

  let mut stdin = stdin;
  let mut lines = BufReader::new(stdout).lines();
  let mut pending: HashMap<u64, oneshot::Sender<Result<Value, String>>> = HashMap::new();
  let mut next_id: u64 = 0;
  let mut alive = true;

  loop
  {
    tokio::select! {
      maybe_cmd = rx.recv() =>
      {
        let Some(cmd) = maybe_cmd else
        {
          let _ = child.start_kill();
          return false;
        };
        match cmd
        {
          Command_::HealthCheck { respond_to } =>
          {
            let _ = respond_to.send(alive);
          }
          Command_::Call { tool, args, respond_to } =>
          {
            if !alive
            {
              let _ = respond_to.send(Err("provider bridge child is not running".to_string()));
              continue;
            }
            let id = next_id;
            next_id += 1;
            let request = RpcRequest { id, tool: &tool, args };
            match serde_json::to_string(&request)
            {
              Ok(mut line) =>
              {
                line.push('\n');
                if let Err(err) = stdin.write_all(line.as_bytes()).await
                {
                  let _ = respond_to.send(Err(format!("write to provider bridge failed: {err}")));
                  alive = false;
                }
                else
                {
                  pending.insert(id, respond_to);
                }
              }
              Err(err) =>
              {
                let _ = respond_to.send(Err(format!("failed to encode provider bridge request: {err}")));
              }
            }
          }
        }
      }
      line = lines.next_line() =>
      {
        match line
        {
          Ok(Some(raw)) =>
          {
            match serde_json::from_str::<RpcResponse>(&raw)
            {
              Ok(response) =>
              {
                if let Some(sender) = pending.remove(&response.id)
                {
                  let outcome = match response.error
                  {
                    Some(err) => Err(err),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                  };
                  let _ = sender.send(outcome);
                }
              }
              Err(err) => tracing::warn!(error = %err, raw, "unparseable provider bridge response line"),
            }
          }
          Ok(None) | Err(_) =>
          {
            // stdout closed or errored: the child is going away.
            break;
          }
        }
      }
    }
  }

  for (_, sender) in pending.drain()
  {
    let _ = sender.send(Err("provider bridge child exited before responding".to_string()));
  }
  let _ = child.wait().await;
  true
}
